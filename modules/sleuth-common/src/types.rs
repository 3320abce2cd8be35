use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Search ---

/// One organic hit from a web search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

// --- Extraction ---

/// Main content pulled out of a rendered page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleContent {
    pub title: String,
    pub text: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
}

// --- Person research ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Famous,
    Academic,
    Business,
    Local,
    #[default]
    Unknown,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Famous => "famous",
            PersonType::Academic => "academic",
            PersonType::Business => "business",
            PersonType::Local => "local",
            PersonType::Unknown => "unknown",
        }
    }

    /// Map a free-text tag to a person type. Never fails: anything
    /// unrecognised is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "famous" | "celebrity" | "public figure" => PersonType::Famous,
            "academic" | "researcher" | "scientist" => PersonType::Academic,
            "business" | "professional" | "executive" => PersonType::Business,
            "local" => PersonType::Local,
            _ => PersonType::Unknown,
        }
    }
}

impl fmt::Display for PersonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PersonType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map(PersonType::from_tag).unwrap_or_default())
    }
}

/// What the caller knows about the subject before research starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialContext {
    pub name: String,
    #[serde(default)]
    pub known_for: String,
}

impl InitialContext {
    pub fn new(name: impl Into<String>, known_for: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            known_for: known_for.into(),
        }
    }
}

/// Platforms whose handles live in `PersonProfile::social_media` rather than
/// in `details`.
pub const SOCIAL_PLATFORMS: [&str; 4] = ["instagram", "facebook", "twitter", "linkedin"];

/// Canonical platform name for a fact key, if the key names one of
/// [`SOCIAL_PLATFORMS`].
pub fn social_platform(key: &str) -> Option<&'static str> {
    match key.trim().to_lowercase().as_str() {
        "instagram" => Some("instagram"),
        "facebook" => Some("facebook"),
        "twitter" | "x" | "twitter/x" | "x.com" => Some("twitter"),
        "linkedin" => Some("linkedin"),
        _ => None,
    }
}

/// Accumulating, and finally synthesized, result of one person-research run.
///
/// Invariant: a platform key present in `social_media` is never also present
/// in `details`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub person_type: PersonType,
    pub summary: String,
    pub details: BTreeMap<String, String>,
    pub social_media: BTreeMap<String, String>,
    pub links: Vec<String>,
    pub discrepancies: Vec<String>,
    pub confidence_score: u8,
}

impl PersonProfile {
    pub fn new(name: impl Into<String>, person_type: PersonType) -> Self {
        Self {
            name: name.into(),
            person_type,
            ..Default::default()
        }
    }

    /// Merge extracted facts, routing social-media handles to `social_media`.
    /// Later values overwrite earlier ones. Blank values are ignored.
    pub fn merge_details<I>(&mut self, facts: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in facts {
            let value = value.trim();
            if key.trim().is_empty() || value.is_empty() {
                continue;
            }
            match social_platform(&key) {
                Some(platform) => {
                    self.details.remove(&key);
                    self.social_media
                        .insert(platform.to_string(), value.to_string());
                }
                None => {
                    self.details.insert(key, value.to_string());
                }
            }
        }
        self.enforce_social_exclusivity();
    }

    pub fn merge_social<I>(&mut self, handles: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (platform, handle) in handles {
            let handle = handle.trim();
            if handle.is_empty() {
                continue;
            }
            let key = social_platform(&platform)
                .map(str::to_string)
                .unwrap_or_else(|| platform.trim().to_lowercase());
            self.social_media.insert(key, handle.to_string());
        }
        self.enforce_social_exclusivity();
    }

    fn enforce_social_exclusivity(&mut self) {
        // Social keys are stored lowercase; detail keys keep their casing.
        let social = &self.social_media;
        self.details
            .retain(|key, _| !social.contains_key(&key.trim().to_lowercase()));
    }

    pub fn record_discrepancy(&mut self, message: impl Into<String>) {
        self.discrepancies.push(message.into());
    }

    pub fn keep_link(&mut self, url: &str) {
        if !self.links.iter().any(|l| l == url) {
            self.links.push(url.to_string());
        }
    }
}

// --- Top-level output ---

/// What `research_query` hands back: a profile for person queries, a summary
/// for general ones, or a short human-readable failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum ResearchOutput {
    Profile(Box<PersonProfile>),
    Summary(String),
    Error(String),
}

impl ResearchOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ResearchOutput::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn person_type_tags_are_lenient() {
        assert_eq!(PersonType::from_tag("Famous"), PersonType::Famous);
        assert_eq!(PersonType::from_tag("professional"), PersonType::Business);
        assert_eq!(PersonType::from_tag("astronaut"), PersonType::Unknown);

        let parsed: PersonType = serde_json::from_str("\"ACADEMIC\"").unwrap();
        assert_eq!(parsed, PersonType::Academic);
        let parsed: PersonType = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, PersonType::Unknown);
    }

    #[test]
    fn social_handles_move_out_of_details() {
        let mut profile = PersonProfile::new("Marie Curie", PersonType::Academic);
        profile.merge_details(facts(&[("instagram", "old"), ("occupation", "physicist")]));
        profile.merge_details(facts(&[("Instagram", "@curie"), ("LinkedIn", "in/curie")]));

        assert_eq!(profile.social_media.get("instagram").map(String::as_str), Some("@curie"));
        assert_eq!(profile.social_media.get("linkedin").map(String::as_str), Some("in/curie"));
        assert_eq!(profile.details.get("occupation").map(String::as_str), Some("physicist"));
        for key in profile.social_media.keys() {
            assert!(!profile.details.contains_key(key));
        }
    }

    #[test]
    fn merge_is_last_write_wins_and_skips_blanks() {
        let mut profile = PersonProfile::new("A", PersonType::Unknown);
        profile.merge_details(facts(&[("occupation", "chemist")]));
        profile.merge_details(facts(&[("occupation", "physicist"), ("education", "  ")]));

        assert_eq!(profile.details.get("occupation").map(String::as_str), Some("physicist"));
        assert!(!profile.details.contains_key("education"));
    }

    #[test]
    fn merge_social_removes_matching_detail() {
        let mut profile = PersonProfile::new("A", PersonType::Unknown);
        profile.details.insert("youtube".into(), "channel".into());
        profile.merge_social(facts(&[("YouTube", "@a")]));

        assert_eq!(profile.social_media.get("youtube").map(String::as_str), Some("@a"));
        assert!(!profile.details.contains_key("youtube"));
    }

    #[test]
    fn exclusivity_ignores_key_case() {
        let mut profile = PersonProfile::new("A", PersonType::Unknown);
        profile.merge_details(facts(&[("YouTube", "chan"), ("Mastodon", "@a@x")]));
        profile.merge_social(facts(&[("YouTube", "@a")]));

        assert_eq!(profile.social_media["youtube"], "@a");
        assert!(!profile.details.contains_key("YouTube"));
        assert_eq!(profile.details["Mastodon"], "@a@x");

        // Details arriving after the handle are dropped too.
        profile.merge_details(facts(&[("YOUTUBE", "other")]));
        assert!(!profile.details.contains_key("YOUTUBE"));
        assert_eq!(profile.social_media["youtube"], "@a");
    }

    #[test]
    fn profile_serializes_type_field() {
        let profile = PersonProfile::new("Ada", PersonType::Famous);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["type"], "famous");
        assert_eq!(json["confidence_score"], 0);
    }

    #[test]
    fn links_are_kept_once() {
        let mut profile = PersonProfile::new("A", PersonType::Unknown);
        profile.keep_link("https://a.example");
        profile.keep_link("https://a.example");
        assert_eq!(profile.links.len(), 1);
    }
}
