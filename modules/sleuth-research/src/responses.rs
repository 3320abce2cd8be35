//! Typed shapes for the oracle's JSON replies.
//!
//! Each type's schema is appended to its prompt by [`Oracle::ask_json`], and
//! each has a conservative fallback used when the reply does not validate.
//!
//! [`Oracle::ask_json`]: crate::oracle::Oracle::ask_json

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::oracle::ResponseSchema;

/// Free-form fact object returned by details extraction.
pub type FactMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryClassification {
    /// Either "person" or "general".
    pub query_type: String,
    /// Full name of the person, when the query is about one.
    #[serde(default, alias = "name")]
    pub person_name: Option<String>,
    /// What the person is known for, if the query says.
    #[serde(default, alias = "known_for")]
    pub initial_context: Option<String>,
}

impl ResponseSchema for QueryClassification {
    fn fallback() -> Self {
        Self {
            query_type: "general".to_string(),
            person_name: None,
            initial_context: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PersonClassification {
    /// One of famous, academic, business, local, unknown.
    pub person_type: String,
    /// Distinguishing search keywords for this person.
    #[serde(default, alias = "keywords")]
    pub initial_keywords: Vec<String>,
}

impl ResponseSchema for PersonClassification {
    fn fallback() -> Self {
        Self {
            person_type: "unknown".to_string(),
            initial_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IdentityVerdict {
    #[serde(default)]
    pub is_same_person: bool,
    /// Facts about the person found in the text that are not yet known.
    #[serde(default)]
    pub new_facts: Option<FactMap>,
    #[serde(default)]
    pub reason: String,
}

impl IdentityVerdict {
    /// New facts rendered as strings, blanks dropped.
    pub fn facts(&self) -> Vec<(String, String)> {
        self.new_facts
            .iter()
            .flatten()
            .filter_map(|(k, v)| fact_text(v).map(|text| (k.clone(), text)))
            .collect()
    }
}

impl ResponseSchema for IdentityVerdict {
    fn fallback() -> Self {
        Self {
            is_same_person: false,
            new_facts: None,
            reason: "verification response could not be parsed".to_string(),
        }
    }
}

/// Consolidated profile proposed by the oracle at the end of a run.
///
/// `confidence_score` has no default: a reply without one is not a usable
/// synthesis.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SynthesizedProfile {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub occupation: Option<Value>,
    #[serde(default)]
    pub education: Option<Value>,
    #[serde(default)]
    pub notable_achievements: Option<Value>,
    #[serde(default)]
    pub affiliations: Option<Value>,
    #[serde(default)]
    pub birth_info: Option<Value>,
    #[serde(default)]
    pub death_info: Option<Value>,
    #[serde(default)]
    pub social_media_links: BTreeMap<String, Value>,
    #[serde(default)]
    pub discrepancies: Vec<String>,
    /// Integer 0-100.
    #[serde(deserialize_with = "confidence")]
    #[schemars(with = "u8")]
    pub confidence_score: u8,
}

impl SynthesizedProfile {
    /// The known detail fields that are present, as display strings.
    pub fn known_details(&self) -> Vec<(String, String)> {
        [
            ("occupation", &self.occupation),
            ("education", &self.education),
            ("notable_achievements", &self.notable_achievements),
            ("affiliations", &self.affiliations),
            ("birth_info", &self.birth_info),
            ("death_info", &self.death_info),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .and_then(fact_text)
                .map(|text| (key.to_string(), text))
        })
        .collect()
    }

    pub fn social_links(&self) -> Vec<(String, String)> {
        self.social_media_links
            .iter()
            .filter_map(|(k, v)| fact_text(v).map(|text| (k.clone(), text)))
            .collect()
    }
}

/// Render a JSON fact as display text. Null and blank values yield `None`.
pub fn fact_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(fact_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) if map.is_empty() => return None,
        Value::Object(_) => value.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let score = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| D::Error::custom(format!("confidence_score is not a number: {value}")))?;

    Ok(score.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::parse_json;
    use serde_json::json;

    #[test]
    fn confidence_accepts_numbers_and_numeric_strings() {
        let p: SynthesizedProfile = parse_json(r#"{"confidence_score": 87}"#).unwrap();
        assert_eq!(p.confidence_score, 87);

        let p: SynthesizedProfile = parse_json(r#"{"confidence_score": "64%"}"#).unwrap();
        assert_eq!(p.confidence_score, 64);

        let p: SynthesizedProfile = parse_json(r#"{"confidence_score": 250}"#).unwrap();
        assert_eq!(p.confidence_score, 100);

        let p: SynthesizedProfile = parse_json(r#"{"confidence_score": -3}"#).unwrap();
        assert_eq!(p.confidence_score, 0);
    }

    #[test]
    fn missing_or_garbage_confidence_fails_validation() {
        assert!(parse_json::<SynthesizedProfile>(r#"{"summary": "x"}"#).is_err());
        assert!(parse_json::<SynthesizedProfile>(r#"{"confidence_score": "high"}"#).is_err());
    }

    #[test]
    fn known_details_render_lists_and_skip_nulls() {
        let p: SynthesizedProfile = parse_json(
            r#"{"confidence_score": 70,
                "occupation": "physicist",
                "notable_achievements": ["Nobel Prize in Physics", "Nobel Prize in Chemistry"],
                "death_info": null}"#,
        )
        .unwrap();

        let details = p.known_details();
        assert!(details.contains(&("occupation".into(), "physicist".into())));
        assert!(details.contains(&(
            "notable_achievements".into(),
            "Nobel Prize in Physics, Nobel Prize in Chemistry".into()
        )));
        assert!(!details.iter().any(|(k, _)| k == "death_info"));
    }

    #[test]
    fn verdict_defaults_to_not_confirmed() {
        let v: IdentityVerdict = parse_json("{}").unwrap();
        assert!(!v.is_same_person);
        assert!(v.facts().is_empty());

        assert!(!IdentityVerdict::fallback().is_same_person);
    }

    #[test]
    fn verdict_facts_are_stringified() {
        let v: IdentityVerdict = parse_json(
            r#"{"is_same_person": true, "reason": "same birth year",
                "new_facts": {"birth_year": 1867, "spouse": "Pierre", "blank": " "}}"#,
        )
        .unwrap();
        let mut facts = v.facts();
        facts.sort();
        assert_eq!(
            facts,
            vec![
                ("birth_year".to_string(), "1867".to_string()),
                ("spouse".to_string(), "Pierre".to_string()),
            ]
        );
    }

    #[test]
    fn fact_text_handles_every_shape() {
        assert_eq!(fact_text(&json!(null)), None);
        assert_eq!(fact_text(&json!("  ")), None);
        assert_eq!(fact_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(fact_text(&json!({})), None);
        assert_eq!(fact_text(&json!({"a": 1})).as_deref(), Some(r#"{"a":1}"#));
    }
}
