use std::collections::BTreeMap;
use std::sync::Arc;

use sleuth_common::PersonProfile;
use tracing::{info, warn};

use crate::oracle::Oracle;
use crate::responses::SynthesizedProfile;

/// Confidence assigned when the accumulated data could not be synthesized.
pub const CONFIDENCE_FLOOR: u8 = 10;

/// Consolidates accumulated facts into the final profile.
pub struct ProfileSynthesizer {
    oracle: Arc<Oracle>,
}

impl ProfileSynthesizer {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }

    /// Merge the oracle's consolidated view into `profile`. Never fails: an
    /// unusable reply leaves the raw details in the summary and sets the
    /// confidence floor.
    pub async fn synthesize(&self, profile: &mut PersonProfile, fingerprint: &BTreeMap<String, String>) {
        let prompt = format!(
            "Consolidate and synthesize the following raw extracted data about \"{}\" into a \
             comprehensive, well-structured profile.\n\
             Resolve inconsistencies where possible, or list them under discrepancies.\n\
             Include a confidence_score (integer 0-100) based on the consistency and number of \
             corroborating sources.\n\n\
             Extracted Details: {}\n\
             Social Media: {}\n\
             Discrepancies encountered during search: {}\n\
             Identity Fingerprint: {}",
            profile.name,
            to_json(&profile.details),
            to_json(&profile.social_media),
            serde_json::to_string(&profile.discrepancies).unwrap_or_default(),
            to_json(fingerprint),
        );

        match self.oracle.ask_json::<SynthesizedProfile>(&prompt).await {
            Ok(synthesized) => {
                merge(profile, synthesized);
                info!(
                    subject = %profile.name,
                    confidence = profile.confidence_score,
                    "Profile synthesized"
                );
            }
            Err(e) => {
                warn!(subject = %profile.name, error = %e, "Synthesis failed, keeping raw details");
                profile.summary = format!(
                    "Failed to synthesize a structured profile. Raw details: {}",
                    to_json(&profile.details)
                );
                profile.confidence_score = CONFIDENCE_FLOOR;
            }
        }
    }
}

fn merge(profile: &mut PersonProfile, synthesized: SynthesizedProfile) {
    let summary = synthesized.summary.trim();
    if !summary.is_empty() {
        profile.summary = summary.to_string();
    }

    profile.merge_details(synthesized.known_details());
    profile.merge_social(synthesized.social_links());

    for discrepancy in &synthesized.discrepancies {
        let discrepancy = discrepancy.trim();
        if !discrepancy.is_empty() && !profile.discrepancies.iter().any(|d| d == discrepancy) {
            profile.record_discrepancy(discrepancy);
        }
    }

    profile.confidence_score = synthesized.confidence_score.min(100);
}

fn to_json(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string(map).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{oracle_with, ScriptedModel};
    use sleuth_common::PersonType;

    const MARKER: &str = "Consolidate and synthesize";

    fn profile() -> PersonProfile {
        let mut profile = PersonProfile::new("Marie Curie", PersonType::Academic);
        profile.details.insert("occupation".into(), "scientist".into());
        profile.record_discrepancy("Skipped URL https://x.example: namesake");
        profile
    }

    #[tokio::test]
    async fn merges_reply_into_profile() {
        let model = ScriptedModel::new().on(
            MARKER,
            r#"{"summary": "Physicist and chemist.",
                "education": "University of Paris",
                "social_media_links": {"Twitter": "@curie"},
                "discrepancies": ["Skipped URL https://x.example: namesake", "birth year differs"],
                "confidence_score": "82"}"#,
        );
        let synth = ProfileSynthesizer::new(Arc::new(oracle_with(model)));

        let mut p = profile();
        synth.synthesize(&mut p, &BTreeMap::new()).await;

        assert_eq!(p.summary, "Physicist and chemist.");
        assert_eq!(p.confidence_score, 82);
        assert_eq!(p.details["occupation"], "scientist");
        assert_eq!(p.details["education"], "University of Paris");
        assert_eq!(p.social_media["twitter"], "@curie");
        assert_eq!(p.discrepancies.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_reply_sets_floor() {
        let model = ScriptedModel::new().on(MARKER, "Marie Curie was great. Confidence: high.");
        let synth = ProfileSynthesizer::new(Arc::new(oracle_with(model)));

        let mut p = profile();
        synth.synthesize(&mut p, &BTreeMap::new()).await;

        assert_eq!(p.confidence_score, CONFIDENCE_FLOOR);
        assert!(p.summary.starts_with("Failed to synthesize a structured profile."));
        assert!(p.summary.contains("scientist"));
    }

    #[tokio::test]
    async fn empty_summary_keeps_previous() {
        let model = ScriptedModel::new().on(MARKER, r#"{"summary": " ", "confidence_score": 40}"#);
        let synth = ProfileSynthesizer::new(Arc::new(oracle_with(model)));

        let mut p = profile();
        p.summary = "kept".into();
        synth.synthesize(&mut p, &BTreeMap::new()).await;
        assert_eq!(p.summary, "kept");
        assert_eq!(p.confidence_score, 40);
    }
}
