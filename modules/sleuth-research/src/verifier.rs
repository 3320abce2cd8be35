use std::collections::BTreeMap;
use std::sync::Arc;

use ai_client::util::take_chars;
use tracing::warn;

use crate::oracle::Oracle;
use crate::responses::IdentityVerdict;

/// Characters of page text shown to the oracle for verification.
pub const VERIFY_SAMPLE_CHARS: usize = 1000;

/// Outcome of checking one page against the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub is_same_person: bool,
    pub new_facts: Vec<(String, String)>,
    pub reason: String,
}

/// Decides whether a page is about the subject or a namesake.
///
/// Fails closed: an oracle error or an unparseable reply is a rejection, and
/// a rejection never carries facts.
pub struct IdentityVerifier {
    oracle: Arc<Oracle>,
}

impl IdentityVerifier {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }

    pub async fn verify(
        &self,
        text: &str,
        name: &str,
        fingerprint: &BTreeMap<String, String>,
    ) -> Verification {
        let known_facts = if fingerprint.is_empty() {
            "None".to_string()
        } else {
            fingerprint
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let prompt = format!(
            "Analyze the following text and determine if it is primarily about \"{name}\".\n\
             Consider these known facts about the person for identity verification: {known_facts}.\n\
             If it is the same person, extract any new, concrete facts (birth year, specific \
             achievements, affiliations, social media handles) that help confirm identity or build \
             a profile, as string values keyed by fact name.\n\
             If it is a different person with a similar name, say so and give no facts.\n\n\
             Text:\n{}",
            take_chars(text, VERIFY_SAMPLE_CHARS)
        );

        let verdict = match self.oracle.ask_json::<IdentityVerdict>(&prompt).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(name, error = %e, "Identity verification failed, treating as not confirmed");
                return Verification {
                    is_same_person: false,
                    new_facts: Vec::new(),
                    reason: format!("Identity verification failed: {e}"),
                };
            }
        };

        if !verdict.is_same_person {
            let reason = match verdict.reason.trim() {
                "" => "Identity not confirmed.".to_string(),
                reason => reason.to_string(),
            };
            return Verification {
                is_same_person: false,
                new_facts: Vec::new(),
                reason,
            };
        }

        Verification {
            is_same_person: true,
            new_facts: verdict.facts(),
            reason: verdict.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{oracle_with, ScriptedModel};

    const MARKER: &str = "determine if it is primarily about";

    fn fingerprint() -> BTreeMap<String, String> {
        BTreeMap::from([("name".to_string(), "Marie Curie".to_string())])
    }

    #[tokio::test]
    async fn confirmed_page_returns_facts() {
        let model = ScriptedModel::new().on(
            MARKER,
            r#"{"is_same_person": true, "new_facts": {"occupation": "scientist"}, "reason": "match"}"#,
        );
        let verifier = IdentityVerifier::new(Arc::new(oracle_with(model.clone())));

        let v = verifier.verify("Marie Curie was a physicist", "Marie Curie", &fingerprint()).await;
        assert!(v.is_same_person);
        assert_eq!(v.new_facts, vec![("occupation".to_string(), "scientist".to_string())]);
        assert!(model.prompts()[0].contains("name: Marie Curie"));
    }

    #[tokio::test]
    async fn malformed_reply_fails_closed() {
        let model = ScriptedModel::new().on(MARKER, "yes it's definitely her {occupation: scientist");
        let verifier = IdentityVerifier::new(Arc::new(oracle_with(model)));

        let v = verifier.verify("text", "Marie Curie", &fingerprint()).await;
        assert!(!v.is_same_person);
        assert!(v.new_facts.is_empty());
        assert!(v.reason.starts_with("Identity verification failed"));
    }

    #[tokio::test]
    async fn rejection_drops_facts() {
        let model = ScriptedModel::new().on(
            MARKER,
            r#"{"is_same_person": false, "new_facts": {"occupation": "chef"}, "reason": ""}"#,
        );
        let verifier = IdentityVerifier::new(Arc::new(oracle_with(model)));

        let v = verifier.verify("text", "Marie Curie", &BTreeMap::new()).await;
        assert!(!v.is_same_person);
        assert!(v.new_facts.is_empty());
        assert_eq!(v.reason, "Identity not confirmed.");
    }

    #[tokio::test]
    async fn only_the_leading_sample_is_sent() {
        let model = ScriptedModel::new().on(MARKER, r#"{"is_same_person": false, "reason": "no"}"#);
        let verifier = IdentityVerifier::new(Arc::new(oracle_with(model.clone())));

        let text = format!("{}{}", "a".repeat(VERIFY_SAMPLE_CHARS), "ZZZ");
        verifier.verify(&text, "X", &BTreeMap::new()).await;
        assert!(!model.prompts()[0].contains("ZZZ"));
    }
}
