use std::sync::Arc;

use tracing::{info, warn};

use crate::oracle::Oracle;
use crate::text::clean_line;

pub const MAX_VARIATIONS: usize = 10;

/// Rewrites a raw query into search-engine friendly variants.
pub struct QueryExpander {
    oracle: Arc<Oracle>,
}

impl QueryExpander {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }

    /// Up to `variations` (clamped to 1..=10) rewordings of `query`.
    ///
    /// Falls back to the query itself when the oracle fails or produces
    /// nothing usable, so a non-empty query always yields at least one.
    pub async fn expand(&self, query: &str, variations: usize) -> Vec<String> {
        let n = variations.clamp(1, MAX_VARIATIONS);
        let query = query.trim();
        let prompt = format!(
            "rewrite the following search query in {n} different ways to improve accuracy:\n\n\
             Query: {query}\n\n\
             Provide {n} variations, each on a new line. Reply with the queries only."
        );

        let reply = match self.oracle.ask(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(query, error = %e, "Query expansion failed, using original query");
                return vec![query.to_string()];
            }
        };

        let mut expanded: Vec<String> = Vec::new();
        for line in reply.lines().map(clean_line) {
            if line.is_empty() || expanded.iter().any(|q| q.eq_ignore_ascii_case(&line)) {
                continue;
            }
            expanded.push(line);
            if expanded.len() == n {
                break;
            }
        }

        if expanded.is_empty() {
            warn!(query, "Query expansion produced no usable lines, using original query");
            return vec![query.to_string()];
        }

        info!(query, variants = expanded.len(), "Query expanded");
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{oracle_with, ScriptedModel};

    const MARKER: &str = "rewrite the following search query";

    #[tokio::test]
    async fn strips_markers_and_dedupes() {
        let model = ScriptedModel::new().on(
            MARKER,
            "1. capital city of France\n\n- \"capital city of France\"\n2) Paris France capital\n3. France seat of government",
        );
        let expander = QueryExpander::new(Arc::new(oracle_with(model)));

        let queries = expander.expand("What is the capital of France?", 2).await;
        assert_eq!(queries, vec!["capital city of France", "Paris France capital"]);
    }

    #[tokio::test]
    async fn clamps_variation_count() {
        let model = ScriptedModel::new().on(MARKER, "a\nb\nc");
        let expander = QueryExpander::new(Arc::new(oracle_with(model.clone())));

        assert_eq!(expander.expand("q", 0).await, vec!["a"]);
        expander.expand("q", 50).await;
        assert!(model.prompts().last().unwrap().contains("in 10 different ways"));
    }

    #[tokio::test]
    async fn oracle_failure_keeps_original() {
        let expander = QueryExpander::new(Arc::new(oracle_with(ScriptedModel::failing("down"))));
        assert_eq!(expander.expand("  rust async  ", 3).await, vec!["rust async"]);

        let blank = ScriptedModel::new().on(MARKER, "\n  \n");
        let expander = QueryExpander::new(Arc::new(oracle_with(blank)));
        assert_eq!(expander.expand("rust async", 3).await, vec!["rust async"]);
    }
}
