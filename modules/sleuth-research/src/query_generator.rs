use std::sync::Arc;

use sleuth_common::PersonType;
use tracing::{debug, warn};

use crate::oracle::Oracle;
use crate::text::clean_line;

/// Fixed search templates per person type, appended to the subject's name.
fn templates(person_type: PersonType) -> &'static [&'static str] {
    match person_type {
        PersonType::Famous => &["Instagram", "Facebook", "Twitter X.com", "official website"],
        PersonType::Academic => &["university", "researchgate", "Google Scholar", "publications"],
        PersonType::Business => &["LinkedIn", "company", "executive profile"],
        PersonType::Local | PersonType::Unknown => &[],
    }
}

const UNIVERSAL: [&str; 2] = ["biography", "news"];

/// Builds the next round of search queries for a subject.
pub struct QueryGenerator {
    oracle: Arc<Oracle>,
}

impl QueryGenerator {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }

    /// Rule-based queries for the person type, then oracle suggestions, then
    /// the universal biography/news queries. First occurrence wins when two
    /// queries are equal after trimming.
    pub async fn generate(
        &self,
        name: &str,
        person_type: PersonType,
        keywords: &[String],
    ) -> Vec<String> {
        let name = name.trim();
        let mut queries = Vec::new();
        let mut push = |query: String| {
            let query = query.trim().to_string();
            if !query.is_empty() && !queries.contains(&query) {
                queries.push(query);
            }
        };

        for suffix in templates(person_type) {
            push(format!("{name} {suffix}"));
        }

        let prompt = format!(
            "Given the person's name \"{name}\", their classified type \"{person_type}\", and \
             current keywords [{}], generate 3-5 additional, highly relevant and diverse search \
             queries to find more information about them.\n\
             Focus on unique identifiers, achievements, or specific affiliations.\n\
             Provide each query on a new line, with no other text.",
            keywords.join(", ")
        );
        match self.oracle.ask(&prompt).await {
            Ok(reply) => reply.lines().map(clean_line).for_each(&mut push),
            Err(e) => warn!(name, error = %e, "Oracle query suggestions unavailable"),
        }

        for suffix in UNIVERSAL {
            push(format!("{name} {suffix}"));
        }

        debug!(name, count = queries.len(), "Generated search queries");
        queries
    }
}
