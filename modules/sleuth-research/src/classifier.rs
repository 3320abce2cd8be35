use sleuth_common::{InitialContext, PersonType};
use tracing::info;

use crate::oracle::Oracle;
use crate::responses::{PersonClassification, QueryClassification};

const QUERY_PROMPT: &str = "\
Classify the following research query. Decide whether it asks about one specific, \
identifiable person (\"person\") or about a general topic, fact or question (\"general\").
If it is about a person, give the person's full name and, if the query says, what they \
are known for.

Query: ";

const PERSON_PROMPT: &str = "\
Analyze the following initial context about a person and classify their likely type \
(\"famous\", \"academic\", \"business\", \"local\" or \"unknown\"). Also suggest initial \
relevant keywords for searching this person online.

Initial context:";

/// What kind of research a query calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Person(InitialContext),
    General,
}

/// Route a free-text query. Anything that is not clearly about a named
/// person is treated as general research.
pub async fn classify_query(oracle: &Oracle, query: &str) -> QueryKind {
    let reply: QueryClassification = oracle
        .ask_or_fallback("query classification", &format!("{QUERY_PROMPT}{query}"))
        .await;

    let name = reply.person_name.as_deref().map(str::trim).unwrap_or_default();
    let kind = if reply.query_type.trim().eq_ignore_ascii_case("person") && !name.is_empty() {
        QueryKind::Person(InitialContext::new(
            name,
            reply.initial_context.unwrap_or_default().trim(),
        ))
    } else {
        QueryKind::General
    };

    info!(query, kind = ?kind, "Query classified");
    kind
}

/// Person type and seed keywords for a subject.
pub async fn classify_person(oracle: &Oracle, context: &InitialContext) -> (PersonType, Vec<String>) {
    let prompt = format!(
        "{PERSON_PROMPT}\nName: {}\nKnown for: {}",
        context.name,
        if context.known_for.is_empty() { "(not given)" } else { context.known_for.as_str() }
    );
    let reply: PersonClassification = oracle.ask_or_fallback("person classification", &prompt).await;

    let person_type = PersonType::from_tag(&reply.person_type);
    let keywords = reply
        .initial_keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    (person_type, keywords)
}
