use thiserror::Error;

pub type Result<T> = std::result::Result<T, SleuthError>;

/// Failure taxonomy shared by the research pipeline.
///
/// Inside the person-research loop every variant is rendered with `Display`
/// into a profile discrepancy; only the general-research path surfaces
/// `NoSearchResults` / `NoArticles` to the caller. Oracle failures have their
/// own type in the research crate and are rendered at the call site.
#[derive(Error, Debug)]
pub enum SleuthError {
    #[error("Failed to fetch {url}: {message}")]
    FetchFailure { url: String, message: String },

    #[error("No search results found for: {0}")]
    NoSearchResults(String),

    #[error("Search API rejected the key: {0}")]
    InvalidSearchKey(String),

    #[error("Could not extract any article content for: {0}")]
    NoArticles(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Skipped URL {url}: {reason}")]
    IdentityNotConfirmed { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrepancy_messages_name_the_url() {
        let err = SleuthError::IdentityNotConfirmed {
            url: "https://example.com/a".into(),
            reason: "different birth year".into(),
        };
        assert_eq!(
            err.to_string(),
            "Skipped URL https://example.com/a: different birth year"
        );

        let err = SleuthError::FetchFailure {
            url: "https://example.com/b".into(),
            message: "retries exhausted".into(),
        };
        assert!(err.to_string().contains("https://example.com/b"));
    }
}
