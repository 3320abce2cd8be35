pub mod classifier;
pub mod expander;
pub mod extractor;
pub mod frontier;
pub mod general;
pub mod oracle;
pub mod person;
pub mod query_generator;
pub mod researcher;
pub mod responses;
pub mod scraper;
pub mod synthesizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod text;
pub mod verifier;

pub use oracle::{Oracle, OracleError};
pub use person::{PersonReport, ResearchSettings, ResearchStats};
pub use researcher::Researcher;
