pub mod config;
pub mod error;
pub mod types;

pub use config::{duration_from_minutes, Config, OracleBackend, SearchBackend};
pub use error::{Result, SleuthError};
pub use types::*;
