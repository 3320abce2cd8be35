use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

/// Oracle backends, in the order the fallback chain tries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleBackend {
    Anthropic { api_key: String, model: String },
    OpenAi { api_key: String, model: String },
    OpenRouter { api_key: String, model: String },
    /// Keyless OpenAI-compatible server (llama.cpp, Ollama).
    Local { base_url: String, model: String },
}

impl OracleBackend {
    pub fn label(&self) -> &'static str {
        match self {
            OracleBackend::Anthropic { .. } => "anthropic",
            OracleBackend::OpenAi { .. } => "openai",
            OracleBackend::OpenRouter { .. } => "openrouter",
            OracleBackend::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchBackend {
    Serper { api_key: String },
    Google { api_key: String, engine_id: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Oracle
    pub oracle_backends: Vec<OracleBackend>,
    pub oracle_timeout: Duration,

    // Search
    pub search: SearchBackend,
    pub search_page_size: usize,

    // Fetch
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub fetch_retries: u32,

    // Research
    pub research_duration: Duration,
    pub summary_word_limit: usize,
    pub query_variations: usize,
    pub requery_on_exhaustion: bool,
}

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemma-3-12b-it";
const DEFAULT_LOCAL_MODEL: &str = "gemma-3-1b-it";

impl Config {
    /// Load configuration from the environment (and a `.env` file if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let search = match (get("SERPER_API_KEY"), get("GOOGLE_API_KEY"), get("GOOGLE_CSE_ID")) {
            (Some(api_key), _, _) => SearchBackend::Serper { api_key },
            (None, Some(api_key), Some(engine_id)) => SearchBackend::Google { api_key, engine_id },
            _ => bail!("SERPER_API_KEY or GOOGLE_API_KEY + GOOGLE_CSE_ID is required"),
        };

        let oracle_backends = match get("ORACLE_BACKENDS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|name| backend_from(name, &get))
                .collect::<Result<Vec<_>>>()?,
            None => ["anthropic", "openai", "openrouter", "local"]
                .into_iter()
                .filter_map(|name| backend_from(name, &get).ok())
                .collect(),
        };

        Ok(Self {
            oracle_backends,
            oracle_timeout: Duration::from_secs(parse_or(&get, "ORACLE_TIMEOUT_SECS", 120)?),
            search,
            search_page_size: parse_or(&get, "SEARCH_PAGE_SIZE", 10)?,
            browserless_url: get("BROWSERLESS_URL"),
            browserless_token: get("BROWSERLESS_TOKEN"),
            fetch_retries: parse_or(&get, "FETCH_RETRIES", 3)?,
            research_duration: {
                let minutes = parse_or(&get, "RESEARCH_DURATION_MINUTES", 5u64)?;
                duration_from_minutes(minutes)
                    .ok_or_else(|| anyhow!("RESEARCH_DURATION_MINUTES is too large: {minutes}"))?
            },
            summary_word_limit: parse_or(&get, "SUMMARY_WORD_LIMIT", 10_000)?,
            query_variations: parse_or(&get, "QUERY_VARIATIONS", 2)?,
            requery_on_exhaustion: parse_or(&get, "REQUERY_ON_EXHAUSTION", false)?,
        })
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        for backend in &self.oracle_backends {
            match backend {
                OracleBackend::Anthropic { api_key, model }
                | OracleBackend::OpenAi { api_key, model }
                | OracleBackend::OpenRouter { api_key, model } => {
                    tracing::info!("  oracle {}: {} key={}", backend.label(), model, preview(api_key));
                }
                OracleBackend::Local { base_url, model } => {
                    tracing::info!("  oracle local: {} at {}", model, base_url);
                }
            }
        }
        if self.oracle_backends.is_empty() {
            tracing::warn!("  no oracle backends configured, every oracle call will fail closed");
        }
        match &self.search {
            SearchBackend::Serper { api_key } => {
                tracing::info!("  SERPER_API_KEY: {}", preview(api_key));
            }
            SearchBackend::Google { api_key, engine_id } => {
                tracing::info!("  GOOGLE_API_KEY: {} (cse {})", preview(api_key), engine_id);
            }
        }
        tracing::info!(
            "  BROWSERLESS_URL: {}",
            self.browserless_url.as_deref().unwrap_or("<not set, direct HTTP>")
        );
    }
}

fn backend_from<G>(name: &str, get: &G) -> Result<OracleBackend>
where
    G: Fn(&str) -> Option<String>,
{
    let model = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
    let required = |key: &str| {
        get(key).ok_or_else(|| anyhow!("{key} is required for the {name} oracle backend"))
    };

    Ok(match name.to_lowercase().as_str() {
        "anthropic" | "claude" => OracleBackend::Anthropic {
            api_key: required("ANTHROPIC_API_KEY")?,
            model: model("ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL),
        },
        "openai" => OracleBackend::OpenAi {
            api_key: required("OPENAI_API_KEY")?,
            model: model("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
        },
        "openrouter" => OracleBackend::OpenRouter {
            api_key: required("OPENROUTER_API_KEY")?,
            model: model("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL),
        },
        "local" => OracleBackend::Local {
            base_url: required("LOCAL_LLM_URL")?,
            model: model("LOCAL_LLM_MODEL", DEFAULT_LOCAL_MODEL),
        },
        other => bail!("Unknown oracle backend '{other}' in ORACLE_BACKENDS"),
    })
}

/// `minutes` as a `Duration`, or `None` when the seconds overflow `u64`.
pub fn duration_from_minutes(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} must be a valid value, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn search_backend_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("SERPER_API_KEY"));
    }

    #[test]
    fn serper_preferred_over_google() {
        let config = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "serper"),
            ("GOOGLE_API_KEY", "g"),
            ("GOOGLE_CSE_ID", "cx"),
        ]))
        .unwrap();
        assert_eq!(config.search, SearchBackend::Serper { api_key: "serper".into() });
    }

    #[test]
    fn default_backends_follow_present_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "s"),
            ("OPENAI_API_KEY", "sk"),
            ("LOCAL_LLM_URL", "http://localhost:8080/v1"),
        ]))
        .unwrap();
        let labels: Vec<_> = config.oracle_backends.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec!["openai", "local"]);
        assert_eq!(config.research_duration, Duration::from_secs(300));
        assert_eq!(config.summary_word_limit, 10_000);
        assert!(!config.requery_on_exhaustion);
    }

    #[test]
    fn explicit_backend_order_is_kept() {
        let config = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "s"),
            ("ORACLE_BACKENDS", "local, anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("LOCAL_LLM_URL", "http://localhost:11434/v1"),
            ("LOCAL_LLM_MODEL", "llama3"),
        ]))
        .unwrap();
        assert_eq!(
            config.oracle_backends,
            vec![
                OracleBackend::Local {
                    base_url: "http://localhost:11434/v1".into(),
                    model: "llama3".into()
                },
                OracleBackend::Anthropic {
                    api_key: "sk-ant".into(),
                    model: DEFAULT_ANTHROPIC_MODEL.into()
                },
            ]
        );
    }

    #[test]
    fn explicit_backend_missing_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "s"),
            ("ORACLE_BACKENDS", "openai"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "s"),
            ("SEARCH_PAGE_SIZE", "ten"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SEARCH_PAGE_SIZE"));
    }

    #[test]
    fn oversized_duration_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[
            ("SERPER_API_KEY", "s"),
            ("RESEARCH_DURATION_MINUTES", &u64::MAX.to_string()),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RESEARCH_DURATION_MINUTES is too large"));

        assert_eq!(duration_from_minutes(2), Some(Duration::from_secs(120)));
        assert_eq!(duration_from_minutes(u64::MAX / 60 + 1), None);
    }
}
