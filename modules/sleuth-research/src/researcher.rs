use std::sync::Arc;
use std::time::Duration;

use sleuth_common::{Config, InitialContext, PersonProfile, ResearchOutput, SearchBackend, SleuthError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classifier::{classify_query, QueryKind};
use crate::extractor::{ContentExtractor, ReadabilityExtractor};
use crate::general::GeneralResearcher;
use crate::oracle::Oracle;
use crate::person::{PersonReport, PersonResearcher, ResearchSettings};
use crate::scraper::{
    BrowserlessFetcher, GoogleSearcher, HttpFetcher, PageFetcher, RetryPolicy, RetryingFetcher,
    SerperSearcher, WebSearcher,
};

/// Entry point: one oracle and one set of collaborators, shared by every run.
pub struct Researcher {
    oracle: Arc<Oracle>,
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    settings: ResearchSettings,
    cancel: CancellationToken,
}

impl Researcher {
    pub fn new(
        oracle: Arc<Oracle>,
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Self {
        Self {
            oracle,
            searcher,
            fetcher,
            extractor,
            settings: ResearchSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> sleuth_common::Result<Self> {
        let oracle = Arc::new(Oracle::from_config(config));
        if config.oracle_backends.is_empty() {
            warn!("No oracle backends configured; every oracle call will fall back");
        }

        let searcher: Arc<dyn WebSearcher> = match &config.search {
            SearchBackend::Serper { api_key } => Arc::new(SerperSearcher::new(api_key)?),
            SearchBackend::Google { api_key, engine_id } => {
                Arc::new(GoogleSearcher::new(api_key, engine_id)?)
            }
        };

        let policy = RetryPolicy::with_attempts(config.fetch_retries);
        let fetcher: Arc<dyn PageFetcher> = match &config.browserless_url {
            Some(url) => Arc::new(RetryingFetcher::new(
                BrowserlessFetcher::new(url, config.browserless_token.as_deref())?,
                policy,
            )),
            None => Arc::new(RetryingFetcher::new(HttpFetcher::new()?, policy)),
        };

        info!(
            backends = ?oracle.backend_names(),
            fetcher = fetcher.name(),
            "Researcher ready"
        );

        Ok(Self::new(oracle, searcher, fetcher, Arc::new(ReadabilityExtractor))
            .with_settings(ResearchSettings::from_config(config)))
    }

    pub fn with_settings(mut self, settings: ResearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Stop runs early when `token` is cancelled. Runs still synthesize
    /// what they have.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Classify `query` and run the matching research path.
    pub async fn research_query(&self, query: &str) -> ResearchOutput {
        let query = query.trim();
        if query.is_empty() {
            return ResearchOutput::Error("Query is empty".to_string());
        }

        match classify_query(&self.oracle, query).await {
            QueryKind::Person(context) => {
                info!(subject = %context.name, "Detected person search");
                let profile = self.research_person(&context, self.settings.duration).await;
                ResearchOutput::Profile(Box::new(profile))
            }
            QueryKind::General => match self.general().research(query).await {
                Ok(summary) => ResearchOutput::Summary(summary),
                Err(e) => {
                    warn!(query, error = %e, "General research failed");
                    ResearchOutput::Error(e.to_string())
                }
            },
        }
    }

    pub async fn research_person(&self, context: &InitialContext, duration: Duration) -> PersonProfile {
        self.person().research(context, duration).await
    }

    /// `research_person` plus run statistics and the visit history.
    pub async fn research_person_report(&self, context: &InitialContext, duration: Duration) -> PersonReport {
        self.person().run(context, duration).await
    }

    /// General-path summary, surfacing the failure as an error.
    pub async fn research_general(&self, query: &str) -> Result<String, SleuthError> {
        self.general().research(query).await
    }

    fn person(&self) -> PersonResearcher {
        PersonResearcher::new(
            self.oracle.clone(),
            self.searcher.clone(),
            self.fetcher.clone(),
            self.extractor.clone(),
            self.settings.clone(),
            self.cancel.clone(),
        )
    }

    fn general(&self) -> GeneralResearcher {
        GeneralResearcher::new(
            self.oracle.clone(),
            self.searcher.clone(),
            self.fetcher.clone(),
            self.extractor.clone(),
            self.settings.clone(),
        )
    }
}
