// Test doubles for the research pipeline.
//
// One double per trait boundary:
// - ScriptedModel (ChatModel): replies routed by a marker phrase in the prompt
// - MockSearcher (WebSearcher): HashMap-based query→links
// - MockFetcher (PageFetcher): HashMap-based URL→HTML, records every fetch
// - PassthroughExtractor (ContentExtractor): treats fixture pages as plain text
//
// Each double is cheap to clone and clones share their recorded history, so a
// test can hand one copy to the researcher and inspect the other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::ChatModel;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use sleuth_common::{ArticleContent, Result, SearchResult, SleuthError};

use crate::extractor::{article_from, ContentExtractor};
use crate::oracle::Oracle;
use crate::person::ResearchSettings;
use crate::researcher::Researcher;
use crate::scraper::{PageFetcher, WebSearcher};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Chat backend that answers from a script.
///
/// The first route whose marker occurs in the user prompt answers; otherwise
/// the default reply is used; otherwise the call fails.
#[derive(Clone)]
pub struct ScriptedModel {
    name: String,
    routes: Vec<(String, Responder)>,
    default: Option<String>,
    latency: Option<Duration>,
    failing: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            routes: Vec::new(),
            default: None,
            latency: None,
            failing: false,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend whose every call errors.
    pub fn failing(name: &str) -> Self {
        Self {
            failing: true,
            ..Self::new().named(name)
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn on(self, marker: &str, reply: &str) -> Self {
        let reply = reply.to_string();
        self.on_with(marker, move |_| reply.clone())
    }

    /// Route to a closure that sees the full prompt.
    pub fn on_with<F>(mut self, marker: &str, responder: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.routes.push((marker.to_string(), Arc::new(responder)));
        self
    }

    pub fn with_default(mut self, reply: &str) -> Self {
        self.default = Some(reply.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every user prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of prompts that contained `marker`.
    pub fn calls_with(&self, marker: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(&self, _system: &str, user: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(user.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing {
            bail!("ScriptedModel {}: backend down", self.name);
        }

        if let Some((_, responder)) = self.routes.iter().find(|(marker, _)| user.contains(marker)) {
            return Ok(responder(user));
        }
        self.default
            .clone()
            .ok_or_else(|| anyhow!("ScriptedModel {}: no reply scripted for prompt", self.name))
    }
}

/// Oracle over a single scripted backend.
pub fn oracle_with(model: ScriptedModel) -> Oracle {
    Oracle::new(vec![Arc::new(model)], Duration::from_secs(5))
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SearchState {
    results: HashMap<String, Vec<SearchResult>>,
    fallback: Option<Vec<SearchResult>>,
    queries: Vec<String>,
}

/// Search double. Unregistered queries get the fallback results, or
/// `NoSearchResults` when there is none.
#[derive(Clone, Default)]
pub struct MockSearcher {
    state: Arc<Mutex<SearchState>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(self, query: &str, links: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(query.to_string(), links.iter().map(|l| search_result(l)).collect());
        self
    }

    pub fn with_fallback(self, links: &[&str]) -> Self {
        self.state.lock().unwrap().fallback = Some(links.iter().map(|l| search_result(l)).collect());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        let results = state
            .results
            .get(query)
            .or(state.fallback.as_ref())
            .map(|r| r.iter().take(max_results).cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        if results.is_empty() {
            return Err(SleuthError::NoSearchResults(query.to_string()));
        }
        Ok(results)
    }
}

pub fn search_result(link: &str) -> SearchResult {
    SearchResult {
        title: format!("Result for {link}"),
        link: link.to_string(),
        snippet: String::new(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FetchState {
    pages: HashMap<String, String>,
    default_page: Option<String>,
    fail_all: bool,
    fail_first: usize,
    history: Vec<String>,
}

/// Fetch double. Unregistered URLs get the default page, or a
/// `FetchFailure` when there is none.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetchState>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(self, url: &str, html: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_default_page(self, html: &str) -> Self {
        self.state.lock().unwrap().default_page = Some(html.to_string());
        self
    }

    /// Every fetch fails.
    pub fn failing_all(self) -> Self {
        self.state.lock().unwrap().fail_all = true;
        self
    }

    /// The first `n` fetches fail, whatever the URL.
    pub fn failing_first(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_first = n;
        self
    }

    /// Every URL fetched, in order, repeats included.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.history.push(url.to_string());

        let failure = |message: &str| SleuthError::FetchFailure {
            url: url.to_string(),
            message: message.to_string(),
        };
        if state.fail_all || call < state.fail_first {
            return Err(failure("MockFetcher: scripted failure"));
        }
        state
            .pages
            .get(url)
            .or(state.default_page.as_ref())
            .cloned()
            .ok_or_else(|| failure("MockFetcher: no page registered"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// PassthroughExtractor
// ---------------------------------------------------------------------------

/// Uses the fetched body as the article text, so fixtures can be plain text.
///
/// `fallback_only` empties every article so pages go through
/// `extract_fallback`, which answers from the registered page bodies.
#[derive(Debug, Clone)]
pub struct PassthroughExtractor {
    articles: bool,
    fallbacks: HashMap<String, String>,
}

impl Default for PassthroughExtractor {
    fn default() -> Self {
        Self {
            articles: true,
            fallbacks: HashMap::new(),
        }
    }
}

impl PassthroughExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Article extraction always comes back empty.
    pub fn fallback_only() -> Self {
        Self {
            articles: false,
            ..Self::default()
        }
    }

    /// Whole-document text returned for a page whose body is `html`.
    pub fn with_fallback(mut self, html: &str, text: &str) -> Self {
        self.fallbacks.insert(html.to_string(), text.to_string());
        self
    }
}

impl ContentExtractor for PassthroughExtractor {
    fn extract_article(&self, html: &str, _url: &str) -> ArticleContent {
        let text = if self.articles { html.trim().to_string() } else { String::new() };
        article_from(html, text)
    }

    fn extract_fallback(&self, html: &str) -> Option<String> {
        self.fallbacks.get(html).cloned()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Settings with no polite delay, for tests.
pub fn fast_settings() -> ResearchSettings {
    ResearchSettings {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        ..ResearchSettings::default()
    }
}

/// Researcher wired to the given doubles with no polite delay.
pub fn test_researcher(model: ScriptedModel, searcher: MockSearcher, fetcher: MockFetcher) -> Researcher {
    Researcher::new(
        Arc::new(oracle_with(model)),
        Arc::new(searcher),
        Arc::new(fetcher),
        Arc::new(PassthroughExtractor::new()),
    )
    .with_settings(fast_settings())
}
