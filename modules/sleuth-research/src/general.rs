// General research: expand the query, search each variant, read every result
// once, and summarize what was read.

use std::collections::HashSet;
use std::sync::Arc;

use sleuth_common::{Result, SearchResult, SleuthError};
use tracing::{info, warn};

use crate::expander::QueryExpander;
use crate::extractor::ContentExtractor;
use crate::oracle::Oracle;
use crate::person::ResearchSettings;
use crate::scraper::{PageFetcher, WebSearcher};
use crate::text::{truncate_by_words, word_count};

pub struct GeneralResearcher {
    oracle: Arc<Oracle>,
    expander: QueryExpander,
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    settings: ResearchSettings,
}

impl GeneralResearcher {
    pub fn new(
        oracle: Arc<Oracle>,
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ContentExtractor>,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            expander: QueryExpander::new(oracle.clone()),
            oracle,
            searcher,
            fetcher,
            extractor,
            settings,
        }
    }

    /// Summary text for `query`, or the reason there is none.
    pub async fn research(&self, query: &str) -> Result<String> {
        let variants = self.expander.expand(query, self.settings.query_variations).await;
        info!(query, variants = ?variants, "Researching general query");

        let results = self.search_all(&variants).await;
        if results.is_empty() {
            return Err(SleuthError::NoSearchResults(query.to_string()));
        }
        info!(query, results = results.len(), "Search results collected");

        let articles = self.read_all(&results).await;
        if articles.is_empty() {
            return Err(SleuthError::NoArticles(query.to_string()));
        }
        info!(query, articles = articles.len(), "Articles extracted");

        let corpus = articles.join("\n\n");
        let text = truncate_by_words(&corpus, self.settings.summary_word_limit);
        info!(words = word_count(&corpus), kept = word_count(&text), "Text prepared for summary");

        self.summarize(&text).await
    }

    /// Results of every variant, each link once.
    async fn search_all(&self, variants: &[String]) -> Vec<SearchResult> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for variant in variants {
            match self.searcher.search(variant, self.settings.search_page_size).await {
                Ok(found) => results.extend(found.into_iter().filter(|r| seen.insert(r.link.clone()))),
                Err(e) => warn!(query = %variant, error = %e, "Search failed, skipping variant"),
            }
        }
        results
    }

    async fn read_all(&self, results: &[SearchResult]) -> Vec<String> {
        let mut articles = Vec::new();
        for result in results {
            let html = match self.fetcher.fetch(&result.link).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %result.link, error = %e, "Error crawling result, skipping");
                    continue;
                }
            };
            let article = self.extractor.extract_article(&html, &result.link);
            if article.text.trim().is_empty() {
                warn!(url = %result.link, "No article text, skipping");
                continue;
            }
            articles.push(article.text);
        }
        articles
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!("Summarize the following text concisely:\n\n{text}\n\nSummary:");
        let summary = self
            .oracle
            .ask(&prompt)
            .await
            .map_err(|e| SleuthError::Summarization(e.to_string()))?;
        if summary.trim().is_empty() {
            return Err(SleuthError::Summarization("empty summary".to_string()));
        }
        Ok(summary)
    }
}
