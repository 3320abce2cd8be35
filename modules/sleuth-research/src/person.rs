// Person research: classify, seed a frontier from search, crawl with identity
// verification until the frontier empties or time runs out, then synthesize.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ai_client::util::take_chars;
use rand::Rng;
use sleuth_common::{Config, InitialContext, PersonProfile, PersonType, SleuthError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classifier::classify_person;
use crate::extractor::ContentExtractor;
use crate::frontier::{Frontier, KeywordLog};
use crate::oracle::{parse_json, Oracle};
use crate::query_generator::QueryGenerator;
use crate::responses::{fact_text, FactMap};
use crate::scraper::{PageFetcher, WebSearcher};
use crate::synthesizer::ProfileSynthesizer;
use crate::text::clean_line;
use crate::verifier::IdentityVerifier;

/// Characters of confirmed text sent for details extraction.
const DETAILS_SAMPLE_CHARS: usize = 2000;
/// Characters of confirmed text sent for link and keyword discovery.
const DISCOVERY_SAMPLE_CHARS: usize = 1000;
/// Characters of an unparseable details reply kept in the discrepancy.
const RAW_PREVIEW_CHARS: usize = 200;

/// Keys under which the oracle nests social handles in details replies.
const NESTED_SOCIAL_KEYS: [&str; 3] = ["social_media", "social_media_handles", "social_media_links"];

/// Tunables shared by both research paths.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Polite delay after each search and each processed URL, drawn
    /// uniformly from `min_delay..=max_delay`.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Person-research budget used by `research_query`.
    pub duration: Duration,
    pub search_page_size: usize,
    pub requery_on_exhaustion: bool,
    pub query_variations: usize,
    pub summary_word_limit: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            duration: Duration::from_secs(5 * 60),
            search_page_size: 10,
            requery_on_exhaustion: false,
            query_variations: 2,
            summary_word_limit: 10_000,
        }
    }
}

impl ResearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            duration: config.research_duration,
            search_page_size: config.search_page_size,
            requery_on_exhaustion: config.requery_on_exhaustion,
            query_variations: config.query_variations,
            summary_word_limit: config.summary_word_limit,
            ..Self::default()
        }
    }

    fn polite_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Where a person-research run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Classifying,
    Seeding,
    Crawling,
    Synthesizing,
    Done,
}

/// Counters for one person-research run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResearchStats {
    pub queries_run: u32,
    pub urls_seeded: u32,
    pub urls_processed: u32,
    pub confirmed: u32,
    pub rejected: u32,
    pub fetch_failures: u32,
    pub empty_pages: u32,
    pub discovered_urls: u32,
    pub discovered_keywords: u32,
    pub requery_rounds: u32,
}

impl fmt::Display for ResearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Person research: {} queries, {} urls seeded, {} processed ({} confirmed, {} rejected, {} fetch failures, {} empty), {} urls and {} keywords discovered, {} requery rounds",
            self.queries_run,
            self.urls_seeded,
            self.urls_processed,
            self.confirmed,
            self.rejected,
            self.fetch_failures,
            self.empty_pages,
            self.discovered_urls,
            self.discovered_keywords,
            self.requery_rounds,
        )
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PersonReport {
    pub profile: PersonProfile,
    pub stats: ResearchStats,
    /// Every URL admitted to the frontier, in admission order.
    pub visited: Vec<String>,
}

/// State owned by exactly one run.
struct Run {
    profile: PersonProfile,
    person_type: PersonType,
    fingerprint: BTreeMap<String, String>,
    frontier: Frontier,
    keywords: KeywordLog,
    queries_run: HashSet<String>,
    deadline: Instant,
    phase: Phase,
    stats: ResearchStats,
}

impl Run {
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
    }
}

/// Outcome of processing one URL that did not fail.
enum PageOutcome {
    Confirmed,
    Empty,
}

pub struct PersonResearcher {
    oracle: Arc<Oracle>,
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    generator: QueryGenerator,
    verifier: IdentityVerifier,
    synthesizer: ProfileSynthesizer,
    settings: ResearchSettings,
    cancel: CancellationToken,
}

impl PersonResearcher {
    pub fn new(
        oracle: Arc<Oracle>,
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ContentExtractor>,
        settings: ResearchSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generator: QueryGenerator::new(oracle.clone()),
            verifier: IdentityVerifier::new(oracle.clone()),
            synthesizer: ProfileSynthesizer::new(oracle.clone()),
            oracle,
            searcher,
            fetcher,
            extractor,
            settings,
            cancel,
        }
    }

    /// Research one person within `duration`. Always returns a profile.
    pub async fn research(&self, context: &InitialContext, duration: Duration) -> PersonProfile {
        self.run(context, duration).await.profile
    }

    pub async fn run(&self, context: &InitialContext, duration: Duration) -> PersonReport {
        let name = context.name.trim();
        if name.is_empty() {
            let mut profile = PersonProfile::new("", PersonType::Unknown);
            profile.record_discrepancy("Person name is required");
            return PersonReport {
                profile,
                stats: ResearchStats::default(),
                visited: Vec::new(),
            };
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("research_person", %run_id, subject = name);
        self.run_inner(context, duration).instrument(span).await
    }

    async fn run_inner(&self, context: &InitialContext, duration: Duration) -> PersonReport {
        let name = context.name.trim().to_string();
        info!(duration_secs = duration.as_secs(), "Starting person research");

        let mut run = Run {
            profile: PersonProfile::new(name.clone(), PersonType::Unknown),
            person_type: PersonType::Unknown,
            fingerprint: BTreeMap::from([("name".to_string(), name.clone())]),
            frontier: Frontier::new(),
            keywords: KeywordLog::default(),
            queries_run: HashSet::new(),
            deadline: Instant::now() + duration,
            phase: Phase::Classifying,
            stats: ResearchStats::default(),
        };

        // CLASSIFYING
        let (person_type, seed_keywords) = classify_person(&self.oracle, context).await;
        run.person_type = person_type;
        run.profile.person_type = person_type;
        run.keywords = KeywordLog::new(seed_keywords);
        info!(person_type = %person_type, keywords = run.keywords.len(), "Person classified");

        // SEEDING
        run.enter(Phase::Seeding);
        self.seed(&mut run).await;
        info!(frontier = run.frontier.len(), "Frontier seeded");

        // CRAWLING
        run.enter(Phase::Crawling);
        self.crawl(&mut run).await;

        // SYNTHESIZING
        run.enter(Phase::Synthesizing);
        self.synthesizer
            .synthesize(&mut run.profile, &run.fingerprint)
            .await;

        run.enter(Phase::Done);
        info!(
            confidence = run.profile.confidence_score,
            discrepancies = run.profile.discrepancies.len(),
            "{}",
            run.stats
        );

        PersonReport {
            visited: run.frontier.history().to_vec(),
            profile: run.profile,
            stats: run.stats,
        }
    }

    fn should_stop(&self, run: &Run) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= run.deadline
    }

    /// Sleep for the polite delay, cut short by the deadline or cancellation.
    async fn pause(&self, run: &Run) {
        let wait = self
            .settings
            .polite_delay()
            .min(run.deadline.saturating_duration_since(Instant::now()));
        if wait.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Generate queries and admit every new result link to the frontier.
    async fn seed(&self, run: &mut Run) {
        let queries = self
            .generator
            .generate(&run.profile.name, run.person_type, run.keywords.all())
            .await;

        for query in queries {
            if self.should_stop(run) {
                info!(phase = ?run.phase, "Stopping searches early");
                break;
            }
            if !run.queries_run.insert(query.clone()) {
                continue;
            }
            run.stats.queries_run += 1;

            match self.searcher.search(&query, self.settings.search_page_size).await {
                Ok(results) => {
                    let added = results
                        .iter()
                        .filter(|r| run.frontier.push(&r.link))
                        .count();
                    run.stats.urls_seeded += added as u32;
                    debug!(query, results = results.len(), added, "Search results queued");
                }
                Err(e) => warn!(query, error = %e, "Search failed"),
            }

            self.pause(run).await;
        }
    }

    async fn crawl(&self, run: &mut Run) {
        let mut requeried = false;
        loop {
            let mark = run.keywords.checkpoint();

            while !self.should_stop(run) {
                let Some(url) = run.frontier.pop() else { break };
                run.stats.urls_processed += 1;

                match self.process_url(run, &url).await {
                    Ok(PageOutcome::Confirmed) => run.stats.confirmed += 1,
                    Ok(PageOutcome::Empty) => run.stats.empty_pages += 1,
                    Err(e) => {
                        match &e {
                            SleuthError::IdentityNotConfirmed { .. } => run.stats.rejected += 1,
                            SleuthError::FetchFailure { .. } => run.stats.fetch_failures += 1,
                            _ => {}
                        }
                        info!(url, error = %e, "URL not used");
                        run.profile.record_discrepancy(e.to_string());
                    }
                }

                self.pause(run).await;
            }

            if self.should_stop(run) {
                info!(
                    cancelled = self.cancel.is_cancelled(),
                    remaining = run.frontier.len(),
                    "Crawl stopped before the frontier emptied"
                );
                return;
            }

            // Frontier exhausted with time left.
            let fresh = run.keywords.since(mark).len();
            if !self.settings.requery_on_exhaustion || requeried || fresh == 0 {
                return;
            }
            requeried = true;
            run.stats.requery_rounds += 1;
            info!(fresh_keywords = fresh, "Frontier exhausted, generating queries from new keywords");
            self.seed(run).await;
            if run.frontier.is_empty() {
                return;
            }
        }
    }

    /// Fetch, extract, verify and accumulate one page.
    ///
    /// Errors are rendered into profile discrepancies by the caller.
    async fn process_url(&self, run: &mut Run, url: &str) -> sleuth_common::Result<PageOutcome> {
        info!(url, "Processing URL");
        let html = self.fetcher.fetch(url).await?;

        let mut text = self.extractor.extract_article(&html, url).text;
        if text.trim().is_empty() {
            debug!(url, "No article text, trying fallback extraction");
            text = self.extractor.extract_fallback(&html).unwrap_or_default();
        }
        if text.trim().is_empty() {
            info!(url, "No text extracted, skipping");
            return Ok(PageOutcome::Empty);
        }

        let verification = self
            .verifier
            .verify(&text, &run.profile.name, &run.fingerprint)
            .await;
        if !verification.is_same_person {
            return Err(SleuthError::IdentityNotConfirmed {
                url: url.to_string(),
                reason: verification.reason,
            });
        }

        info!(url, new_facts = verification.new_facts.len(), "Identity confirmed");
        run.fingerprint.extend(verification.new_facts);
        run.profile.keep_link(url);

        self.extract_details(run, url, &text).await;
        self.discover(run, &text).await;

        Ok(PageOutcome::Confirmed)
    }

    async fn extract_details(&self, run: &mut Run, url: &str, text: &str) {
        let prompt = format!(
            "From the following text about \"{}\", extract key details.\n\
             Focus on: occupation, education, notable achievements, affiliations, social media \
             handles (Instagram, Facebook, Twitter/X, LinkedIn), birth date/year, death date/year.\n\
             Reply with a single flat JSON object of string values. If a field is not found, omit it.\n\n\
             Text:\n{}",
            run.profile.name,
            take_chars(text, DETAILS_SAMPLE_CHARS)
        );

        let raw = match self.oracle.ask(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(url, error = %e, "Details extraction unavailable");
                run.profile
                    .record_discrepancy(format!("Failed to extract structured info from {url}: {e}"));
                return;
            }
        };

        match parse_json::<FactMap>(&raw) {
            Ok(facts) => merge_facts(&mut run.profile, facts),
            Err(e) => {
                warn!(url, error = %e, "Details reply was not JSON");
                run.profile.record_discrepancy(format!(
                    "Failed to parse structured info from {url}: {}",
                    take_chars(&raw, RAW_PREVIEW_CHARS)
                ));
            }
        }
    }

    /// Ask for follow-up URLs and keywords; URLs go to the frontier, the
    /// rest to the keyword log.
    async fn discover(&self, run: &mut Run, text: &str) {
        let prompt = format!(
            "From the following text about \"{}\", identify any new, relevant URLs or keywords \
             that could lead to more information about THIS SAME PERSON.\n\
             Provide URLs on new lines, followed by keywords on new lines. No other text.\n\n\
             Text:\n{}",
            run.profile.name,
            take_chars(text, DISCOVERY_SAMPLE_CHARS)
        );

        let reply = match self.oracle.ask(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Discovery unavailable");
                return;
            }
        };

        for line in reply.lines().map(clean_line) {
            if line.is_empty() || line.ends_with(':') {
                continue;
            }
            if line.starts_with("http://") || line.starts_with("https://") {
                if let Some(url) = candidate_url(&line) {
                    if run.frontier.push(&url) {
                        run.stats.discovered_urls += 1;
                    }
                }
            } else if !line.starts_with("http") && run.keywords.append(line) {
                run.stats.discovered_keywords += 1;
            }
        }
    }
}

/// First token of a discovery line, if it is a well-formed http(s) URL.
fn candidate_url(line: &str) -> Option<String> {
    let token = line
        .split_whitespace()
        .next()?
        .trim_end_matches([',', ';', ')', ']', '>']);
    let parsed = url::Url::parse(token).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| token.to_string())
}

/// Merge a details reply, lifting nested social-media objects into
/// `social_media`.
fn merge_facts(profile: &mut PersonProfile, facts: FactMap) {
    let mut flat = Vec::new();
    for (key, value) in facts {
        if NESTED_SOCIAL_KEYS.contains(&key.to_lowercase().as_str()) {
            if let serde_json::Value::Object(handles) = &value {
                let handles = handles
                    .iter()
                    .filter_map(|(platform, handle)| fact_text(handle).map(|h| (platform.clone(), h)));
                profile.merge_social(handles);
                continue;
            }
        }
        if let Some(text) = fact_text(&value) {
            flat.push((key, text));
        }
    }
    profile.merge_details(flat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_urls_must_parse() {
        assert_eq!(
            candidate_url("https://en.wikipedia.org/wiki/Marie_Curie - wiki").as_deref(),
            Some("https://en.wikipedia.org/wiki/Marie_Curie")
        );
        assert_eq!(candidate_url("https://"), None);
        assert_eq!(candidate_url("http:// spaced"), None);
    }

    #[test]
    fn nested_social_objects_are_flattened() {
        let mut profile = PersonProfile::new("Ada", PersonType::Famous);
        let facts: FactMap = serde_json::from_value(json!({
            "occupation": "mathematician",
            "social_media_handles": {"Twitter": "@ada", "Mastodon": "@ada@fosstodon"},
            "instagram": "@ada.lovelace",
            "birth_year": 1815,
        }))
        .unwrap();

        merge_facts(&mut profile, facts);

        assert_eq!(profile.details["occupation"], "mathematician");
        assert_eq!(profile.details["birth_year"], "1815");
        assert_eq!(profile.social_media["twitter"], "@ada");
        assert_eq!(profile.social_media["mastodon"], "@ada@fosstodon");
        assert_eq!(profile.social_media["instagram"], "@ada.lovelace");
        assert!(!profile.details.contains_key("social_media_handles"));
        for key in profile.social_media.keys() {
            assert!(!profile.details.contains_key(key));
        }
    }

    #[test]
    fn polite_delay_stays_in_range() {
        let settings = ResearchSettings {
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            ..ResearchSettings::default()
        };
        for _ in 0..50 {
            let d = settings.polite_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        let fixed = ResearchSettings {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..ResearchSettings::default()
        };
        assert_eq!(fixed.polite_delay(), Duration::ZERO);
    }

    #[test]
    fn stats_display_names_every_counter() {
        let stats = ResearchStats {
            queries_run: 4,
            confirmed: 2,
            ..Default::default()
        };
        let line = stats.to_string();
        assert!(line.starts_with("Person research: 4 queries"));
        assert!(line.contains("2 confirmed"));
    }
}
