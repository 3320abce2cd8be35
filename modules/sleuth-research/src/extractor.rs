// Article extraction: Readability main content, page metadata, and a
// whole-document text fallback.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use sleuth_common::ArticleContent;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};

use crate::text::sentences;

const SUMMARY_SENTENCES: usize = 3;
const MAX_KEYWORDS: usize = 10;

pub trait ContentExtractor: Send + Sync {
    /// Main article content of a page. `text` is empty when nothing was found.
    fn extract_article(&self, html: &str, url: &str) -> ArticleContent;

    /// Whole-document text, for pages where article extraction found nothing.
    fn extract_fallback(&self, html: &str) -> Option<String>;
}

/// spider_transformations Readability for articles, html2text as fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityExtractor;

impl ContentExtractor for ReadabilityExtractor {
    fn extract_article(&self, html: &str, url: &str) -> ArticleContent {
        let parsed_url = url::Url::parse(url).ok();
        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: parsed_url.as_ref(),
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let text = transform_content_input(input, &config).trim().to_string();
        article_from(html, text)
    }

    fn extract_fallback(&self, html: &str) -> Option<String> {
        let text = html2text::from_read(html.as_bytes(), 80).unwrap_or_default();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Assemble an article from already-extracted text plus the page's metadata.
pub fn article_from(html: &str, text: String) -> ArticleContent {
    ArticleContent {
        title: page_title(html).unwrap_or_default(),
        summary: summarize(&text),
        keywords: keywords(&text),
        publish_date: publish_date(html),
        text,
    }
}

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("valid regex")
});
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static PUBLISHED_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+(?:property|name|itemprop)\s*=\s*["'](?:article:published_time|datePublished|pubdate|date)["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
    .expect("valid regex")
});
static JSON_LD_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""datePublished"\s*:\s*"([^"]+)""#).expect("valid regex")
});
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]{2,}").expect("valid regex"));

pub fn page_title(html: &str) -> Option<String> {
    OG_TITLE
        .captures(html)
        .or_else(|| TITLE_TAG.captures(html))
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

pub fn publish_date(html: &str) -> Option<DateTime<Utc>> {
    let raw = PUBLISHED_META
        .captures(html)
        .or_else(|| JSON_LD_DATE.captures(html))?[1]
        .trim()
        .to_string();

    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            let day = raw.get(..10)?;
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
        })
}

fn summarize(text: &str) -> String {
    sentences(text)
        .into_iter()
        .take(SUMMARY_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ")
}

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
        "was", "one", "our", "out", "has", "him", "his", "how", "its", "may", "new", "now",
        "old", "see", "two", "who", "did", "get", "she", "too", "use", "that", "with", "have",
        "this", "will", "your", "from", "they", "been", "were", "said", "each", "which",
        "their", "there", "what", "about", "would", "these", "other", "into", "than", "then",
        "them", "some", "could", "when", "where", "also", "after", "over", "more", "most",
        "such", "only", "very", "just", "being", "while", "because", "between", "during",
        "before", "under", "both", "those", "through", "upon", "whom", "here", "http", "https",
        "www", "com",
    ]
    .into_iter()
    .collect()
});

/// Most frequent non-stopword terms, ties broken alphabetically.
fn keywords(text: &str) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for word in WORD.find_iter(text) {
        let word = word.as_str().trim_matches(|c: char| c == '\'' || c == '-').to_lowercase();
        if word.len() < 3 || STOPWORDS.contains(word.as_str()) {
            continue;
        }
        *counts.entry(word).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_KEYWORDS).map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const PAGE: &str = r#"<html><head>
        <title>Fallback title</title>
        <meta property="og:title" content="Marie Curie | Biography">
        <meta property="article:published_time" content="2021-03-04T10:00:00Z">
        </head><body><p>Radium.</p></body></html>"#;

    #[test]
    fn title_prefers_open_graph() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Marie Curie | Biography"));
        assert_eq!(
            page_title("<title>\n  Plain   title </title>").as_deref(),
            Some("Plain title")
        );
        assert_eq!(page_title("<p>none</p>"), None);
    }

    #[test]
    fn publish_date_from_meta_or_json_ld() {
        let date = publish_date(PAGE).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2021, 3, 4));

        let ld = r#"<script type="application/ld+json">{"datePublished": "2019-11-07"}</script>"#;
        assert_eq!(publish_date(ld).unwrap().year(), 2019);
        assert_eq!(publish_date("<p>undated</p>"), None);
    }

    #[test]
    fn summary_is_first_three_sentences() {
        let article = article_from("", "One. Two! Three? Four.".to_string());
        assert_eq!(article.summary, "One. Two! Three?");
    }

    #[test]
    fn keywords_rank_by_frequency_then_alphabet() {
        let text = "Radium radium polonium. The physicist studied radium and polonium with zeal.";
        let kw = keywords(text);
        assert_eq!(kw[..3], ["radium", "polonium", "physicist"]);
        assert!(!kw.contains(&"the".to_string()));
        assert!(!kw.contains(&"and".to_string()));
    }

    #[test]
    fn fallback_renders_whole_document() {
        let extractor = ReadabilityExtractor;
        let text = extractor
            .extract_fallback("<html><body><div>Marie Curie</div></body></html>")
            .unwrap();
        assert!(text.contains("Marie Curie"));
        assert_eq!(extractor.extract_fallback("<html><body> </body></html>"), None);
    }
}
