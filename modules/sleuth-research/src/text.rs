//! Plain-text helpers shared by the research paths.

use std::sync::LazyLock;

use regex::Regex;

/// How far past the word limit to look for a sentence terminator.
pub const SENTENCE_LOOKAHEAD_WORDS: usize = 100;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]+|\d+[.)]|\(\d+\))\s*").expect("valid regex")
});

/// Trim `text` to roughly `max_words` words without cutting a sentence in half.
///
/// With `limit = max_words - 1`: text of at most `limit` words is returned
/// unchanged. Longer text keeps its first `limit` words plus the words up to
/// and including the next `.`, `!` or `?` found within
/// [`SENTENCE_LOOKAHEAD_WORDS`]. When no terminator is that close the cut is
/// made at exactly `limit` words.
pub fn truncate_by_words(text: &str, max_words: usize) -> String {
    let limit = max_words.saturating_sub(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return text.to_string();
    }

    let (head, rest) = words.split_at(limit);
    let tail_len = rest
        .iter()
        .take(SENTENCE_LOOKAHEAD_WORDS)
        .position(|word| ends_sentence(word))
        .map(|idx| idx + 1)
        .unwrap_or(0);

    head.iter()
        .chain(&rest[..tail_len])
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']', '”', '’'])
        .ends_with(['.', '!', '?'])
}

/// Strip list markers and wrapping quotes from one line of oracle output.
pub fn clean_line(line: &str) -> String {
    let line = LIST_MARKER.replace(line.trim(), "");
    line.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”'))
        .trim()
        .to_string()
}

/// Split text into sentences on terminal punctuation followed by whitespace.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            out.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_returned_unchanged() {
        let text = "Paris is the capital.\nIt is in France.";
        assert_eq!(truncate_by_words(text, 50), text);
        assert_eq!(truncate_by_words(text, 50), truncate_by_words(&truncate_by_words(text, 50), 50));
    }

    #[test]
    fn extends_to_the_next_sentence_end() {
        let text = "one two three four. five six seven. eight";
        // limit = 2 words, then up to "four."
        assert_eq!(truncate_by_words(text, 3), "one two three four.");
    }

    #[test]
    fn cuts_cleanly_without_a_nearby_terminator() {
        let mut words = vec!["w"; 300];
        words.push("end.");
        let text = words.join(" ");
        let out = truncate_by_words(&text, 11);
        assert_eq!(word_count(&out), 10);
    }

    #[test]
    fn zero_budget_still_finishes_a_sentence() {
        assert_eq!(truncate_by_words("Hi there. More", 0), "Hi there.");
        assert_eq!(truncate_by_words("", 0), "");
    }

    #[test]
    fn quoted_terminators_count() {
        assert_eq!(truncate_by_words("a b \"c d.\" e f", 3), "a b \"c d.\"");
    }

    #[test]
    fn clean_line_strips_markers_and_quotes() {
        assert_eq!(clean_line("1. \"Marie Curie biography\""), "Marie Curie biography");
        assert_eq!(clean_line("  - radium discovery "), "radium discovery");
        assert_eq!(clean_line("3) Sorbonne"), "Sorbonne");
        assert_eq!(clean_line("   "), "");
    }

    #[test]
    fn sentences_split_on_terminators() {
        let s = sentences("First one. Second one! Third? trailing");
        assert_eq!(s, vec!["First one.", "Second one!", "Third?", "trailing"]);
    }
}
