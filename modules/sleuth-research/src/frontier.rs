use std::collections::{HashSet, VecDeque};

/// FIFO queue of URLs still to crawl, plus every URL ever admitted.
///
/// A URL is admitted at most once per run: `push` marks it visited on
/// insertion, so a URL that was already queued, crawled or skipped is
/// rejected.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    visited: HashSet<String>,
    history: Vec<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `url` unless it has been seen before. Returns whether it was added.
    pub fn push(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || !self.visited.insert(url.to_string()) {
            return false;
        }
        self.history.push(url.to_string());
        self.queue.push_back(url.to_string());
        true
    }

    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url.trim())
    }

    /// Every admitted URL, in admission order.
    pub fn history(&self) -> &[String] {
        &self.history
    }
}

/// Position in a [`KeywordLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checkpoint(usize);

/// Append-only keyword log.
///
/// The crawl appends discovered terms as it goes; readers consume them only
/// at checkpoints, so nothing iterates the log while it grows.
#[derive(Debug, Default)]
pub struct KeywordLog {
    entries: Vec<String>,
}

impl KeywordLog {
    pub fn new<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut log = Self::default();
        for keyword in seed {
            log.append(keyword);
        }
        log
    }

    /// Append a keyword. Blank and already-logged terms are ignored.
    pub fn append(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into().trim().to_string();
        if keyword.is_empty() || self.entries.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            return false;
        }
        self.entries.push(keyword);
        true
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.len())
    }

    /// Keywords appended after `mark`.
    pub fn since(&self, mark: Checkpoint) -> &[String] {
        &self.entries[mark.0.min(self.entries.len())..]
    }

    pub fn all(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_is_fifo_and_rejects_repeats() {
        let mut frontier = Frontier::new();
        assert!(frontier.push("https://a.example"));
        assert!(frontier.push("https://b.example"));
        assert!(!frontier.push("https://a.example"));

        assert_eq!(frontier.pop().as_deref(), Some("https://a.example"));
        // Crawled URLs stay visited.
        assert!(!frontier.push("https://a.example"));
        assert_eq!(frontier.pop().as_deref(), Some("https://b.example"));
        assert!(frontier.is_empty());
        assert_eq!(frontier.history().len(), 2);
    }

    #[test]
    fn frontier_ignores_blank_urls() {
        let mut frontier = Frontier::new();
        assert!(!frontier.push("   "));
        assert!(frontier.push(" https://a.example "));
        assert!(frontier.is_visited("https://a.example"));
    }

    #[test]
    fn keyword_log_checkpoints() {
        let mut log = KeywordLog::new(["physicist"]);
        let mark = log.checkpoint();
        assert!(log.append("radium"));
        assert!(!log.append("Radium"));
        assert!(!log.append(" "));
        assert!(log.append("Sorbonne"));

        assert_eq!(log.since(mark), ["radium", "Sorbonne"]);
        assert_eq!(log.since(log.checkpoint()), [] as [String; 0]);
        assert_eq!(log.all().len(), 3);
    }
}
