// src/history.rs

use std::collections::HashSet;

/// Session-scoped record of URLs that were already downloaded.
///
/// Backs the duplicate guard: append-only, never persisted, and torn down
/// with the session like everything else in this client.
#[derive(Debug, Default)]
pub struct DownloadHistory {
    urls: HashSet<String>,
}

impl DownloadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed download. Returns `false` if it was already there.
    pub fn record(&mut self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_finds_urls() {
        let mut history = DownloadHistory::new();
        assert!(!history.contains("https://example.com/a"));

        assert!(history.record("https://example.com/a"));
        assert!(history.contains("https://example.com/a"));
        assert!(!history.contains("https://example.com/b"));
    }

    #[test]
    fn recording_twice_is_a_no_op() {
        let mut history = DownloadHistory::new();
        assert!(history.record("https://example.com/a"));
        assert!(!history.record("https://example.com/a"));
        assert_eq!(history.len(), 1);
    }
}
