//! Cursor-based key enumeration.
//!
//! `KEYS` blocks the server for the length of the keyspace, so enumeration
//! goes through `SCAN` instead.  [`KeyScan`] hides the cursor token: callers
//! pull batches until it reports exhaustion, or call
//! [`collect_all`](KeyScan::collect_all) to drain it.

use std::collections::HashSet;

use async_trait::async_trait;
use mg_domain::trace::TraceEvent;

use crate::error::StoreError;

/// One page of a cursor-based scan.
#[async_trait]
pub trait ScanSource: Send {
    /// Issue a single `SCAN` round trip starting at `cursor`.  Returns the
    /// next cursor (`0` once the iteration is complete) and the keys found.
    async fn scan_page(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError>;
}

#[async_trait]
impl ScanSource for redis::aio::MultiplexedConnection {
    async fn scan_page(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(self)
            .await?;
        Ok((next, keys))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    At(u64),
    Done,
}

/// A restartable, finite sequence of key batches matching a pattern.
pub struct KeyScan<S> {
    source: S,
    pattern: String,
    count: usize,
    state: ScanState,
    round_trips: usize,
}

impl<S: ScanSource> KeyScan<S> {
    pub fn new(source: S, pattern: impl Into<String>, count: usize) -> Self {
        Self {
            source,
            pattern: pattern.into(),
            count: count.max(1),
            state: ScanState::Start,
            round_trips: 0,
        }
    }

    /// Fetch the next batch.  Returns `Ok(None)` once the backend has
    /// signalled completion.  Batches may be empty before completion.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<String>>, StoreError> {
        let cursor = match self.state {
            ScanState::Start => 0,
            ScanState::At(cursor) => cursor,
            ScanState::Done => return Ok(None),
        };

        let (next, keys) = self
            .source
            .scan_page(cursor, &self.pattern, self.count)
            .await?;
        self.round_trips += 1;
        self.state = if next == 0 {
            ScanState::Done
        } else {
            ScanState::At(next)
        };
        Ok(Some(keys))
    }

    /// Rewind to the beginning of the keyspace.
    pub fn restart(&mut self) {
        self.state = ScanState::Start;
        self.round_trips = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Done
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Drain the scan, returning every matched key once.
    ///
    /// `SCAN` may report a key more than once across pages; duplicates are
    /// dropped while preserving first-seen order.
    pub async fn collect_all(mut self) -> Result<Vec<String>, StoreError> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }

        TraceEvent::StoreScan {
            pattern: self.pattern.clone(),
            keys: keys.len(),
            round_trips: self.round_trips,
        }
        .emit();

        Ok(keys)
    }
}

/// Escape Redis glob metacharacters so a literal prefix can be used in a
/// `MATCH` pattern.
pub fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves pre-baked pages keyed by the cursor that requests them.
    struct PagedSource {
        pages: Vec<(u64, u64, Vec<&'static str>)>,
        requested: Vec<u64>,
    }

    #[async_trait]
    impl ScanSource for PagedSource {
        async fn scan_page(
            &mut self,
            cursor: u64,
            _pattern: &str,
            _count: usize,
        ) -> Result<(u64, Vec<String>), StoreError> {
            self.requested.push(cursor);
            let (_, next, keys) = self
                .pages
                .iter()
                .find(|(at, _, _)| *at == cursor)
                .expect("unexpected cursor");
            Ok((*next, keys.iter().map(|k| k.to_string()).collect()))
        }
    }

    fn three_pages() -> PagedSource {
        PagedSource {
            pages: vec![
                (0, 17, vec!["session:a", "session:b"]),
                (17, 42, vec![]),
                (42, 0, vec!["session:c", "session:a"]),
            ],
            requested: Vec::new(),
        }
    }

    #[tokio::test]
    async fn follows_cursor_until_zero() {
        let mut scan = KeyScan::new(three_pages(), "session:*", 100);
        let mut batches = Vec::new();
        while let Some(batch) = scan.next_batch().await.unwrap() {
            batches.push(batch);
        }
        assert_eq!(batches.len(), 3);
        assert!(batches[1].is_empty());
        assert!(scan.is_exhausted());
        assert_eq!(scan.round_trips(), 3);
        assert_eq!(scan.source.requested, vec![0, 17, 42]);
    }

    #[tokio::test]
    async fn exhausted_scan_makes_no_more_round_trips() {
        let mut scan = KeyScan::new(three_pages(), "session:*", 100);
        while scan.next_batch().await.unwrap().is_some() {}
        assert!(scan.next_batch().await.unwrap().is_none());
        assert_eq!(scan.source.requested.len(), 3);
    }

    #[tokio::test]
    async fn collect_all_dedupes() {
        let scan = KeyScan::new(three_pages(), "session:*", 100);
        let keys = scan.collect_all().await.unwrap();
        assert_eq!(keys, vec!["session:a", "session:b", "session:c"]);
    }

    #[tokio::test]
    async fn restart_rewinds_to_cursor_zero() {
        let mut scan = KeyScan::new(three_pages(), "session:*", 100);
        scan.next_batch().await.unwrap();
        scan.restart();
        assert_eq!(scan.round_trips(), 0);
        scan.next_batch().await.unwrap();
        assert_eq!(scan.source.requested, vec![0, 0]);
    }

    #[test]
    fn escape_glob_metacharacters() {
        assert_eq!(escape_glob("session:"), "session:");
        assert_eq!(escape_glob("app[1]*"), "app\\[1\\]\\*");
    }
}
