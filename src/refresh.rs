//! Quote-of-the-day refresh job
//!
//! One run counts the remote quotes, picks today's offset, fetches that row,
//! overwrites the cache and notifies display surfaces. The job only classifies
//! its result; retrying is up to whoever scheduled it.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::QuoteCache;
use crate::data::{Quote, QuoteSource};
use crate::selector::{select_index, SEED_DATE};

/// Capacity of the change notification channel
const NOTIFY_CAPACITY: usize = 16;

/// Result of a single refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Finished; the cache holds today's quote or the table was empty
    Success,
    /// A network or data failure; try again later
    Retry,
    /// Can never succeed with the current configuration
    PermanentSkip,
}

/// Fetches today's quote and stores it in the cache
#[derive(Clone)]
pub struct RefreshJob {
    source: Arc<dyn QuoteSource>,
    cache: QuoteCache,
    notifier: broadcast::Sender<Quote>,
}

impl RefreshJob {
    pub fn new(source: Arc<dyn QuoteSource>, cache: QuoteCache) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            source,
            cache,
            notifier,
        }
    }

    /// Subscribes to quotes written by successful runs
    pub fn subscribe(&self) -> broadcast::Receiver<Quote> {
        self.notifier.subscribe()
    }

    /// The cache this job writes to
    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Sends a change notification to every subscriber
    pub(crate) fn notify(&self, quote: Quote) {
        // No subscribers just means nothing is on screen.
        let _ = self.notifier.send(quote);
    }

    /// Runs one refresh for the UTC calendar date `today`
    pub async fn run(&self, today: NaiveDate) -> RefreshOutcome {
        let count = match self.source.count_quotes().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "quote count failed");
                return RefreshOutcome::Retry;
            }
        };

        if count == 0 {
            info!("remote quote table is empty, keeping cached quote");
            return RefreshOutcome::Success;
        }

        // The table may change between the two queries; the next run picks
        // up the new count.
        let index = select_index(today, SEED_DATE, count);
        debug!(%today, count, index, "selected quote of the day");

        let quote = match self.source.quote_at_offset(index).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), index, "quote fetch failed");
                return RefreshOutcome::Retry;
            }
        };

        if let Err(e) = self.cache.save(&quote) {
            warn!(error = %e, "failed to persist quote of the day");
        }

        info!(id = quote.id(), "quote of the day refreshed");
        self.notify(quote);
        RefreshOutcome::Success
    }
}

impl std::fmt::Debug for RefreshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshJob")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{KeyValueStore, MemoryStore, StoreError, QUOTE_KEY};
    use crate::data::RemoteError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Scripted quote source that records the offsets it was asked for
    pub(crate) struct FakeSource {
        pub count: Mutex<Result<u64, RemoteError>>,
        pub rows: Vec<Quote>,
        pub blank_row: bool,
        pub requested: Mutex<Vec<u64>>,
        pub count_calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn with_rows(rows: Vec<Quote>) -> Self {
            Self {
                count: Mutex::new(Ok(rows.len() as u64)),
                rows,
                blank_row: false,
                requested: Mutex::new(Vec::new()),
                count_calls: AtomicUsize::new(0),
            }
        }

        pub fn failing_count(err: RemoteError) -> Self {
            let source = Self::with_rows(Vec::new());
            *source.count.lock().unwrap() = Err(err);
            source
        }
    }

    #[async_trait]
    impl QuoteSource for FakeSource {
        async fn count_quotes(&self) -> Result<u64, RemoteError> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            match &*self.count.lock().unwrap() {
                Ok(n) => Ok(*n),
                Err(RemoteError::UnknownCount(h)) => Err(RemoteError::UnknownCount(h.clone())),
                Err(RemoteError::Status(s)) => Err(RemoteError::Status(*s)),
                Err(_) => Err(RemoteError::MissingContentRange),
            }
        }

        async fn quote_at_offset(&self, offset: u64) -> Result<Quote, RemoteError> {
            self.requested.lock().unwrap().push(offset);
            if self.blank_row {
                return Err(RemoteError::InvalidQuote(offset));
            }
            self.rows
                .get(offset as usize)
                .cloned()
                .ok_or(RemoteError::NoRowAtOffset(offset))
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quotes(n: usize) -> Vec<Quote> {
        (0..n)
            .map(|i| Quote::new(&format!("q{}", i), &format!("Quote number {}", i), None).unwrap())
            .collect()
    }

    fn job_with(source: FakeSource) -> (RefreshJob, Arc<FakeSource>, Arc<MemoryStore>) {
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let job = RefreshJob::new(source.clone(), QuoteCache::new(store.clone()));
        (job, source, store)
    }

    #[tokio::test]
    async fn test_success_stores_quote_and_notifies_once() {
        let einstein = Quote::new("q1", "Stay curious.", Some("A. Einstein")).unwrap();
        let (job, _source, _store) = job_with(FakeSource::with_rows(vec![einstein.clone()]));
        let mut rx = job.subscribe();

        let outcome = job.run(date(2024, 3, 9)).await;

        assert_eq!(outcome, RefreshOutcome::Success);
        assert_eq!(job.cache().load(), Some(einstein.clone()));
        assert_eq!(rx.try_recv().unwrap(), einstein);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_requests_offset_for_today() {
        let (job, source, _store) = job_with(FakeSource::with_rows(quotes(10)));

        assert_eq!(job.run(date(2024, 1, 4)).await, RefreshOutcome::Success);
        assert_eq!(job.run(date(2024, 1, 11)).await, RefreshOutcome::Success);

        assert_eq!(*source.requested.lock().unwrap(), vec![3, 0]);
        assert_eq!(job.cache().load().unwrap().id(), "q0");
    }

    #[tokio::test]
    async fn test_unknown_count_retries_without_touching_cache() {
        let (job, source, store) =
            job_with(FakeSource::failing_count(RemoteError::UnknownCount("0-0/*".into())));
        let previous = Quote::new("old", "Yesterday's quote", None).unwrap();
        job.cache().save(&previous).unwrap();
        let before = store.get(QUOTE_KEY).unwrap();

        let outcome = job.run(date(2024, 5, 1)).await;

        assert_eq!(outcome, RefreshOutcome::Retry);
        assert_eq!(store.get(QUOTE_KEY).unwrap(), before);
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_http_error_retries() {
        let (job, _source, _store) = job_with(FakeSource::failing_count(RemoteError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
        )));
        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Retry);
        assert!(job.cache().load().is_none());
    }

    #[tokio::test]
    async fn test_empty_table_succeeds_and_leaves_cache_absent() {
        let (job, source, _store) = job_with(FakeSource::with_rows(Vec::new()));
        let mut rx = job.subscribe();

        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Success);

        assert!(job.cache().load().is_none());
        assert!(source.requested.lock().unwrap().is_empty());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_empty_table_keeps_previous_quote() {
        let (job, _source, _store) = job_with(FakeSource::with_rows(Vec::new()));
        let previous = Quote::new("old", "Yesterday's quote", None).unwrap();
        job.cache().save(&previous).unwrap();

        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Success);
        assert_eq!(job.cache().load(), Some(previous));
    }

    #[tokio::test]
    async fn test_invalid_row_retries_without_touching_cache() {
        let mut source = FakeSource::with_rows(quotes(3));
        source.blank_row = true;
        let (job, _source, _store) = job_with(source);
        let mut rx = job.subscribe();

        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Retry);
        assert!(job.cache().load().is_none());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_row_missing_after_count_retries() {
        // Count says 5 rows but only 2 exist by the time the row is fetched.
        let source = FakeSource::with_rows(quotes(2));
        *source.count.lock().unwrap() = Ok(5);
        let (job, _source, _store) = job_with(source);

        assert_eq!(job.run(date(2024, 1, 4)).await, RefreshOutcome::Retry);
    }

    #[tokio::test]
    async fn test_storage_failure_still_succeeds_and_notifies() {
        let source = Arc::new(FakeSource::with_rows(quotes(1)));
        let job = RefreshJob::new(source, QuoteCache::new(Arc::new(ReadOnlyStore)));
        let mut rx = job.subscribe();

        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Success);
        assert_eq!(rx.try_recv().unwrap().id(), "q0");
    }

    #[tokio::test]
    async fn test_run_without_subscribers_succeeds() {
        let (job, _source, _store) = job_with(FakeSource::with_rows(quotes(1)));
        assert_eq!(job.run(date(2024, 5, 1)).await, RefreshOutcome::Success);
    }
}
