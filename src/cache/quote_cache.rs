//! The persisted quote-of-the-day slot

use std::sync::Arc;
use tracing::{debug, warn};

use super::store::{KeyValueStore, StoreError};
use crate::data::Quote;

/// Key of the single slot holding the cached quote
pub const QUOTE_KEY: &str = "quote_of_day";

/// Single-slot cache for the quote currently shown on the widget
///
/// Absent, corrupt and invalid stored values all read back as `None`.
#[derive(Clone)]
pub struct QuoteCache {
    store: Arc<dyn KeyValueStore>,
}

impl QuoteCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Replaces the cached quote
    pub fn save(&self, quote: &Quote) -> Result<(), StoreError> {
        let json = serde_json::to_string(quote)?;
        self.store.set(QUOTE_KEY, &json)
    }

    /// Returns the cached quote, if a valid one is stored
    pub fn load(&self) -> Option<Quote> {
        let raw = match self.store.get(QUOTE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read cached quote");
                return None;
            }
        };

        match serde_json::from_str::<Quote>(&raw) {
            Ok(quote) => Some(quote),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable cached quote");
                None
            }
        }
    }
}

impl std::fmt::Debug for QuoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn memory_cache() -> (QuoteCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (QuoteCache::new(store.clone()), store)
    }

    fn quote() -> Quote {
        Quote::new("q1", "Stay curious.", Some("A. Einstein")).unwrap()
    }

    #[test]
    fn test_load_without_save_is_absent() {
        let (cache, _store) = memory_cache();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_then_load_returns_same_quote() {
        let (cache, _store) = memory_cache();
        cache.save(&quote()).unwrap();
        assert_eq!(cache.load(), Some(quote()));
    }

    #[test]
    fn test_save_overwrites_previous_quote() {
        let (cache, _store) = memory_cache();
        let second = Quote::new("q2", "Keep going.", None).unwrap();

        cache.save(&quote()).unwrap();
        cache.save(&second).unwrap();

        assert_eq!(cache.load(), Some(second));
    }

    #[test]
    fn test_corrupt_value_loads_as_absent() {
        let (cache, store) = memory_cache();
        store.set(QUOTE_KEY, "{not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_stored_blank_body_loads_as_absent() {
        let (cache, store) = memory_cache();
        store
            .set(QUOTE_KEY, r#"{"id":"q1","body":"  ","author":"X"}"#)
            .unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_stored_blank_author_loads_with_default() {
        let (cache, store) = memory_cache();
        store
            .set(QUOTE_KEY, r#"{"id":"q1","body":"Body","author":""}"#)
            .unwrap();
        assert_eq!(cache.load().unwrap().author(), crate::data::DEFAULT_AUTHOR);
    }

    #[test]
    fn test_file_backed_cache_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let first = QuoteCache::new(Arc::new(FileStore::with_dir(temp_dir.path().to_path_buf())));
        first.save(&quote()).unwrap();

        let second = QuoteCache::new(Arc::new(FileStore::with_dir(temp_dir.path().to_path_buf())));
        assert_eq!(second.load(), Some(quote()));
    }
}
