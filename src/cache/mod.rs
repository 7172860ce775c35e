//! Persisted quote-of-the-day cache
//!
//! The cache is a single slot holding one JSON quote. It sits on top of a
//! `KeyValueStore`, so the file-backed store used in production can be
//! swapped for an in-memory one in tests.

mod quote_cache;
mod store;

pub use quote_cache::{QuoteCache, QUOTE_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
