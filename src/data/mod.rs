//! Quote data model and remote quote source
//!
//! `Quote` is the unit shown on the widget and stored in the cache.
//! `QuoteSource` is the read-only view of the remote quote table that the
//! refresh job needs; `PostgrestClient` implements it against Supabase.

pub mod postgrest;
pub mod quote;

pub use postgrest::{FailureKind, PostgrestClient, RemoteConfig, RemoteError};
pub use quote::{InvalidQuote, Quote, DEFAULT_AUTHOR};

use async_trait::async_trait;

/// Read-only access to the remote quote table
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Exact number of rows in the quote table
    async fn count_quotes(&self) -> Result<u64, RemoteError>;

    /// The row at `offset` when ordered by creation time, oldest first
    ///
    /// Fails if no row exists there or the row is not a valid quote.
    async fn quote_at_offset(&self, offset: u64) -> Result<Quote, RemoteError>;
}
