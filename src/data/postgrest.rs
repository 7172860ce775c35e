//! PostgREST (Supabase) quote source
//!
//! Reads the `quotes` table with two queries: an exact-count query that
//! returns no rows, and a single-row query at a given offset ordered by
//! creation time.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{Quote, QuoteSource};

/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Path of the quote table under the Supabase base URL
const QUOTES_PATH: &str = "/rest/v1/quotes";

/// Broad classification of a failed remote read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport error, timeout or non-2xx status
    Network,
    /// The server answered but the payload was unusable
    Data,
}

/// Errors that can occur when reading quotes from PostgREST
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),

    /// Count response carried no Content-Range header
    #[error("missing Content-Range header")]
    MissingContentRange,

    /// Count was reported as unknown (`*`)
    #[error("server reported an unknown total in Content-Range: {0}")]
    UnknownCount(String),

    /// Content-Range header could not be parsed
    #[error("invalid Content-Range header: {0}")]
    InvalidContentRange(String),

    /// Row response was not the expected JSON array
    #[error("failed to parse quote rows: {0}")]
    Parse(#[from] serde_json::Error),

    /// No row exists at the requested offset
    #[error("no quote at offset {0}")]
    NoRowAtOffset(u64),

    /// The configured API key can't be sent as an HTTP header
    #[error("API key is not a valid header value")]
    InvalidApiKey,

    /// The row at the requested offset had a blank id or body
    #[error("quote at offset {0} is missing its id or body")]
    InvalidQuote(u64),
}

impl RemoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Http(_) | RemoteError::Status(_) => FailureKind::Network,
            _ => FailureKind::Data,
        }
    }
}

/// Connection settings for the Supabase project
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Anonymous API key, sent as both `apikey` and bearer token
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A quote row as returned by PostgREST
#[derive(Debug, Deserialize)]
struct QuoteRow {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    author: Option<Value>,
}

impl QuoteRow {
    fn into_quote(self) -> Option<Quote> {
        let id = match self.id? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        // Only a string author counts; anything else falls back to the default.
        let author = match self.author {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Quote::new(&id, self.body.as_deref().unwrap_or_default(), author.as_deref())
    }
}

/// Client for the Supabase `quotes` table
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    client: Client,
    base_url: String,
}

impl PostgrestClient {
    /// Creates a client with the auth headers and timeout from `config`
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .default_headers(auth_headers(&config.api_key)?)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn quotes_url(&self) -> String {
        format!("{}{}", self.base_url, QUOTES_PATH)
    }
}

fn auth_headers(api_key: &str) -> Result<HeaderMap, RemoteError> {
    let invalid = |_| RemoteError::InvalidApiKey;
    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(api_key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid)?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[async_trait]
impl QuoteSource for PostgrestClient {
    async fn count_quotes(&self) -> Result<u64, RemoteError> {
        let url = format!("{}?select=id&limit=0", self.quotes_url());

        let response = self
            .client
            .get(&url)
            .header("Prefer", "count=exact")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status()));
        }

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .ok_or(RemoteError::MissingContentRange)?
            .to_str()
            .map_err(|_| RemoteError::InvalidContentRange("non-ASCII header".into()))?;

        let total = parse_content_range_total(content_range)?;
        debug!(total, "counted remote quotes");
        Ok(total)
    }

    async fn quote_at_offset(&self, offset: u64) -> Result<Quote, RemoteError> {
        let url = format!(
            "{}?select=id,body,author,created_at&order=created_at.asc&limit=1&offset={}",
            self.quotes_url(),
            offset
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status()));
        }

        let text = response.text().await?;
        let rows: Vec<QuoteRow> = serde_json::from_str(&text)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(RemoteError::NoRowAtOffset(offset))?;
        row.into_quote().ok_or(RemoteError::InvalidQuote(offset))
    }
}

/// Extracts the total from a `Content-Range` value such as `0-24/1234`.
///
/// A `*` total means PostgREST didn't count, which is treated as a failure.
pub fn parse_content_range_total(header: &str) -> Result<u64, RemoteError> {
    let (_, total) = header
        .rsplit_once('/')
        .ok_or_else(|| RemoteError::InvalidContentRange(header.to_string()))?;
    let total = total.trim();

    if total == "*" {
        return Err(RemoteError::UnknownCount(header.to_string()));
    }

    total
        .parse::<u64>()
        .map_err(|_| RemoteError::InvalidContentRange(header.to_string()))
}
