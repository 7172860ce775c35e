//! Quote data model
//!
//! A `Quote` can only be built through [`Quote::new`], which trims every field
//! and rejects blank ids or bodies. Deserialization goes through the same
//! check, so an invalid quote never leaves the parsing boundary.

use serde::{Deserialize, Serialize};

/// Author shown when a quote has no author of its own
pub const DEFAULT_AUTHOR: &str = "QuoteVault Daily";

/// A single quote as displayed on the widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuote")]
pub struct Quote {
    id: String,
    body: String,
    author: String,
}

/// Unvalidated quote fields as they appear in stored JSON
#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(default)]
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<String>,
}

/// Error returned when stored or fetched fields don't form a valid quote
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("quote requires a non-blank id and body")]
pub struct InvalidQuote;

impl TryFrom<RawQuote> for Quote {
    type Error = InvalidQuote;

    fn try_from(raw: RawQuote) -> Result<Self, Self::Error> {
        Quote::new(&raw.id, &raw.body, raw.author.as_deref()).ok_or(InvalidQuote)
    }
}

impl Quote {
    /// Builds a quote from untrusted fields.
    ///
    /// Returns `None` when `id` or `body` is blank after trimming. A missing or
    /// blank author falls back to [`DEFAULT_AUTHOR`].
    pub fn new(id: &str, body: &str, author: Option<&str>) -> Option<Self> {
        let id = id.trim();
        let body = body.trim();
        if id.is_empty() || body.is_empty() {
            return None;
        }

        let author = match author.map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ => DEFAULT_AUTHOR,
        };

        Some(Self {
            id: id.to_string(),
            body: body.to_string(),
            author: author.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}
