//! Command-line interface parsing for QuoteVault
//!
//! Connection settings come from flags or the `SUPABASE_URL` and
//! `SUPABASE_ANON_KEY` environment variables. Subcommands map onto the
//! refresh job and widget host operations.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::data::RemoteConfig;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// No Supabase URL was given
    #[error("missing Supabase URL: pass --supabase-url or set SUPABASE_URL")]
    MissingUrl,

    /// No API key was given
    #[error("missing Supabase key: pass --anon-key or set SUPABASE_ANON_KEY")]
    MissingKey,

    /// The date argument isn't a calendar date
    #[error("Invalid date: '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    /// No cache directory was given and none could be derived from the home directory
    #[error("could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,
}

/// QuoteVault - keep the quote-of-the-day widget fresh
#[derive(Parser, Debug)]
#[command(name = "quotevault")]
#[command(about = "Quote-of-the-day refresher for the QuoteVault widget")]
#[command(version)]
pub struct Cli {
    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Supabase anonymous API key
    #[arg(long, env = "SUPABASE_ANON_KEY", global = true, hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Directory holding the cached quote (defaults to the XDG cache directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Per-request network timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 12,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch today's quote once and update the cache
    ///
    /// Exits 0 on success, 75 when the run should be retried later and 78
    /// when the configuration is missing.
    Refresh,

    /// Print the cached quote as the widget shows it
    Show,

    /// Enable the widget: refresh now, then daily after local midnight
    Run {
        /// Widget ids to render on every change
        #[arg(long = "widget", value_name = "ID", default_values_t = [1u32])]
        widgets: Vec<u32>,
    },

    /// Print the row offset selected for a date
    Select {
        /// Calendar date (YYYY-MM-DD); defaults to today in UTC
        #[arg(long)]
        date: Option<String>,

        /// Number of rows in the quote table
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,
    },

    /// Store a quote pushed from the app and re-render the widget
    Push {
        #[arg(long)]
        id: String,

        #[arg(long)]
        body: String,

        #[arg(long, default_value = "")]
        author: String,
    },
}

/// Parses a `YYYY-MM-DD` argument into a date
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

impl Cli {
    /// Builds the remote connection settings from the parsed arguments.
    ///
    /// Blank values count as missing.
    pub fn remote_config(&self) -> Result<RemoteConfig, CliError> {
        let url = non_blank(&self.supabase_url).ok_or(CliError::MissingUrl)?;
        let key = non_blank(&self.anon_key).ok_or(CliError::MissingKey)?;
        Ok(RemoteConfig::new(url, key).with_timeout(Duration::from_secs(self.timeout_secs)))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
