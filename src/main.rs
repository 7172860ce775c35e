//! QuoteVault - keep the quote-of-the-day widget fresh
//!
//! A thin adapter around the library: each subcommand builds the cache,
//! remote client and widget host it needs and runs one operation.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quotevault::cache::{FileStore, QuoteCache};
use quotevault::cli::{parse_date_arg, Cli, CliError, Command};
use quotevault::data::PostgrestClient;
use quotevault::refresh::{RefreshJob, RefreshOutcome};
use quotevault::schedule::{ScheduleConfig, Scheduler};
use quotevault::selector::{select_index, today_utc, SEED_DATE};
use quotevault::surface::{StdoutRenderer, WidgetHost};

/// Exit code asking the caller to retry later (EX_TEMPFAIL)
const EXIT_RETRY: u8 = 75;

/// Exit code for missing or invalid configuration (EX_CONFIG)
const EXIT_CONFIG: u8 = 78;

/// Sets up logging to stderr, filtered by `RUST_LOG` (default `info`)
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the quote cache in `--cache-dir` or the XDG cache directory
fn open_cache(dir: Option<PathBuf>) -> Result<QuoteCache, CliError> {
    let store = match dir {
        Some(dir) => FileStore::with_dir(dir),
        None => FileStore::new().ok_or(CliError::NoCacheDir)?,
    };
    Ok(QuoteCache::new(Arc::new(store)))
}

/// Builds a refresh job against the configured Supabase project
fn build_job(cli: &Cli, cache: QuoteCache) -> Option<RefreshJob> {
    let config = match cli.remote_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };
    match PostgrestClient::new(&config) {
        Ok(client) => Some(RefreshJob::new(Arc::new(client), cache)),
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            None
        }
    }
}

fn outcome_exit_code(outcome: RefreshOutcome) -> ExitCode {
    match outcome {
        RefreshOutcome::Success => ExitCode::SUCCESS,
        RefreshOutcome::Retry => ExitCode::from(EXIT_RETRY),
        RefreshOutcome::PermanentSkip => ExitCode::from(EXIT_CONFIG),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command.clone() {
        Command::Select { date, count } => {
            let today = match date {
                Some(d) => parse_date_arg(&d)?,
                None => today_utc(),
            };
            println!("{}", select_index(today, SEED_DATE, count));
        }

        Command::Show => {
            let host = WidgetHost::offline(open_cache(cli.cache_dir.clone())?, Arc::new(StdoutRenderer));
            host.on_update_requested(&[1]);
        }

        Command::Push { id, body, author } => {
            let host = WidgetHost::offline(open_cache(cli.cache_dir.clone())?, Arc::new(StdoutRenderer));
            host.add_widget(1);
            host.update_quote_of_day(&id, &body, &author)?;
        }

        Command::Refresh => {
            let cache = open_cache(cli.cache_dir.clone())?;
            let outcome = match build_job(&cli, cache) {
                Some(job) => job.run(today_utc()).await,
                None => RefreshOutcome::PermanentSkip,
            };
            info!(?outcome, "refresh finished");
            return Ok(outcome_exit_code(outcome));
        }

        Command::Run { widgets } => {
            let cache = open_cache(cli.cache_dir.clone())?;
            let Some(job) = build_job(&cli, cache) else {
                return Ok(outcome_exit_code(RefreshOutcome::PermanentSkip));
            };

            let scheduler = Scheduler::new(job, ScheduleConfig::default());
            let host = WidgetHost::new(scheduler, Arc::new(StdoutRenderer));
            for id in &widgets {
                host.add_widget(*id);
            }
            host.on_update_requested(&widgets);
            host.listen_for_changes();
            host.on_enabled();

            info!("widget enabled, press Ctrl-C to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to wait for Ctrl-C");
            }
            host.shutdown();
        }
    }

    Ok(ExitCode::SUCCESS)
}
