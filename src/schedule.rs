//! Scheduling of refresh runs
//!
//! The refresh job runs once immediately whenever a display surface is
//! enabled, and then every 24 hours starting shortly after local midnight.
//! The scheduler keeps at most one pending immediate run and one periodic
//! schedule, and owns the retry backoff that the job itself doesn't do.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::refresh::{RefreshJob, RefreshOutcome};
use crate::selector::today_utc;

/// Delay used when the computed first run isn't in the future
pub const MIN_INITIAL_DELAY: Duration = Duration::from_secs(60);

/// Configuration for refresh timing and retries
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between periodic runs
    pub period: Duration,
    /// Offset after local midnight for the first periodic run
    pub after_midnight: Duration,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the backoff
    pub max_backoff: Duration,
    /// Attempts per trigger, the first run included
    pub max_attempts: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(24 * 60 * 60),
            after_midnight: Duration::from_secs(5 * 60),
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(5 * 60 * 60),
            max_attempts: 6,
        }
    }
}

impl ScheduleConfig {
    /// Backoff to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Delay from `now` until the next local midnight plus `after_midnight`.
///
/// Falls back to [`MIN_INITIAL_DELAY`] when the target is not in the future
/// or doesn't exist in the local zone.
///
/// The target is always on the next calendar day, so with a fixed-offset zone
/// it is strictly in the future. Only a zone whose offset jumps by a day or
/// more overnight can produce a zero or negative delay; a skipped day makes
/// the target nonexistent, which takes the same fallback.
pub fn initial_delay<Tz: TimeZone>(now: &DateTime<Tz>, after_midnight: Duration) -> Duration {
    let tomorrow = match now.date_naive().succ_opt() {
        Some(d) => d,
        None => return MIN_INITIAL_DELAY,
    };
    let Ok(offset) = ChronoDuration::from_std(after_midnight) else {
        return MIN_INITIAL_DELAY;
    };
    let Some(target) = tomorrow.and_time(NaiveTime::MIN).checked_add_signed(offset) else {
        return MIN_INITIAL_DELAY;
    };

    let Some(next) = now.timezone().from_local_datetime(&target).earliest() else {
        return MIN_INITIAL_DELAY;
    };

    match (next - now.clone()).to_std() {
        Ok(delay) if !delay.is_zero() => delay,
        _ => MIN_INITIAL_DELAY,
    }
}

/// Whether arming the periodic schedule created a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// No schedule was active; a new one was started
    Created,
    /// A schedule was already active and keeps its timing
    Kept,
}

/// Runs a refresh job on tokio tasks
pub struct Scheduler {
    job: RefreshJob,
    config: ScheduleConfig,
    immediate: Mutex<Option<JoinHandle<()>>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(job: RefreshJob, config: ScheduleConfig) -> Arc<Self> {
        Arc::new(Self {
            job,
            config,
            immediate: Mutex::new(None),
            periodic: Mutex::new(None),
        })
    }

    pub fn job(&self) -> &RefreshJob {
        &self.job
    }

    /// Starts an immediate run, replacing any pending one
    pub fn enqueue_immediate(&self) {
        let job = self.job.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            run_with_retry(&job, &config).await;
        });

        let mut slot = lock(&self.immediate);
        if let Some(previous) = slot.replace(handle) {
            if !previous.is_finished() {
                debug!("replacing pending immediate refresh");
            }
            previous.abort();
        }
    }

    /// Arms the daily schedule unless one is already active
    pub fn enqueue_periodic(&self) -> ArmOutcome {
        let mut slot = lock(&self.periodic);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("periodic refresh already armed");
            return ArmOutcome::Kept;
        }

        let delay = initial_delay(&chrono::Local::now(), self.config.after_midnight);
        info!(delay_secs = delay.as_secs(), "arming daily refresh");

        let job = self.job.clone();
        let config = self.config.clone();
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + delay, config.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                run_with_retry(&job, &config).await;
            }
        }));
        ArmOutcome::Created
    }

    /// Whether a periodic schedule is currently active
    pub fn periodic_armed(&self) -> bool {
        lock(&self.periodic)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Waits for the current immediate run, if any, to finish
    pub async fn wait_immediate(&self) {
        let handle = lock(&self.immediate).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(error = %e, "immediate refresh panicked");
                }
            }
        }
    }

    /// Cancels every pending run
    pub fn shutdown(&self) {
        for slot in [&self.immediate, &self.periodic] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock(slot: &Mutex<Option<JoinHandle<()>>>) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    // A panic while holding the guard can't leave the slot half-updated.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs the job until it stops asking for a retry or attempts run out
pub async fn run_with_retry(job: &RefreshJob, config: &ScheduleConfig) -> RefreshOutcome {
    let mut attempt = 1;
    loop {
        let outcome = job.run(today_utc()).await;
        if outcome != RefreshOutcome::Retry || attempt >= config.max_attempts {
            if outcome == RefreshOutcome::Retry {
                warn!(attempt, "giving up on refresh until next trigger");
            }
            return outcome;
        }

        let backoff = config.backoff_for(attempt);
        debug!(attempt, backoff_secs = backoff.as_secs(), "refresh will retry");
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
