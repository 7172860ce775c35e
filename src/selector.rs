//! Daily quote selection
//!
//! Maps a calendar date onto a row offset in the remote quote table. Every
//! device that knows the same row count lands on the same quote for the day.

use chrono::{NaiveDate, Utc};

/// Epoch for the daily rotation. Day 0 of the rotation is this date.
pub const SEED_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2024, 1, 1) {
    Some(date) => date,
    None => panic!("invalid seed date"),
};

/// Returns the current calendar date in UTC
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Computes the zero-based offset of the quote for `today`.
///
/// The day difference between `today` and `seed_date` is reduced with a
/// Euclidean modulo, so dates before the seed still land in
/// `[0, total_count)`.
///
/// # Panics
/// Panics if `total_count` is zero. Callers check for an empty table first.
pub fn select_index(today: NaiveDate, seed_date: NaiveDate, total_count: u64) -> u64 {
    let offset_days = i128::from((today - seed_date).num_days());
    offset_days.rem_euclid(i128::from(total_count)) as u64
}
