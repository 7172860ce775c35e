//! QuoteVault quote-of-the-day library
//!
//! Selects the daily quote from a Supabase `quotes` table, keeps it in a
//! persisted single-slot cache and feeds it to home-screen style widgets.

pub mod cache;
pub mod cli;
pub mod data;
pub mod refresh;
pub mod schedule;
pub mod selector;
pub mod surface;
