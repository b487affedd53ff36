//! Board scraper and resumable sentiment labeler.
//!
//! The crawler collects posts and comments from a stock board into CSV tables; the labeler
//! walks those tables row by row, asks an LLM whether each row reads as buy (1), neutral (0)
//! or sell (-1), and checkpoints its progress so an interrupted run can pick up where it
//! stopped.

mod error;
mod macros;
mod parse;
mod request;

pub mod classifier;
pub mod config;
pub mod crawl;
pub mod prompt;
pub mod rate_limit;
pub mod record;
pub mod report;
pub mod runner;
pub mod scorer;
pub mod table;

pub use error::{Error, Result};

/// Output column holding the label.
pub const LABEL_COLUMN: &str = "label";
