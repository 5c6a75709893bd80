//! Shared progress bar setup.
//!
//! Row-based bars for the generation and write phases, and a spinner for
//! steps without a known total.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Bar counting `total` rows, labelled with the table being processed
pub fn row_bar(total: u64, message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows {msg}",
        )?
        .progress_chars("█▓▒░  ")
        .tick_chars(TICK_CHARS),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

pub fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?.tick_chars(TICK_CHARS));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

/// `Some(bar)` when progress output is enabled
pub fn optional_row_bar(enabled: bool, total: u64, message: &str) -> Result<Option<ProgressBar>> {
    if enabled {
        row_bar(total, message).map(Some)
    } else {
        Ok(None)
    }
}
