#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for bizwatch.
//!
//! Provides an `indicatif`-backed progress bar behind the scraper's
//! [`ProgressCallback`] trait, [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while progress bars redraw, and the credential prompts shared by the
//! subcommands and the interactive menu.

use std::sync::Arc;
use std::time::Duration;

use bizwatch_scraper::progress::ProgressCallback;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Environment variable read before prompting for a password.
pub const PASSWORD_ENV: &str = "BIZWATCH_PASSWORD";

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total_pages()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a progress bar for listing pages.
    ///
    /// Starts as a spinner while the page count is unknown (page discovery)
    /// and switches to a bar once [`ProgressCallback::set_total_pages()`] is
    /// called.
    #[must_use]
    pub fn pages_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} pages [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total_pages(&self, pages: u32) {
        self.bar.set_length(u64::from(pages));
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn page_done(&self) {
        self.bar.inc(1);
    }

    fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_string());
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Already set in tests

    log::set_max_level(level);

    multi
}

/// Asks for a username unless one was given.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn prompt_username(given: Option<&str>) -> dialoguer::Result<String> {
    match given {
        Some(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
        _ => Input::new().with_prompt("Username").interact_text(),
    }
}

/// Reads the password from [`PASSWORD_ENV`], or asks for it without echo.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn prompt_password(prompt: &str) -> dialoguer::Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV)
        && !password.is_empty()
    {
        return Ok(password);
    }
    Password::new().with_prompt(prompt).interact()
}

/// Asks twice for a new password until both entries match.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn prompt_new_password(prompt: &str) -> dialoguer::Result<String> {
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()
}

/// Shortens `text` to at most `width` characters, marking the cut with
/// `...`. Counts characters, not bytes, so Vietnamese text is never split
/// inside a code point.
#[must_use]
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut short: String = text.chars().take(keep).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("Cong ty A", 20), "Cong ty A");
    }

    #[test]
    fn truncate_counts_characters() {
        let name = "CÔNG TY TNHH THƯƠNG MẠI DỊCH VỤ HÀ NỘI";
        let short = truncate(name, 12);
        assert_eq!(short.chars().count(), 12);
        assert_eq!(short, "CÔNG TY T...");
    }
}
