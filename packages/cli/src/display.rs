//! Plain-text tables for terminal output.

use std::collections::BTreeMap;

use bizwatch_business_models::{BusinessRecord, SearchHistoryEntry, UserAccount};
use bizwatch_cli_utils::truncate;
use bizwatch_scraper::pagination::{CrawlReport, PageOutcome};
use bizwatch_store::users::BulkAddReport;

/// Prints the search result table with 1-based row numbers.
pub fn print_results(records: &[BusinessRecord]) {
    if records.is_empty() {
        println!("No businesses found.");
        return;
    }

    println!();
    println!(
        "{:<4} {:<12} {:<40} {:<24} ADDRESS",
        "#", "TAX CODE", "NAME", "REPRESENTATIVE"
    );
    println!("{}", "-".repeat(130));

    for (i, record) in records.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<40} {:<24} {}",
            i + 1,
            record.tax_code().unwrap_or("-"),
            truncate(&record.name, 40),
            truncate(record.representative().unwrap_or("-"), 24),
            truncate(&record.address, 60),
        );
    }

    println!("\n{} business(es)", records.len());
}

/// Prints a warning line for every listing page that failed to load.
pub fn print_failures(report: &CrawlReport) {
    for page in report.failures() {
        if let PageOutcome::Failed { reason } = &page.outcome {
            eprintln!("Warning: page {} skipped: {reason}", page.page);
        }
    }
}

/// Prints the attribute table of a detail page.
pub fn print_detail(fields: &BTreeMap<String, String>) {
    if fields.is_empty() {
        println!("No details found on the page.");
        return;
    }

    let width = fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    println!();
    for (label, value) in fields {
        println!("{label:<width$}  {value}");
    }
}

/// Prints the watchlist with 1-based positions.
pub fn print_watchlist(entries: &[BusinessRecord]) {
    if entries.is_empty() {
        println!("Your watchlist is empty.");
        return;
    }

    println!();
    println!(
        "{:<4} {:<12} {:<40} {:<30} NOTE",
        "#", "TAX CODE", "NAME", "ADDRESS"
    );
    println!("{}", "-".repeat(110));

    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<40} {:<30} {}",
            i + 1,
            entry.tax_code().unwrap_or("-"),
            truncate(&entry.name, 40),
            truncate(&entry.address, 30),
            entry.note().unwrap_or(""),
        );
    }

    println!("\n{} entr(ies)", entries.len());
}

/// Prints search history. `show_user` adds a user column.
pub fn print_history(entries: &[SearchHistoryEntry], show_user: bool) {
    if entries.is_empty() {
        println!("No searches yet.");
        return;
    }

    println!();
    if show_user {
        println!("{:<20} {:<16} {:<8} QUERY", "WHEN", "USER", "RESULTS");
    } else {
        println!("{:<20} {:<8} QUERY", "WHEN", "RESULTS");
    }
    println!("{}", "-".repeat(90));

    for entry in entries {
        let when = entry.searched_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut query = entry.query.to_string();
        if !entry.failed_pages.is_empty() {
            query.push_str(&format!(" (failed pages: {:?})", entry.failed_pages));
        }

        if show_user {
            println!(
                "{when:<20} {:<16} {:<8} {query}",
                truncate(&entry.username, 16),
                entry.result_count
            );
        } else {
            println!("{when:<20} {:<8} {query}", entry.result_count);
        }
    }
}

/// Prints account names and roles.
pub fn print_users(accounts: &[UserAccount], admin_username: &str) {
    println!();
    println!("{:<24} ROLE", "USERNAME");
    println!("{}", "-".repeat(32));
    for account in accounts {
        println!("{:<24} {}", account.username, account.role(admin_username));
    }
    println!("\n{} account(s)", accounts.len());
}

/// Prints the outcome of a bulk import.
pub fn print_bulk_report(report: &BulkAddReport) {
    for username in &report.added {
        println!("Added {username}");
    }
    for (line, reason) in &report.skipped {
        eprintln!("Skipped '{line}': {reason}");
    }
    println!(
        "\n{} added, {} skipped",
        report.added.len(),
        report.skipped.len()
    );
}
