#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for bizwatch.
//!
//! ```text
//! bizwatch search [--province P] [--pages N | --discover] [--threads T] [--follow ROW]...
//! bizwatch detail <link>
//! bizwatch watchlist list | note <key> <text> | edit <key> [...] | remove <key> | remove-at <index>
//! bizwatch users list | add <name> | bulk-add <file> | reset-password <name> | delete <name>
//! bizwatch passwd
//! bizwatch history
//! ```
//!
//! Running `bizwatch` with no subcommand enters interactive mode. Every
//! subcommand logs in first; the password is read from
//! `BIZWATCH_PASSWORD` or prompted for.
//!
//! Uses `indicatif-log-bridge` (via [`bizwatch_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the crawl progress bar never fight for the terminal.

mod display;
mod interactive;

use std::path::PathBuf;

use bizwatch_business_models::{NaturalKey, PageSelection, SearchQuery};
use bizwatch_cli_utils::{
    IndicatifProgress, MultiProgress, prompt_new_password, prompt_password, prompt_username,
};
use bizwatch_session::{AppConfig, Session};
use bizwatch_store::watchlist::EntryEdit;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bizwatch",
    about = "Track newly registered businesses from the Vietnamese tax registry"
)]
struct Cli {
    /// Config file overriding the built-in defaults
    #[arg(long, global = true, env = "BIZWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Account to log in as (prompted for if omitted)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the new-businesses listing
    Search {
        /// Keep only businesses whose address contains this text
        #[arg(long)]
        province: Option<String>,
        /// Number of listing pages to crawl
        #[arg(long, conflicts_with = "discover")]
        pages: Option<u32>,
        /// Crawl every page shown by the pagination control
        #[arg(long)]
        discover: bool,
        /// Maximum concurrent page fetches
        #[arg(long)]
        threads: Option<usize>,
        /// Add result row ROW (1-based) to the watchlist; repeatable
        #[arg(long = "follow", value_name = "ROW")]
        follow: Vec<usize>,
    },
    /// Show the attribute table of a business detail page
    Detail {
        /// Detail page URL
        link: String,
    },
    /// Manage your watchlist
    Watchlist {
        #[command(subcommand)]
        command: WatchlistCommand,
    },
    /// Manage accounts (admin only)
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Change your own password
    Passwd,
    /// Show search history
    History,
}

#[derive(Subcommand)]
enum WatchlistCommand {
    /// List followed businesses
    List,
    /// Set the note of an entry
    Note {
        /// Tax code or detail link
        key: String,
        /// Note text
        text: String,
    },
    /// Edit the fields of an entry
    Edit {
        /// Tax code or detail link
        key: String,
        /// New business name
        #[arg(long)]
        name: Option<String>,
        /// New address
        #[arg(long)]
        address: Option<String>,
        /// New representative (empty to clear)
        #[arg(long)]
        representative: Option<String>,
        /// New tax code (empty to clear)
        #[arg(long)]
        tax_code: Option<String>,
    },
    /// Remove an entry by key
    Remove {
        /// Tax code or detail link
        key: String,
    },
    /// Remove the entry at a 1-based position
    RemoveAt {
        /// Row number as shown by `watchlist list`
        index: usize,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// List accounts
    List,
    /// Create an account
    Add {
        /// New username
        username: String,
    },
    /// Create accounts from a file of `username,password` lines
    BulkAdd {
        /// Input file
        file: PathBuf,
    },
    /// Set another account's password
    ResetPassword {
        /// Account to change
        username: String,
    },
    /// Delete an account and its watchlist
    Delete {
        /// Account to delete
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bizwatch_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let mut session = Session::open(config)?;

    let Some(command) = cli.command else {
        return interactive::run(&mut session, &multi, cli.user.as_deref()).await;
    };

    let username = prompt_username(cli.user.as_deref())?;
    let password = prompt_password("Password")?;
    session.login(&username, &password)?;
    log::debug!("Running subcommand as '{username}'");

    match command {
        Commands::Search {
            province,
            pages,
            discover,
            threads,
            follow,
        } => {
            let defaults = &session.config().scrape;
            let query = SearchQuery {
                province,
                pages: if discover {
                    PageSelection::Discover
                } else {
                    PageSelection::Fixed(pages.unwrap_or(defaults.default_pages))
                },
                threads: threads.unwrap_or(defaults.default_threads),
            };
            run_search(&mut session, &multi, &query).await?;

            for row in follow {
                let outcome = session.follow(row)?;
                println!("Row {row}: {outcome}");
            }
        }
        Commands::Detail { link } => {
            let fields = session.detail_for_link(&link).await?;
            display::print_detail(&fields);
        }
        Commands::Watchlist { command } => run_watchlist(&session, command)?,
        Commands::Users { command } => run_users(&session, command)?,
        Commands::Passwd => {
            let current = prompt_password("Current password")?;
            let new = prompt_new_password("New password")?;
            session.change_password(&current, &new)?;
            println!("Password changed.");
        }
        Commands::History => {
            let entries = session.history()?;
            display::print_history(&entries, session.is_admin());
        }
    }

    Ok(())
}

/// Runs a search with a progress bar and prints the result table.
#[allow(clippy::future_not_send)]
async fn run_search(
    session: &mut Session,
    multi: &MultiProgress,
    query: &SearchQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::pages_bar(multi, "Loading listing");
    let report = session.search(query, &progress).await?;

    display::print_failures(report);
    display::print_results(&report.records);
    Ok(())
}

fn run_watchlist(
    session: &Session,
    command: WatchlistCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        WatchlistCommand::List => display::print_watchlist(&session.watchlist()?),
        WatchlistCommand::Note { key, text } => {
            session.set_note(&NaturalKey::from_input(&key), &text)?;
            println!("Note saved.");
        }
        WatchlistCommand::Edit {
            key,
            name,
            address,
            representative,
            tax_code,
        } => {
            let edit = EntryEdit {
                name,
                tax_code,
                address,
                representative,
                note: None,
            };
            let updated = session.edit_entry(&NaturalKey::from_input(&key), &edit)?;
            println!("Updated {}.", updated.natural_key());
        }
        WatchlistCommand::Remove { key } => {
            let removed = session.remove_entry(&NaturalKey::from_input(&key))?;
            println!("Removed {}.", removed.name);
        }
        WatchlistCommand::RemoveAt { index } => {
            let removed = session.remove_entry_at(index)?;
            println!("Removed {}.", removed.name);
        }
    }
    Ok(())
}

fn run_users(session: &Session, command: UsersCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        UsersCommand::List => {
            let accounts = session.list_users()?;
            display::print_users(&accounts, &session.config().admin_username);
        }
        UsersCommand::Add { username } => {
            let password = prompt_new_password(&format!("Password for {username}"))?;
            session.add_user(&username, &password)?;
            println!("Created {username}.");
        }
        UsersCommand::BulkAdd { file } => {
            let input = std::fs::read_to_string(&file)?;
            let report = session.bulk_add_users(&input)?;
            display::print_bulk_report(&report);
        }
        UsersCommand::ResetPassword { username } => {
            let password = prompt_new_password(&format!("New password for {username}"))?;
            session.reset_password(&username, &password)?;
            println!("Password of {username} reset.");
        }
        UsersCommand::Delete { username } => {
            session.delete_user(&username)?;
            println!("Deleted {username}.");
        }
    }
    Ok(())
}
