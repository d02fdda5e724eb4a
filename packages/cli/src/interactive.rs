//! Interactive menu.
//!
//! Logs in (re-prompting after a wrong password), then loops over a
//! `dialoguer` menu until the user quits. Errors from individual actions
//! are printed and the menu is shown again.

use bizwatch_business_models::{BusinessRecord, PageSelection, SearchQuery};
use bizwatch_cli_utils::{MultiProgress, prompt_new_password, prompt_username, truncate};
use bizwatch_session::{Session, SessionError};
use bizwatch_store::watchlist::EntryEdit;
use dialoguer::{Confirm, Input, Password, Select};

use crate::display;

/// Top-level actions of the interactive menu.
enum Action {
    Search,
    ViewDetail,
    Follow,
    Watchlist,
    History,
    Users,
    ChangePassword,
    Logout,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Search,
        Self::ViewDetail,
        Self::Follow,
        Self::Watchlist,
        Self::History,
        Self::Users,
        Self::ChangePassword,
        Self::Logout,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Search => "Search new businesses",
            Self::ViewDetail => "View details of a result",
            Self::Follow => "Follow a result",
            Self::Watchlist => "Manage watchlist",
            Self::History => "Search history",
            Self::Users => "Manage users",
            Self::ChangePassword => "Change password",
            Self::Logout => "Log out",
            Self::Quit => "Quit",
        }
    }

    const fn admin_only(&self) -> bool {
        matches!(self, Self::Users)
    }
}

/// Watchlist submenu actions.
enum WatchlistAction {
    List,
    Note,
    Edit,
    Remove,
    Back,
}

impl WatchlistAction {
    const ALL: &[Self] = &[Self::List, Self::Note, Self::Edit, Self::Remove, Self::Back];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::List => "List entries",
            Self::Note => "Edit note",
            Self::Edit => "Edit fields",
            Self::Remove => "Remove entry",
            Self::Back => "Back",
        }
    }
}

/// User management submenu actions.
enum UserAction {
    List,
    Add,
    BulkAdd,
    ResetPassword,
    Delete,
    Back,
}

impl UserAction {
    const ALL: &[Self] = &[
        Self::List,
        Self::Add,
        Self::BulkAdd,
        Self::ResetPassword,
        Self::Delete,
        Self::Back,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::List => "List users",
            Self::Add => "Add a user",
            Self::BulkAdd => "Add users from a file",
            Self::ResetPassword => "Reset a password",
            Self::Delete => "Delete a user",
            Self::Back => "Back",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a terminal prompt fails. Failures of individual
/// actions are printed and do not end the menu.
#[allow(clippy::future_not_send)]
pub async fn run(
    session: &mut Session,
    multi: &MultiProgress,
    user: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("bizwatch");
    println!();

    let mut given_user = user.map(str::to_string);

    loop {
        if session.current_user().is_none() && !login(session, given_user.take().as_deref())? {
            return Ok(());
        }

        let actions: Vec<&Action> = Action::ALL
            .iter()
            .filter(|a| !a.admin_only() || session.is_admin())
            .collect();
        let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();

        let prompt = format!(
            "{} | {} result(s)",
            session.current_user().unwrap_or_default(),
            session.results().len()
        );
        let idx = Select::new()
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact()?;

        let result = match actions[idx] {
            Action::Search => handle_search(session, multi).await,
            Action::ViewDetail => handle_detail(session).await,
            Action::Follow => handle_follow(session),
            Action::Watchlist => handle_watchlist(session),
            Action::History => session
                .history()
                .map(|entries| display::print_history(&entries, session.is_admin()))
                .map_err(Into::into),
            Action::Users => handle_users(session),
            Action::ChangePassword => handle_change_password(session),
            Action::Logout => {
                session.logout();
                Ok(())
            }
            Action::Quit => return Ok(()),
        };

        if let Err(e) = result {
            eprintln!("Error: {e}");
        }
        println!();
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Prompts for credentials until a login succeeds. Returns `false` if the
/// user gives up.
fn login(session: &mut Session, user: Option<&str>) -> Result<bool, Box<dyn std::error::Error>> {
    let mut user = user.map(str::to_string);
    loop {
        let username = prompt_username(user.take().as_deref())?;
        let password: String = Password::new().with_prompt("Password").interact()?;

        match session.login(&username, &password) {
            Ok(()) => {
                println!("Welcome, {username}.");
                return Ok(true);
            }
            Err(SessionError::AuthFailure) => {
                eprintln!("Invalid username or password.");
                if !Confirm::new()
                    .with_prompt("Try again?")
                    .default(true)
                    .interact()?
                {
                    return Ok(false);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[allow(clippy::future_not_send)]
async fn handle_search(
    session: &mut Session,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = session.config().scrape.clone();

    let province: String = Input::new()
        .with_prompt("Province filter (empty for all)")
        .allow_empty(true)
        .interact_text()?;

    let discover = Select::new()
        .with_prompt("Pages")
        .items(&["Fixed number of pages", "All pages (discover)"])
        .default(0)
        .interact()?
        == 1;

    let pages = if discover {
        PageSelection::Discover
    } else {
        let n: u32 = Input::new()
            .with_prompt("Number of pages")
            .default(defaults.default_pages)
            .interact_text()?;
        PageSelection::Fixed(n)
    };

    let threads: usize = Input::new()
        .with_prompt("Concurrent fetches")
        .default(defaults.default_threads)
        .interact_text()?;

    let query = SearchQuery {
        province: Some(province).filter(|p| !p.trim().is_empty()),
        pages,
        threads,
    };
    crate::run_search(session, multi, &query).await
}

fn prompt_row(session: &Session, prompt: &str) -> Result<usize, Box<dyn std::error::Error>> {
    if session.results().is_empty() {
        return Err(SessionError::NoResults.into());
    }
    let row: usize = Input::new()
        .with_prompt(format!("{prompt} (1-{})", session.results().len()))
        .interact_text()?;
    Ok(row)
}

#[allow(clippy::future_not_send)]
async fn handle_detail(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    let row = prompt_row(session, "Row")?;
    let fields = session.detail(row).await?;
    display::print_detail(&fields);
    Ok(())
}

fn handle_follow(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let row = prompt_row(session, "Row to follow")?;
    let record = session.result_at(row)?;
    let outcome = session.follow_record(record)?;
    println!("{}: {outcome}", record.name);
    Ok(())
}

/// Lets the user pick a watchlist entry. Returns its 1-based position.
fn pick_entry(entries: &[BusinessRecord], prompt: &str) -> dialoguer::Result<Option<usize>> {
    if entries.is_empty() {
        println!("Your watchlist is empty.");
        return Ok(None);
    }
    let labels: Vec<String> = entries
        .iter()
        .map(|e| format!("{} ({})", truncate(&e.name, 50), e.natural_key()))
        .collect();
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(idx.map(|i| i + 1))
}

fn handle_watchlist(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = WatchlistAction::ALL
        .iter()
        .map(WatchlistAction::label)
        .collect();

    loop {
        let idx = Select::new()
            .with_prompt("Watchlist")
            .items(&labels)
            .default(0)
            .interact()?;

        match WatchlistAction::ALL[idx] {
            WatchlistAction::List => display::print_watchlist(&session.watchlist()?),
            WatchlistAction::Note => {
                let Some(index) = pick_entry(&session.watchlist()?, "Entry")? else {
                    continue;
                };
                let entry = session.entry_at(index)?;
                let note: String = Input::new()
                    .with_prompt("Note")
                    .with_initial_text(entry.note().unwrap_or_default())
                    .allow_empty(true)
                    .interact_text()?;
                session.set_note(&entry.natural_key(), &note)?;
                println!("Note saved.");
            }
            WatchlistAction::Edit => {
                let Some(index) = pick_entry(&session.watchlist()?, "Entry")? else {
                    continue;
                };
                let entry = session.entry_at(index)?;
                let edit = prompt_edit(&entry)?;
                let updated = session.edit_entry(&entry.natural_key(), &edit)?;
                println!("Updated {}.", updated.natural_key());
            }
            WatchlistAction::Remove => {
                let Some(index) = pick_entry(&session.watchlist()?, "Entry to remove")? else {
                    continue;
                };
                let removed = session.remove_entry_at(index)?;
                println!("Removed {}.", removed.name);
            }
            WatchlistAction::Back => return Ok(()),
        }
    }
}

/// Prompts for every editable field, prefilled with the current value.
fn prompt_edit(entry: &BusinessRecord) -> dialoguer::Result<EntryEdit> {
    let text = |prompt: &str, current: &str| -> dialoguer::Result<String> {
        Input::new()
            .with_prompt(prompt)
            .with_initial_text(current)
            .allow_empty(true)
            .interact_text()
    };

    Ok(EntryEdit {
        name: Some(text("Name", &entry.name)?),
        tax_code: Some(text("Tax code", entry.tax_code().unwrap_or_default())?),
        address: Some(text("Address", &entry.address)?),
        representative: Some(text(
            "Representative",
            entry.representative().unwrap_or_default(),
        )?),
        note: None,
    })
}

fn handle_users(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = UserAction::ALL.iter().map(UserAction::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt("Users")
            .items(&labels)
            .default(0)
            .interact()?;

        let result = match UserAction::ALL[idx] {
            UserAction::List => session
                .list_users()
                .map(|accounts| display::print_users(&accounts, &session.config().admin_username))
                .map_err(Into::into),
            UserAction::Add => add_user(session),
            UserAction::BulkAdd => bulk_add_users(session),
            UserAction::ResetPassword => reset_password(session),
            UserAction::Delete => delete_user(session),
            UserAction::Back => return Ok(()),
        };

        if let Err(e) = result {
            eprintln!("Error: {e}");
        }
    }
}

fn add_user(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password = prompt_new_password("Password")?;
    session.add_user(&username, &password)?;
    println!("Created {username}.");
    Ok(())
}

fn bulk_add_users(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let path: String = Input::new()
        .with_prompt("File with username,password lines")
        .interact_text()?;
    let input = std::fs::read_to_string(path.trim())?;
    display::print_bulk_report(&session.bulk_add_users(&input)?);
    Ok(())
}

fn reset_password(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let username = pick_user(session)?;
    let password = prompt_new_password(&format!("New password for {username}"))?;
    session.reset_password(&username, &password)?;
    println!("Password of {username} reset.");
    Ok(())
}

fn delete_user(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let username = pick_user(session)?;
    if Confirm::new()
        .with_prompt(format!("Delete {username} and their watchlist?"))
        .default(false)
        .interact()?
    {
        session.delete_user(&username)?;
        println!("Deleted {username}.");
    }
    Ok(())
}

fn pick_user(session: &Session) -> Result<String, Box<dyn std::error::Error>> {
    let mut names: Vec<String> = session
        .list_users()?
        .into_iter()
        .map(|a| a.username)
        .collect();
    let idx = Select::new()
        .with_prompt("User")
        .items(&names)
        .default(0)
        .interact()?;
    Ok(names.swap_remove(idx))
}

fn handle_change_password(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let current: String = Password::new()
        .with_prompt("Current password")
        .interact()?;
    let new = prompt_new_password("New password")?;
    session.change_password(&current, &new)?;
    println!("Password changed.");
    Ok(())
}
