use crate::cli::SessionCommand;
use crate::config::Config;
use crate::error::{Result, StudySphereError};
use crate::session::{ChatSession, SessionListing, SessionStore, SortOrder};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{format, Table};
use std::path::PathBuf;
use std::sync::Arc;

/// Open the session store at the configured location
pub fn open_store(config: &Config) -> Result<SessionStore> {
    let storage = SqliteStorage::open(config.client.storage_path.as_ref())?;
    tracing::debug!("Using session database {}", storage.path().display());
    SessionStore::load(Arc::new(storage))
}

/// Resolve a full id or a unique id prefix
///
/// # Errors
///
/// - `StudySphereError::SessionNotFound` when nothing matches
/// - `StudySphereError::Validation` when the prefix is ambiguous
pub fn resolve_session_id(store: &SessionStore, id: &str) -> Result<String> {
    if store.session(id).is_some() {
        return Ok(id.to_string());
    }

    let needle = id.to_uppercase();
    let matches: Vec<&ChatSession> = store
        .sessions()
        .iter()
        .filter(|s| s.id.to_uppercase().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err(StudySphereError::SessionNotFound(id.to_string()).into()),
        many => Err(StudySphereError::Validation(format!(
            "Session id prefix '{}' matches {} sessions",
            id,
            many.len()
        ))
        .into()),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..10).unwrap_or(id)
}

/// Print a listing as a table; the active session is marked with `*`
pub fn print_session_table(listing: &SessionListing<'_>, active_id: &str) {
    if listing.is_empty() {
        println!("{}", "No chats found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "".bold(),
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    let rows = listing
        .pinned
        .iter()
        .map(|s| (s, true))
        .chain(listing.others.iter().map(|s| (s, false)));

    for (session, pinned) in rows {
        let marker = match (session.id == active_id, pinned) {
            (true, true) => "*📌",
            (true, false) => "*",
            (false, true) => "📌",
            (false, false) => "",
        };
        table.add_row(prettytable::row![
            marker,
            short_id(&session.id).cyan(),
            session.title,
            session.messages.len(),
            session.updated_at()
        ]);
    }

    table.printstd();
}

/// Print every message of a session, numbered from 1
pub fn print_messages(session: &ChatSession) {
    println!("\n{}\n", session.title.bold());
    if session.messages.is_empty() {
        println!("{}", "(no messages yet)".dimmed());
        return;
    }
    for (i, message) in session.messages.iter().enumerate() {
        let label = match message.role {
            crate::providers::Role::User => message.role.label().green(),
            crate::providers::Role::Assistant => message.role.label().blue(),
        };
        println!("[{}] {}: {}", i + 1, label, message.content);
        if !message.images.is_empty() {
            println!("    {}", format!("({} image(s) attached)", message.images.len()).dimmed());
        }
        println!();
    }
}

/// Write a session export to `output`, or `<title>.txt` in the current directory
pub fn write_export(store: &SessionStore, id: &str, output: Option<PathBuf>) -> Result<PathBuf> {
    let export = store.export(id)?;
    let path = output.unwrap_or_else(|| PathBuf::from(&export.file_name));
    std::fs::write(&path, export.content).map_err(StudySphereError::from)?;
    Ok(path)
}

/// Handle `studysphere sessions ...`
pub fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let mut store = open_store(config)?;

    match command {
        SessionCommand::List { search, sort } => {
            let sort: SortOrder = sort.parse()?;
            let listing = store.list(search.as_deref(), sort);
            println!("\nChats:");
            print_session_table(&listing, store.active_id());
            println!();
        }
        SessionCommand::Show { id } => {
            let id = resolve_session_id(&store, &id)?;
            if let Some(session) = store.session(&id) {
                print_messages(session);
            }
        }
        SessionCommand::Export { id, output } => {
            let id = resolve_session_id(&store, &id)?;
            let path = write_export(&store, &id, output)?;
            println!("{}", format!("Exported chat to {}", path.display()).green());
        }
        SessionCommand::Rename { id, title } => {
            let id = resolve_session_id(&store, &id)?;
            store.rename(&id, &title)?;
            println!("{}", format!("Renamed chat {}", short_id(&id)).green());
        }
        SessionCommand::Pin { id } => {
            let id = resolve_session_id(&store, &id)?;
            let pinned = store.toggle_pin(&id)?;
            let msg = if pinned { "Chat pinned" } else { "Chat unpinned" };
            println!("{}", msg.green());
        }
        SessionCommand::Delete { id } => {
            let id = resolve_session_id(&store, &id)?;
            store.delete_session(&id)?;
            println!("{}", "Chat deleted".green());
        }
    }

    if let Some(e) = store.take_persist_error() {
        return Err(StudySphereError::Storage(e).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_resolve_full_and_prefix() {
        let mut store = SessionStore::load(Arc::new(MemoryStorage::new())).unwrap();
        let id = store.new_session();
        assert_eq!(resolve_session_id(&store, &id).unwrap(), id);
        assert_eq!(
            resolve_session_id(&store, &id[..20].to_lowercase()).unwrap(),
            id
        );
        assert!(resolve_session_id(&store, "zzzz").is_err());
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let mut store = SessionStore::load(Arc::new(MemoryStorage::new())).unwrap();
        store.new_session();
        // Every id matches the empty prefix
        let err = resolve_session_id(&store, "").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StudySphereError>(),
            Some(StudySphereError::Validation(_))
        ));
    }

    #[test]
    fn test_write_export_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(Arc::new(MemoryStorage::new())).unwrap();
        let path = write_export(
            &store,
            store.active_id(),
            Some(dir.path().join("out.txt")),
        )
        .unwrap();
        assert!(path.exists());
    }
}
