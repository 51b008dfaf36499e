//! Special commands parser for the interactive chat client
//!
//! Special commands manage sessions and turns without sending anything to
//! the relay:
//! - Create, select, delete, rename, pin, and export sessions
//! - Edit an earlier question or regenerate the last answer
//! - Answer a multiple-choice block by letter or number
//! - Attach images and toggle deep thinking mode
//!
//! Commands are prefixed with `/`. The command word is case-insensitive;
//! arguments keep their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new empty session
    NewSession,

    /// List sessions, pinned first
    ListSessions,

    /// Search sessions by title or content
    Search(String),

    /// Switch to another session (id or unique id prefix)
    Select(String),

    /// Delete a session; the active one when no id is given
    Delete(Option<String>),

    /// Rename the active session
    Rename(String),

    /// Toggle the pin of a session; the active one when no id is given
    TogglePin(Option<String>),

    /// Export the active session as text
    Export(Option<PathBuf>),

    /// Print the active session's messages
    Show,

    /// Replace the user message at a 0-based index and regenerate
    Edit {
        /// Message index
        index: usize,
        /// New content
        content: String,
    },

    /// Regenerate the last response
    Regenerate,

    /// Answer the last multiple-choice block
    Choose(String),

    /// Attach an image to the next message
    AttachImage(PathBuf),

    /// Turn deep thinking mode on or off
    DeepThinking(bool),

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command: send as a message
    None,
}

fn missing(command: &str, usage: &str) -> CommandError {
    CommandError::MissingArgument {
        command: command.to_string(),
        usage: usage.to_string(),
    }
}

fn optional(arg: &str) -> Option<String> {
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for unrecognized `/` commands,
/// `CommandError::MissingArgument` when a required argument is absent, and
/// `CommandError::UnsupportedArgument` for malformed arguments.
///
/// # Examples
///
/// ```
/// use studysphere::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewSession);
/// assert_eq!(
///     parse_special_command("/rename Linear Algebra").unwrap(),
///     SpecialCommand::Rename("Linear Algebra".to_string())
/// );
/// assert_eq!(parse_special_command("what is a vector?").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/frobnicate").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (word, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((w, rest)) => (w.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match word.as_str() {
        "/new" => Ok(SpecialCommand::NewSession),
        "/list" | "/sessions" => Ok(SpecialCommand::ListSessions),
        "/show" | "/history" => Ok(SpecialCommand::Show),
        "/regen" | "/regenerate" => Ok(SpecialCommand::Regenerate),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        "/search" => optional(arg)
            .map(SpecialCommand::Search)
            .ok_or_else(|| missing("/search", "/search <query>")),
        "/select" => optional(arg)
            .map(SpecialCommand::Select)
            .ok_or_else(|| missing("/select", "/select <session id>")),
        "/rename" => optional(arg)
            .map(SpecialCommand::Rename)
            .ok_or_else(|| missing("/rename", "/rename <title>")),
        "/choose" => optional(arg)
            .map(SpecialCommand::Choose)
            .ok_or_else(|| missing("/choose", "/choose <letter|number>")),
        "/image" => optional(arg)
            .map(|p| SpecialCommand::AttachImage(PathBuf::from(p)))
            .ok_or_else(|| missing("/image", "/image <path>")),

        "/delete" => Ok(SpecialCommand::Delete(optional(arg))),
        "/pin" => Ok(SpecialCommand::TogglePin(optional(arg))),
        "/export" => Ok(SpecialCommand::Export(optional(arg).map(PathBuf::from))),

        "/deep" => match arg.to_lowercase().as_str() {
            "on" => Ok(SpecialCommand::DeepThinking(true)),
            "off" => Ok(SpecialCommand::DeepThinking(false)),
            "" => Err(missing("/deep", "/deep <on|off>")),
            other => Err(CommandError::UnsupportedArgument {
                command: "/deep".to_string(),
                arg: other.to_string(),
            }),
        },

        "/edit" => {
            let usage = "/edit <message number> <new text>";
            let (number, content) = arg
                .split_once(char::is_whitespace)
                .map(|(n, c)| (n, c.trim()))
                .ok_or_else(|| missing("/edit", usage))?;
            let index = number
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| CommandError::UnsupportedArgument {
                    command: "/edit".to_string(),
                    arg: number.to_string(),
                })?;
            if content.is_empty() {
                return Err(missing("/edit", usage));
            }
            Ok(SpecialCommand::Edit {
                index,
                content: content.to_string(),
            })
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for the special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

SESSIONS:
  /new              - Start a new chat
  /list             - List chats (pinned first)
  /search <query>   - List chats matching a title or message
  /select <id>      - Switch to a chat (id prefix is enough)
  /rename <title>   - Rename the current chat
  /pin [id]         - Pin or unpin a chat
  /delete [id]      - Delete a chat
  /export [path]    - Save the current chat as text
  /show             - Print the current chat

TURNS:
  /edit <n> <text>  - Replace message n and ask again
  /regen            - Regenerate the last answer
  /choose <A|1>     - Answer the last multiple-choice question
  /image <path>     - Attach an image to your next message
  /deep on|off      - Toggle deep thinking mode

OTHER:
  /help             - Show this help
  exit, quit        - Leave the chat
"#
    );
}
