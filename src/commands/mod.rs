/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `serve`    runs the HTTP relay
- `chat`     is the interactive terminal client
- `sessions` manages stored chat sessions
- `catalog`  prints the billing catalog
*/

use crate::config::Config;
use crate::error::Result;

// Billing catalog printer
pub mod catalog;

// Stored session management
pub mod sessions;

// Special commands parser for the chat client
pub mod special_commands;

// HTTP server command handler
pub mod serve {
    use super::*;

    /// Run the relay until Ctrl-C
    pub async fn run_serve(config: Config) -> Result<()> {
        tracing::info!(bind_addr = %config.server.bind_addr, "Starting StudySphere server");
        crate::server::serve(&config).await
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat client.
    //!
    //! Loads the local session store, then runs a readline loop that either
    //! dispatches a special command or sends the line to the relay as a new
    //! turn, printing the response as it streams.

    use super::*;
    use crate::client::{drive_turn, image_data_uri, RelayClient};
    use crate::commands::sessions::{
        open_store, print_messages, print_session_table, resolve_session_id, write_export,
    };
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::error::StudySphereError;
    use crate::providers::Role;
    use crate::session::{parse_mcq, resolve_option, SessionStore, SortOrder, Turn};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::io::Write;

    /// Mutable state of one chat client run
    struct ChatState {
        store: SessionStore,
        client: RelayClient,
        deep_thinking: bool,
        pending_images: Vec<String>,
    }

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed); `client.relay_url` is the endpoint
    /// * `deep` - Start with deep thinking enabled
    /// * `session` - Session id or id prefix to resume
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use studysphere::commands::chat;
    /// use studysphere::config::Config;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// chat::run_chat(Config::default(), false, None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_chat(config: Config, deep: bool, session: Option<String>) -> Result<()> {
        let mut store = open_store(&config)?;
        if let Some(prefix) = session {
            let id = resolve_session_id(&store, &prefix)?;
            store.select_session(&id)?;
        }

        let client = RelayClient::new(config.client.relay_url.clone())?;
        tracing::info!(relay = client.endpoint(), "Starting interactive chat");

        let mut state = ChatState {
            store,
            client,
            deep_thinking: deep,
            pending_images: Vec::new(),
        };

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&state);

        loop {
            let prompt = format_prompt(&state);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match parse_special_command(trimmed) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    if command == SpecialCommand::Exit {
                        break;
                    }

                    if let Err(e) = handle_input(&mut state, command, trimmed).await {
                        eprintln!("{} {}", "Error:".red().bold(), e);
                    }

                    if let Some(e) = state.store.take_persist_error() {
                        eprintln!("{} {}", "Warning: chat not saved:".yellow(), e);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn handle_input(state: &mut ChatState, command: SpecialCommand, line: &str) -> Result<()> {
        let deep = state.deep_thinking;
        let store = &mut state.store;

        match command {
            SpecialCommand::None => {
                let images = std::mem::take(&mut state.pending_images);
                let turn = store.begin_send(line, images, deep)?;
                run_turn(state, turn).await;
            }
            SpecialCommand::Choose(choice) => {
                let option = last_mcq_option(store, &choice)?;
                let turn = store.begin_mcq_reply(&option, deep)?;
                println!("{} {}", "You chose:".dimmed(), option);
                run_turn(state, turn).await;
            }
            SpecialCommand::Edit { index, content } => {
                let turn = store.begin_edit(index, &content, deep)?;
                run_turn(state, turn).await;
            }
            SpecialCommand::Regenerate => {
                let turn = store.begin_regenerate_last(deep)?;
                run_turn(state, turn).await;
            }
            SpecialCommand::NewSession => {
                store.new_session();
                println!("{}", "Started a new chat".green());
            }
            SpecialCommand::ListSessions => {
                print_session_table(&store.list(None, SortOrder::Recent), store.active_id());
            }
            SpecialCommand::Search(query) => {
                print_session_table(
                    &store.list(Some(&query), SortOrder::Recent),
                    store.active_id(),
                );
            }
            SpecialCommand::Select(prefix) => {
                let id = resolve_session_id(store, &prefix)?;
                store.select_session(&id)?;
                println!("{} {}", "Switched to".green(), store.active().title);
            }
            SpecialCommand::Delete(target) => {
                let id = match target {
                    Some(prefix) => resolve_session_id(store, &prefix)?,
                    None => store.active_id().to_string(),
                };
                store.delete_session(&id)?;
                println!("{}", "Chat deleted".green());
            }
            SpecialCommand::Rename(title) => {
                let id = store.active_id().to_string();
                store.rename(&id, &title)?;
                println!("{}", "Chat renamed".green());
            }
            SpecialCommand::TogglePin(target) => {
                let id = match target {
                    Some(prefix) => resolve_session_id(store, &prefix)?,
                    None => store.active_id().to_string(),
                };
                let msg = if store.toggle_pin(&id)? {
                    "Chat pinned"
                } else {
                    "Chat unpinned"
                };
                println!("{}", msg.green());
            }
            SpecialCommand::Export(output) => {
                let path = write_export(store, store.active_id(), output)?;
                println!("{} {}", "Exported chat to".green(), path.display());
            }
            SpecialCommand::Show => print_messages(store.active()),
            SpecialCommand::AttachImage(path) => {
                state.pending_images.push(image_data_uri(&path)?);
                println!(
                    "{} {} ({} pending)",
                    "Attached".green(),
                    path.display(),
                    state.pending_images.len()
                );
            }
            SpecialCommand::DeepThinking(on) => {
                state.deep_thinking = on;
                let label = if on { "on" } else { "off" };
                println!("Deep thinking mode {}", label.cyan());
            }
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit => {}
        }

        Ok(())
    }

    /// Resolve a choice against the first MCQ block of the latest answer
    fn last_mcq_option(store: &SessionStore, choice: &str) -> Result<String> {
        let block = store
            .active()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| parse_mcq(&m.content))
            .ok_or_else(|| {
                StudySphereError::Validation("The last answer has no options to choose".to_string())
            })?;

        resolve_option(&block.options, choice)
            .map(str::to_string)
            .ok_or_else(|| {
                StudySphereError::Validation(format!("No option matches '{}'", choice)).into()
            })
    }

    /// Stream a turn to stdout; failures are reported, not propagated
    async fn run_turn(state: &mut ChatState, turn: Turn) {
        println!();
        let mut stdout = std::io::stdout();
        let result = drive_turn(&mut state.store, &state.client, &turn, |delta| {
            print!("{}", delta);
            let _ = stdout.flush();
        })
        .await;
        println!("\n");

        match result {
            Ok(full) => {
                if let Some(block) = parse_mcq(&full) {
                    for (i, option) in block.options.iter().enumerate() {
                        println!("  {} {}", format!("{}.", i + 1).cyan(), option);
                    }
                    println!("{}\n", "Answer with /choose <letter|number>".dimmed());
                }
            }
            Err(e) => eprintln!("{} {}\n", "Response failed:".red().bold(), e),
        }
    }

    fn format_prompt(state: &ChatState) -> String {
        let mut tags = Vec::new();
        if state.deep_thinking {
            tags.push("deep".magenta().to_string());
        }
        if !state.pending_images.is_empty() {
            tags.push(format!("{} img", state.pending_images.len()).yellow().to_string());
        }
        let title = state.store.active().title.as_str();
        if tags.is_empty() {
            format!("[{}] >> ", title.cyan())
        } else {
            format!("[{}|{}] >> ", title.cyan(), tags.join("|"))
        }
    }

    fn print_welcome_banner(state: &ChatState) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║          StudySphere Interactive Tutor - Welcome!            ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Relay:  {}", state.client.endpoint().cyan());
        println!("Chat:   {}", state.store.active().title);
        let deep = if state.deep_thinking { "on" } else { "off" };
        println!("Deep thinking: {}\n", deep);
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }
}
