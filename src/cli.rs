//! Command-line interface definition for StudySphere
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving the relay, chatting through it,
//! managing stored sessions, and inspecting the billing catalog.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// StudySphere - Socratic tutoring chat relay
///
/// Serve the chat relay and billing glue over HTTP, or talk to a running
/// relay from the terminal with locally persisted chat sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "studysphere")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the session database path
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for StudySphere
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server (chat relay, auth gate, billing routes)
    Serve {
        /// Address to bind, e.g. 0.0.0.0:3000
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Start an interactive chat against a running relay
    Chat {
        /// Relay endpoint URL (defaults to client.relay_url)
        #[arg(short, long)]
        relay: Option<String>,

        /// Start with deep thinking mode enabled
        #[arg(long)]
        deep: bool,

        /// Resume a stored session instead of the most recent one
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage stored chat sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Print the billing catalog
    Catalog {
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, pinned first
    List {
        /// Only show sessions whose title or messages contain this text
        #[arg(short, long)]
        search: Option<String>,

        /// Sort order: recent, oldest, alphabetical
        #[arg(long, default_value = "recent")]
        sort: String,
    },

    /// Print every message of a session
    Show {
        /// Session id
        id: String,
    },

    /// Export a session as plain text
    Export {
        /// Session id
        id: String,

        /// Output file (defaults to "<title>.txt")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename a session
    Rename {
        /// Session id
        id: String,

        /// New title
        title: String,
    },

    /// Toggle the pinned state of a session
    Pin {
        /// Session id
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            storage_path: None,
            command: Commands::Serve { bind: None },
        }
    }
}
