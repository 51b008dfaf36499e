//! StudySphere - Socratic tutoring chat relay
//!
#![doc = "Main entry point for the StudySphere server and terminal client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studysphere::cli::{Cli, Commands};
use studysphere::commands;
use studysphere::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => commands::serve::run_serve(config).await,
        Commands::Chat { deep, session, .. } => {
            if let Some(s) = &session {
                tracing::debug!("Resuming session: {}", s);
            }
            commands::chat::run_chat(config, deep, session).await
        }
        Commands::Sessions { command } => commands::sessions::handle_sessions(&config, command),
        Commands::Catalog { json } => commands::catalog::print_catalog(json),
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "studysphere=debug"
    } else {
        "studysphere=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so `catalog --json` output stays machine readable
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}
