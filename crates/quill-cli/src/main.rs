//! Quill CLI - write journal entries and sync them over WebDAV

use std::sync::Arc;

use clap::Parser;
use quill_core::webdav::HttpConnector;
use quill_core::KeyringCredentialStore;

mod cli;
mod commands;
mod error;
mod settings;


use cli::{Cli, Commands};
use commands::common::AppContext;
use commands::entry::run_entry;
use commands::journal::run_journal;
use commands::remote::run_remote;
use commands::sync::run_sync;
use error::CliError;
use settings::CliSettings;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "quill=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = CliSettings::load().map_err(CliError::Config)?;
    let ctx = AppContext {
        data_dir: settings.resolve_data_dir(cli.data_dir),
        settings,
        credentials: Arc::new(KeyringCredentialStore::default()),
        connector: Arc::new(HttpConnector),
    };

    match cli.command {
        Commands::Journal { command } => run_journal(command, &ctx).await,
        Commands::Entry { command } => run_entry(command, &ctx).await,
        Commands::Remote { command } => run_remote(command, &ctx).await,
        Commands::Sync { command } => run_sync(command, &ctx).await,
    }
}
