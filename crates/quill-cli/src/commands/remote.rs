use quill_core::{SyncConfig, SyncConfigId};

use crate::cli::{FrequencyArg, RemoteCommands};
use crate::commands::common::{
    format_remote_lines, remote_to_list_item, resolve_journal, resolve_remote, AppContext,
    RemoteListItem,
};
use crate::error::CliError;

const PASSWORD_ENV: &str = "QUILL_WEBDAV_PASSWORD";

/// Fields of `quill remote add`
pub struct RemoteAddArgs {
    pub url: String,
    pub username: String,
    pub password: Option<String>,
    pub name: Option<String>,
    pub journals: Vec<String>,
    pub id: Option<String>,
    pub frequency: FrequencyArg,
    pub no_attachments: bool,
}

pub async fn run_remote(command: RemoteCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        RemoteCommands::Add {
            url,
            username,
            password,
            name,
            journals,
            id,
            frequency,
            no_attachments,
        } => {
            let config = add_remote(
                RemoteAddArgs {
                    url,
                    username,
                    password,
                    name,
                    journals,
                    id,
                    frequency,
                    no_attachments,
                },
                ctx,
            )
            .await?;
            println!("{}", config.id);
            Ok(())
        }
        RemoteCommands::List { json } => run_remote_list(json, ctx).await,
        RemoteCommands::Remove { id } => run_remote_remove(&id, ctx).await,
        RemoteCommands::Test { id } => run_remote_test(&id, ctx).await,
    }
}

fn resolve_password(explicit: Option<String>) -> Result<String, CliError> {
    explicit
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .filter(|password| !password.is_empty())
        .ok_or(CliError::MissingPassword)
}

pub async fn add_remote(args: RemoteAddArgs, ctx: &AppContext) -> Result<SyncConfig, CliError> {
    let password = resolve_password(args.password)?;
    let display_name = args
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| args.url.clone());

    let mut config = SyncConfig::new(&args.url, &args.username, display_name)?;
    if let Some(raw) = args.id {
        config.id = raw
            .trim()
            .parse::<SyncConfigId>()
            .map_err(|_| CliError::InvalidId(raw.clone()))?;
    }
    config.sync_frequency = args.frequency.into();
    config.sync_attachments = !args.no_attachments;

    let db = ctx.open_database()?;
    if db.get_sync_config(&config.id).await?.is_some() {
        return Err(CliError::Config(format!(
            "A sync target with id {} already exists",
            config.id
        )));
    }
    for query in &args.journals {
        let journal = resolve_journal(&db, query).await?;
        config = config.with_journal(journal.id);
    }

    db.save_sync_config(&config).await?;
    ctx.credentials.set_password(&config.id, &password)?;
    tracing::info!(config_id = %config.id, journals = config.synced_journal_ids.len(), "Added sync target");
    Ok(config)
}

async fn run_remote_list(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let db = ctx.open_database()?;
    let configs = db.list_sync_configs().await?;

    if as_json {
        let items = configs
            .iter()
            .map(remote_to_list_item)
            .collect::<Vec<RemoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!("No sync targets. Add one with `quill remote add`.");
        return Ok(());
    }
    for line in format_remote_lines(&configs) {
        println!("{line}");
    }
    Ok(())
}

pub async fn remove_remote(query: &str, ctx: &AppContext) -> Result<SyncConfig, CliError> {
    let db = ctx.open_database()?;
    let config = resolve_remote(&db, query).await?;
    db.delete_sync_config(&config.id).await?;
    ctx.credentials.delete_password(&config.id)?;
    Ok(config)
}

async fn run_remote_remove(query: &str, ctx: &AppContext) -> Result<(), CliError> {
    let config = remove_remote(query, ctx).await?;
    println!("Removed {} ({})", config.display_name, config.id);
    Ok(())
}

async fn run_remote_test(query: &str, ctx: &AppContext) -> Result<(), CliError> {
    let db = ctx.open_database()?;
    let config = resolve_remote(&db, query).await?;
    let password = ctx
        .credentials
        .password(&config.id)?
        .ok_or(CliError::MissingPassword)?;

    let engine = ctx.engine(db);
    if engine.test_connection(&config, &password).await? {
        println!("OK: {} is reachable and writable", config.server_url);
        Ok(())
    } else {
        Err(CliError::Config(format!(
            "Could not read and write {} as {}",
            config.server_url, config.username
        )))
    }
}
