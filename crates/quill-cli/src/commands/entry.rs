use quill_core::Entry;

use crate::cli::EntryCommands;
use crate::commands::common::{
    entry_to_list_item, format_entry_lines, resolve_entry_content, resolve_journal, AppContext,
    EntryListItem,
};
use crate::error::CliError;

pub async fn run_entry(command: EntryCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        EntryCommands::Add {
            journal,
            title,
            content,
        } => run_entry_add(&journal, title, &content, ctx).await,
        EntryCommands::List {
            journal,
            limit,
            json,
        } => run_entry_list(journal.as_deref(), limit, json, ctx).await,
    }
}

pub async fn run_entry_add(
    journal: &str,
    title: Option<String>,
    content_parts: &[String],
    ctx: &AppContext,
) -> Result<(), CliError> {
    let content = resolve_entry_content(content_parts)?;

    let db = ctx.open_database()?;
    let journal = resolve_journal(&db, journal).await?;
    let entry = db.create_entry(&journal.id, title, &content).await?;

    println!("{}", entry.id);
    Ok(())
}

/// Most recently updated entries, optionally limited to one journal
pub async fn list_entries(
    journal: Option<&str>,
    limit: usize,
    ctx: &AppContext,
) -> Result<Vec<Entry>, CliError> {
    let db = ctx.open_database()?;
    let journals = match journal {
        Some(query) => vec![resolve_journal(&db, query).await?],
        None => db.list_journals().await?,
    };

    let mut entries = Vec::new();
    for journal in &journals {
        entries.extend(db.list_entries(&journal.id).await?);
    }
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    entries.truncate(limit);
    Ok(entries)
}

async fn run_entry_list(
    journal: Option<&str>,
    limit: usize,
    as_json: bool,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let entries = list_entries(journal, limit, ctx).await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
