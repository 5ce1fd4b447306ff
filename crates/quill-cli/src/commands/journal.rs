use crate::cli::JournalCommands;
use crate::commands::common::{short_id, AppContext, JournalListItem};
use crate::error::CliError;

pub async fn run_journal(command: JournalCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        JournalCommands::Add { name, description } => {
            run_journal_add(&name, description, ctx).await
        }
        JournalCommands::List { json } => run_journal_list(json, ctx).await,
    }
}

pub async fn run_journal_add(
    name: &str,
    description: Option<String>,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let db = ctx.open_database()?;
    let journal = db.create_journal(name, description).await?;
    println!("{}", journal.id);
    Ok(())
}

pub async fn list_journal_items(ctx: &AppContext) -> Result<Vec<JournalListItem>, CliError> {
    let db = ctx.open_database()?;
    let mut items = Vec::new();
    for journal in db.list_journals().await? {
        let entries = db.list_entries(&journal.id).await?.len();
        items.push(JournalListItem {
            id: journal.id.to_string(),
            name: journal.name,
            description: journal.description,
            entries,
            updated_at: journal.updated_at,
        });
    }
    Ok(items)
}

async fn run_journal_list(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let items = list_journal_items(ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No journals yet. Create one with `quill journal add <NAME>`.");
        return Ok(());
    }

    for item in &items {
        println!(
            "{:<13}  {:<24}  {} entries",
            short_id(&item.id),
            item.name,
            item.entries
        );
    }
    Ok(())
}
