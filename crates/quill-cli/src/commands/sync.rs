use std::sync::Arc;

use quill_core::{SyncConfig, SyncEngine, SyncError, SyncReport, SyncState};
use tokio::task::JoinError;

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_sync_conflict_lines, resolve_remote, short_id, sync_conflict_to_item, AppContext,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(command: SyncCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        SyncCommands::Run { remote } => run_sync_run(remote.as_deref(), ctx).await,
        SyncCommands::Conflicts { limit, json } => run_sync_conflicts(limit, json, ctx).await,
    }
}

/// Configs a `sync run` invocation should cover
pub async fn select_configs(
    remote: Option<&str>,
    ctx: &AppContext,
) -> Result<Vec<SyncConfig>, CliError> {
    let db = ctx.open_database()?;
    if let Some(query) = remote {
        return Ok(vec![resolve_remote(&db, query).await?]);
    }

    let configs = db
        .list_sync_configs()
        .await?
        .into_iter()
        .filter(|config| config.enabled)
        .collect::<Vec<_>>();
    if configs.is_empty() {
        return Err(CliError::NoRemotes);
    }
    Ok(configs)
}

/// Start one run per config and wait for all of them, cancelling on Ctrl-C
pub async fn sync_configs(
    engine: &Arc<SyncEngine>,
    configs: &[SyncConfig],
) -> Vec<(SyncConfig, Result<SyncReport, SyncError>)> {
    let mut outcomes = Vec::with_capacity(configs.len());
    let handles = configs
        .iter()
        .map(|config| (config.clone(), engine.spawn_sync(config.id)))
        .collect::<Vec<_>>();

    for (config, mut handle) in handles {
        let mut status = engine.subscribe(config.id);
        let mut last_state = SyncState::Idle;
        let outcome = loop {
            tokio::select! {
                joined = &mut handle => break settle(joined),
                changed = status.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    let snapshot = status.borrow_and_update().clone();
                    if snapshot.state != last_state {
                        last_state = snapshot.state;
                        eprintln!(
                            "[{}] {} {}/{}",
                            config.display_name,
                            snapshot.state,
                            snapshot.completed_items,
                            snapshot.total_items
                        );
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Cancelling sync runs...");
                    for config in configs {
                        engine.cancel_sync(&config.id);
                    }
                }
            }
        };
        outcomes.push((config, outcome));
    }
    outcomes
}

/// Flatten a joined sync task; a panicked or aborted task becomes `Interrupted`
pub fn settle(
    joined: Result<Result<SyncReport, SyncError>, JoinError>,
) -> Result<SyncReport, SyncError> {
    joined.unwrap_or_else(|error| Err(SyncError::Interrupted(error.to_string())))
}

pub fn format_report_line(config: &SyncConfig, outcome: &Result<SyncReport, SyncError>) -> String {
    let label = format!("{} ({})", config.display_name, short_id(&config.id.to_string()));
    match outcome {
        Ok(report) => format!(
            "{label}: uploaded={} downloaded={} conflicts={} unchanged={} skipped={} failed={}",
            report.uploaded,
            report.downloaded,
            report.conflicts_resolved,
            report.unchanged,
            report.skipped,
            report.failed.len()
        ),
        Err(error) => format!("{label}: {}", error.user_message()),
    }
}

async fn run_sync_run(remote: Option<&str>, ctx: &AppContext) -> Result<(), CliError> {
    let configs = select_configs(remote, ctx).await?;
    let engine = ctx.engine(ctx.open_database()?);

    let outcomes = sync_configs(&engine, &configs).await;
    let mut failed = 0;
    for (config, outcome) in &outcomes {
        println!("{}", format_report_line(config, outcome));
        if let Ok(report) = outcome {
            for failure in &report.failed {
                println!("  ! {}: {}", failure.key, failure.message);
            }
        } else {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(CliError::SyncRunsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

async fn run_sync_conflicts(limit: usize, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let db = ctx.open_database()?;
    let conflicts = db.list_conflicts(limit).await?;

    if as_json {
        let items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }
    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
