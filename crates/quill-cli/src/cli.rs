use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quill_core::SyncFrequency;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Keep journals in sync across devices over WebDAV")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the database, attachments and sync manifests
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage journals
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },
    /// Write and read entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Configure WebDAV sync targets
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Run sync and inspect its history
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
pub enum JournalCommands {
    /// Create a journal
    Add {
        /// Journal name
        name: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },
    /// List journals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Write a new entry (reads stdin when no content is given)
    #[command(alias = "new")]
    Add {
        /// Journal ID, unique ID prefix or exact name
        #[arg(short, long)]
        journal: String,
        /// Optional title
        #[arg(short, long)]
        title: Option<String>,
        /// Entry content
        content: Vec<String>,
    },
    /// List recent entries
    List {
        /// Only entries of this journal
        #[arg(short, long)]
        journal: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FrequencyArg {
    Manual,
    OnAppStart,
    Hourly,
    Daily,
    Weekly,
}

impl From<FrequencyArg> for SyncFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Manual => Self::Manual,
            FrequencyArg::OnAppStart => Self::OnAppStart,
            FrequencyArg::Hourly => Self::Hourly,
            FrequencyArg::Daily => Self::Daily,
            FrequencyArg::Weekly => Self::Weekly,
        }
    }
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Add a WebDAV target and store its password in the keychain
    Add {
        /// Server root URL, e.g. <https://dav.example.com/remote.php/webdav>
        #[arg(long, value_name = "URL")]
        url: String,
        /// WebDAV user name
        #[arg(long)]
        username: String,
        /// WebDAV password (falls back to `QUILL_WEBDAV_PASSWORD`)
        #[arg(long)]
        password: Option<String>,
        /// Label shown in listings
        #[arg(long)]
        name: Option<String>,
        /// Journals to sync (ID, prefix or name); repeatable
        #[arg(short, long = "journal", value_name = "JOURNAL")]
        journals: Vec<String>,
        /// Reuse an existing config id so several devices share one remote manifest
        #[arg(long, value_name = "ID")]
        id: Option<String>,
        /// How often an external scheduler should sync
        #[arg(long, value_enum, default_value_t = FrequencyArg::Manual)]
        frequency: FrequencyArg,
        /// Leave attachment files out of sync
        #[arg(long)]
        no_attachments: bool,
    },
    /// List configured targets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a target and its stored password
    Remove {
        /// Config ID or unique ID prefix
        id: String,
    },
    /// Check that a target is reachable and writable
    Test {
        /// Config ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Sync every enabled target, or just one
    Run {
        /// Config ID or unique ID prefix
        #[arg(long, value_name = "ID")]
        remote: Option<String>,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
