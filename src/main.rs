//! Rolodex CLI - local contact manager

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rolodex")]
#[command(version)]
#[command(about = "Local contact manager backed by SQLite")]
#[command(long_about = r#"
Rolodex keeps customer profiles and their interaction history in a local
SQLite database, with timestamped backups and a retention window.

Example usage:
  rolodex init
  rolodex profile add Jane Smith --company Acme --status Customer
  rolodex contact log 1 --kind Call --details "Intro call" --value 1500
  rolodex backup create
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default rolodex.toml and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Manage customer profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Log and list interactions
    #[command(subcommand)]
    Contact(ContactCommand),

    /// Create, list and prune backups
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Rebuild a standalone database from a backup file
    Restore {
        /// Backup file (.db or .sql)
        snapshot: PathBuf,

        /// Database file to create
        target: PathBuf,
    },

    /// Show row counts per table
    Stats,

    /// Answer JSON-lines requests on stdin/stdout
    Serve,
}

#[derive(Subcommand)]
pub(crate) enum ProfileCommand {
    /// Add a profile unless the same name and company already exist
    Add {
        first_name: String,
        last_name: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value = "Lead")]
        status: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all profiles, newest first
    List,

    /// Case-insensitive substring search over names, company, email and status
    Search { term: String },

    /// Change fields of a profile; pass an empty string to clear an optional field
    Update {
        id: i64,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a profile
    Delete {
        id: i64,
        /// Also delete its contacts, scheduled contacts and product links
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum ContactCommand {
    /// Record an interaction with a profile
    Log {
        profile_id: i64,
        /// Interaction date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long, default_value = "Call")]
        kind: String,
        #[arg(short, long)]
        details: String,
        /// Deal value in EUR
        #[arg(long)]
        value: Option<f64>,
    },

    /// List a profile's interactions by date
    List {
        profile_id: i64,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum BackupCommand {
    /// Take a snapshot now and apply retention
    Create,

    /// List backups, newest first
    List,

    /// Delete all but the newest backups
    Prune {
        /// Number of backups to keep (defaults to the configured count)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a machine-readable success envelope
pub(crate) fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `serve` and `--json` keep stdout clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("ROLODEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let config_path = cli.config.unwrap_or_else(rolodex::config::default_config_path);

    let result = match cli.command {
        Commands::Init { force } => commands::run_init(mode, &config_path, force),
        Commands::Profile(cmd) => commands::run_profile(mode, &config_path, cmd),
        Commands::Contact(cmd) => commands::run_contact(mode, &config_path, cmd),
        Commands::Backup(cmd) => commands::run_backup(mode, &config_path, cmd),
        Commands::Restore { snapshot, target } => commands::run_restore(mode, &snapshot, &target),
        Commands::Stats => commands::run_stats(mode, &config_path),
        Commands::Serve => commands::run_serve(&config_path),
    };

    if let Err(e) = &result {
        if mode.is_human() {
            rolodex::ui::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
    result
}
