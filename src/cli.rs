//! CLI interface for meta-suggest

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{self, Config};
use crate::learning::{MetadataDocument, SuggestionService};
use serde_json::Value;
use crate::server::{self, ServerState};

#[derive(Parser)]
#[command(name = "meta-suggest")]
#[command(about = "Learning suggestion engine for image metadata fields", long_about = None)]
#[command(version)]
struct Cli {
    /// Learning database to use instead of the configured one
    #[arg(long, global = true, env = "META_SUGGEST_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
    #[command(flatten)]
    Learning(LearningCommand),
}

/// Commands that work on the learning database
#[derive(Subcommand)]
enum LearningCommand {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (default from config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Show ranked suggestions for a field
    Suggest {
        /// Metadata section (EXIF, IPTC, XMP, Custom, ...)
        section: String,
        /// Field name within the section
        field: String,
        /// Maximum suggestions (default from config)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Record an accepted value for a field
    Record {
        section: String,
        field: String,
        value: String,
    },
    /// Learn from a saved metadata document (JSON: section -> field -> value)
    Ingest {
        /// Path to the JSON document
        file: PathBuf,
    },
    /// Most used values across all fields
    Popular {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Recently used values
    Recent {
        /// Look-back window in days
        #[arg(short, long, default_value = "7")]
        days: i64,
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Show learning statistics
    Stats,
    /// Forget values not used recently
    Cleanup {
        /// Keep values used within this many days (default from config)
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Delete all learning data
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Get or set an editor preference
    Pref {
        #[command(subcommand)]
        command: PrefCommands,
    },
}

#[derive(Subcommand)]
enum PrefCommands {
    /// Print a stored preference
    Get { key: String },
    /// Store a preference (JSON, or plain text)
    Set { key: String, value: String },
}

async fn open_service(config: &Config, db: Option<PathBuf>) -> Result<SuggestionService> {
    let path = match db {
        Some(path) => path,
        None => config.learning.database_path()?,
    };

    SuggestionService::open(&path, config.learning.ranking())
        .await
        .with_context(|| format!("Failed to open learning database {}", path.display()))
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show, reset } => {
            if reset {
                config::reset_config()?;
            } else if show {
                config::show_config(&Config::load()?)?;
            } else {
                println!("{}", config::default_config_toml());
            }
            Ok(())
        }
        Commands::Learning(command) => run_learning_command(command, cli.db).await,
    }
}

async fn run_learning_command(command: LearningCommand, db: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let service = open_service(&config, db).await?;

    match command {
        LearningCommand::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            server::start(&host, port, ServerState::new(service, config)).await?;
        }
        LearningCommand::Suggest { section, field, limit } => {
            let limit = limit.unwrap_or(config.learning.default_limit as i64);
            let suggestions = service.get_suggestions(&section, &field, limit).await?;
            if suggestions.is_empty() {
                println!("No suggestions for {}.{}", section, field);
            } else {
                for (i, s) in suggestions.iter().enumerate() {
                    println!("{:>2}. {} (used {}x)", i + 1, s.value, s.count);
                }
            }
        }
        LearningCommand::Record { section, field, value } => {
            service.record_accepted_edit(&section, &field, &value).await?;
            println!("Learned {}.{} = {}", section, field, value);
        }
        LearningCommand::Ingest { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document: MetadataDocument = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a metadata document", file.display()))?;
            let report = service.record_document(&document).await?;
            println!("Learned {} field(s), skipped {}.", report.learned, report.skipped);
        }
        LearningCommand::Popular { limit } => {
            let values = service.popular_values(limit).await?;
            if values.is_empty() {
                println!("Nothing learned yet.");
            }
            for v in &values {
                println!("  {:<30} {:<30} {:>5}x", v.field, v.value, v.count);
            }
        }
        LearningCommand::Recent { days, limit } => {
            let values = service.recent_values(days, limit).await?;
            if values.is_empty() {
                println!("No values used in the last {} day(s).", days);
            }
            for v in &values {
                println!(
                    "  {}  {:<30} {}",
                    v.last_used_at.format("%Y-%m-%d %H:%M"),
                    v.field,
                    v.value
                );
            }
        }
        LearningCommand::Stats => {
            let stats = service.stats().await;
            println!("Learning Statistics");
            println!("==================");
            println!("Fields:        {}", stats.fields);
            println!("Values:        {}", stats.values);
            println!("Total commits: {}", stats.total_commits);
            if let Some(newest) = stats.newest {
                println!("Last learned:  {}", newest.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        LearningCommand::Cleanup { days } => {
            let days = days.unwrap_or(i64::from(config.learning.retention_days));
            let removed = service.prune_stale(days).await?;
            println!("Removed {} value(s) unused for {} day(s).", removed, days);
        }
        LearningCommand::Clear { yes } => {
            clear_learning_data(&service, yes).await?;
        }
        LearningCommand::Pref { command } => match command {
            PrefCommands::Get { key } => match service.get_user_preference(&key).await? {
                Some(value) => println!("{}", value),
                None => println!("{} is not set", key),
            },
            PrefCommands::Set { key, value } => {
                let value = parse_preference(value);
                service.save_user_preference(&key, &value).await?;
                println!("Saved {} = {}", key, value);
            }
        },
    }

    Ok(())
}

/// JSON if it parses, otherwise the raw text
fn parse_preference(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

async fn clear_learning_data(service: &SuggestionService, skip_confirm: bool) -> Result<()> {
    let stats = service.stats().await;

    if stats.fields == 0 {
        println!("No learning data found.");
        return Ok(());
    }

    if !skip_confirm {
        println!("This will delete ALL {} learned value(s) across {} field(s)!",
            stats.values, stats.fields);
        println!();
        println!("Type 'yes' to confirm:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "yes" {
            println!("Cancelled.");
            return Ok(());
        }
    }

    service.clear_learning_data().await?;
    println!("Learning data cleared.");

    Ok(())
}
