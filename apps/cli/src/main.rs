//! # Rabbit Tab CLI
//!
//! Command-line front end over the Rabbit Tab libraries.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           CLI Startup                                   │
//! │                                                                         │
//! │  1. Initialize tracing (stderr, RUST_LOG aware)                         │
//! │  2. Parse arguments (clap)                                              │
//! │  3. Load RabbitConfig (defaults → rabbit.toml → RABBIT_* env)           │
//! │  4. Open SQLite (migrations run on connect)                             │
//! │  5. Build ShareService (Redis if configured, else SQLite)               │
//! │  6. Dispatch the command                                                │
//! │                                                                         │
//! │  Edits go through a TabAgent and are saved before the process exits.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;
mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rabbit_db::{Database, DbConfig};
use rabbit_sync::{RabbitConfig, RedisShareStore, ShareService, ShareStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = RabbitConfig::load(cli.config.clone()).context("loading configuration")?;

    let db = open_database(&config, cli.db.clone()).await?;
    let shares = share_service(&config, &db).await?;

    match cli.command {
        Commands::New {
            name,
            currency,
            tax,
            tip,
        } => commands::new_tab(&db, &name, &currency, tax, tip).await,
        Commands::List { limit } => commands::list(&db, limit).await,
        Commands::Show { tab } => commands::show(&db, &tab).await,
        Commands::AddItem {
            tab,
            description,
            price,
        } => commands::add_item(&db, &config, &tab, &description, &price).await,
        Commands::AddRabbit { tab, name, color } => {
            commands::add_rabbit(&db, &config, &tab, &name, color.map(Into::into)).await
        }
        Commands::Assign { tab, item, rabbit } => {
            commands::assign(&db, &config, &tab, &item, &rabbit).await
        }
        Commands::Rates { tab, tax, tip } => commands::rates(&db, &config, &tab, tax, tip).await,
        Commands::Share { tab, remote } => commands::share(&db, &shares, &tab, remote).await,
        Commands::Open { link, json } => commands::open(&shares, &link, json).await,
        Commands::Scan { file, tab } => commands::scan(&db, &config, &file, tab.as_deref()).await,
        Commands::Demo => commands::demo(&config).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so command output stays pipeable.
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=rabbit_sync=trace` - Trace the edit session only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rabbit=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_database(config: &RabbitConfig, override_path: Option<PathBuf>) -> Result<Database> {
    let path = override_path
        .or_else(|| config.database_path())
        .context("could not determine a data directory; pass --db")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    debug!(path = %path.display(), "Opening database");
    let db = Database::new(DbConfig::new(path.clone())).await?;
    Ok(db)
}

async fn share_service(config: &RabbitConfig, db: &Database) -> Result<ShareService> {
    let store: Arc<dyn ShareStore> = match config.share.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisShareStore::open(url)?;
            redis.ping().await.context("connecting to redis")?;
            info!("Using Redis for short share links");
            Arc::new(redis)
        }
        None => Arc::new(db.clone()),
    };
    Ok(ShareService::new(&config.share, Some(store))?)
}
