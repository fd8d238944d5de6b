//! FinQuest daemon - gamified personal-finance learning backend.
//!
//! Serves the learner API, owns the SQLite store, and applies the
//! progression rules (XP, streaks, achievements, practice selection).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use finquest_common::models::ContentPack;
use finquestd::config::{Config, CONFIG_PATH};
use finquestd::db::Db;
use finquestd::server::{self, AppState};
use finquestd::store::Store;

#[derive(Debug, Parser)]
#[command(name = "finquestd", version, about = "FinQuest learning backend daemon")]
struct Args {
    /// Config file path
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the database path from the config
    #[arg(long)]
    db: Option<PathBuf>,

    /// Override the listen address from the config
    #[arg(long)]
    listen: Option<String>,

    /// Import a content pack (JSON) before serving
    #[arg(long)]
    import: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("finquestd v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&args.config);
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let db = Db::open(&config.db_path).await?;
    let store = Store::new(db, config.clone());

    if let Some(pack_path) = args.import {
        let raw = tokio::fs::read_to_string(&pack_path).await?;
        let pack: ContentPack = serde_json::from_str(&raw)?;
        let summary = store.import_content(pack).await?;
        info!(
            "Content import done: {} paths, {} lessons, {} exercises",
            summary.paths, summary.lessons, summary.exercises
        );
    }

    let state = AppState::new(store);
    server::run(state, &config.listen_addr).await
}
