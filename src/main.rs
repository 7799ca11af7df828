mod api;
mod chain;
mod config;
mod db;
mod error;
mod moderation;
mod reconcile;
mod stake;
mod state;
mod storage;
mod swipe;
mod types;
mod ws;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::chain::EthersGateway;
use crate::config::{Config, CARD_CHANNEL_CAPACITY};
use crate::db::QuestionStore;
use crate::error::Result;
use crate::moderation::Moderation;
use crate::reconcile::Reconciler;
use crate::stake::StakeWorkflow;
use crate::state::{ActivityLog, CardStore};
use crate::storage::ImageStore;
use crate::types::StatusFilter;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Stores and external collaborators ---
    let questions = QuestionStore::open(&cfg.db_path).await?;
    let images = ImageStore::new(&cfg)?;
    let moderation = Moderation::new(questions.clone(), images);
    let gateway = Arc::new(EthersGateway::connect(&cfg)?);

    // --- Shared in-memory state ---
    let cards = CardStore::new();
    let activity = ActivityLog::new();
    let stake = Arc::new(StakeWorkflow::new(Arc::clone(&gateway), Arc::clone(&activity)));
    let latency = Arc::new(LatencyStats::new());
    let health = HealthState::new();
    let (updates_tx, _) = broadcast::channel(CARD_CHANNEL_CAPACITY);

    // One-shot question snapshot; the poll loop refreshes chain state only.
    // New approvals reach the REST listing immediately and join the deck on
    // the next process start.
    let approved = questions.list_by_status(StatusFilter::Approved).await?;
    info!(count = approved.len(), "Loaded approved questions");

    // --- Reconciler (background, every 5s) ---
    let reconciler = Reconciler::new(
        Arc::clone(&gateway),
        approved,
        Arc::clone(&cards),
        updates_tx.clone(),
        Arc::clone(&latency),
        Arc::clone(&health),
    );
    tokio::spawn(async move { reconciler.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        cfg: Arc::new(cfg.clone()),
        questions,
        moderation,
        cards,
        activity,
        stake,
        updates_tx,
        latency,
        health,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
