//! # reconcile-stats
//!
//! Recounts users, posts, comments and reactions from the store and
//! overwrites the global statistics row with the result. Incremental
//! counters drift; run this on a schedule to pull them back.

use std::sync::Arc;

use configs::{Settings, TelemetrySettings};
use services::{EngagementCore, Ports};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use storage_adapters::PgStore;

#[cfg(not(feature = "db-postgres"))]
use storage_adapters::InMemoryStore;

fn init_tracing(telemetry: &TelemetrySettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&telemetry.log_filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if telemetry.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(feature = "db-postgres")]
async fn connect(settings: &Settings) -> anyhow::Result<Ports> {
    use anyhow::Context;
    use secrecy::ExposeSecret;

    let url = settings
        .storage
        .database_url
        .as_ref()
        .context("storage.database_url must be set (ENGAGEMENT_STORAGE__DATABASE_URL)")?;
    let store = Arc::new(PgStore::connect(url.expose_secret(), settings.storage.max_connections).await?);

    Ok(Ports {
        comments: store.clone(),
        reactions: store.clone(),
        notifications: store.clone(),
        statistics: store.clone(),
        users: store.clone(),
        posts: store,
    })
}

#[cfg(not(feature = "db-postgres"))]
async fn connect(_settings: &Settings) -> anyhow::Result<Ports> {
    tracing::warn!("built without db-postgres; reconciling an empty in-memory store");
    let store = InMemoryStore::new();
    let directory = Arc::clone(&store.directory);

    Ok(Ports {
        comments: store.comments,
        reactions: store.reactions,
        notifications: store.notifications,
        statistics: store.statistics,
        users: directory.clone(),
        posts: directory,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.telemetry);

    let ports = connect(&settings).await?;
    let core = EngagementCore::new(ports, settings.policy());

    let before = core.statistics.snapshot().await?;
    let after = core.reconcile_statistics().await?;
    info!(?before, ?after, "statistics reconciliation finished");

    println!("{}", serde_json::to_string_pretty(&after)?);
    Ok(())
}
