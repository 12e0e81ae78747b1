use anyhow::Context;
use std::path::Path;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use chanradar::collab::cache::CachedClassifier;
use chanradar::collab::http::{HttpClassifier, HttpScanner};
use chanradar::config::Config;
use chanradar::crawler::Crawler;
use chanradar::db::SharedDatabase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chanradar=info".parse()?))
        .init();

    let mut config_path = String::from("config.toml");
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            other => config_path = other.to_string(),
        }
    }

    tracing::info!("chanradar starting...");
    let config = Config::load(&config_path);
    tracing::debug!("Config: {:?}", config);

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = SharedDatabase::open(db_path).context("failed to open channel database")?;
    tracing::info!("Channel database opened at {}", config.database.path);

    if let Some(seeds) = &config.crawler.seeds_file {
        let seeds = Path::new(seeds);
        if seeds.exists() {
            match db.seed_from_file(seeds) {
                Ok(count) => tracing::info!("Queued {count} new seed channels"),
                Err(e) => tracing::warn!("Failed to load seeds from {}: {e}", seeds.display()),
            }
        }
    }

    let stats = db.queue_stats()?;
    tracing::info!(
        "Queue: {} waiting, {} good, {} bad, {} private, {} error",
        stats.waiting, stats.good, stats.bad, stats.private, stats.error
    );

    let scanner = HttpScanner::new(&config.scanner).context("failed to build scanner client")?;
    let classifier = CachedClassifier::new(
        HttpClassifier::new(&config.classifier.service()).context("failed to build classifier client")?,
        config.classifier.cache_ttl(),
        config.classifier.cache_capacity,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, finishing current channel");
            stop_tx.send_replace(true);
        }
    });

    let crawler = Crawler::new(db.clone(), scanner, classifier, config.crawler.clone());
    let run = if once { crawler.drain(stop_rx).await } else { crawler.run(stop_rx).await };

    tracing::info!(
        "Done: {} processed, {} completed, {} requeued, {} deleted, {} conflicts, {} errors, {} discovered",
        run.processed, run.completed, run.requeued, run.deleted, run.conflicts, run.errors, run.discovered
    );
    Ok(())
}
