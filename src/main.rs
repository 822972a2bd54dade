use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use detailbook::auth::StaticAdmins;
use detailbook::config::EngineConfig;
use detailbook::engine::Engine;
use detailbook::notify::JobHub;
use detailbook::payment::DisabledGateway;
use detailbook::store::{InMemoryStore, Repositories};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("DETAILBOOK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    detailbook::observability::init(metrics_port)?;

    let reaper_secs: u64 = std::env::var("DETAILBOOK_REAPER_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&s| s > 0)
        .unwrap_or(300);
    // Comma-separated user ids.
    let admins: Vec<i64> = std::env::var("DETAILBOOK_ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let config = EngineConfig::from_env();
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(Engine::new(
        Repositories::in_memory(store),
        Arc::new(StaticAdmins::new(admins.iter().copied())),
        Arc::new(JobHub::new()),
        Arc::new(DisabledGateway),
        config.clone(),
    ));

    info!("detailbook engine ready");
    info!("  deposit: {}%", config.deposit_percent);
    info!("  slot stride: {} min", config.slot_stride_minutes);
    info!("  min notice: {} h", config.min_notice_hours);
    info!("  admins: {}", admins.len());
    info!("  cart reaper: every {reaper_secs}s");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let reaper = tokio::spawn(detailbook::reaper::run_cart_reaper(
        engine.clone(),
        Duration::from_secs(reaper_secs),
    ));

    // Run until SIGTERM/ctrl-c.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    reaper.abort();
    info!("detailbook stopped");
    Ok(())
}
