use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;

/// One sweep: drop every expired cart session. Returns how many went.
pub async fn reap_once(engine: &Engine) -> usize {
    match engine.purge_expired_carts().await {
        Ok(0) => {
            debug!("reaper: no expired carts");
            0
        }
        Ok(n) => {
            metrics::counter!(crate::observability::CARTS_REAPED_TOTAL).increment(n as u64);
            info!("reaped {n} expired cart sessions");
            n
        }
        Err(e) => {
            // Next tick retries.
            warn!("cart reaper failed: {e}");
            0
        }
    }
}

/// Background task that periodically purges expired cart sessions.
pub async fn run_cart_reaper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        reap_once(&engine).await;
    }
}
