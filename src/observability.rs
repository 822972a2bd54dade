use std::net::SocketAddr;

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings created through checkout.
pub const BOOKINGS_CREATED_TOTAL: &str = "detailbook_bookings_created_total";

/// Counter: checkouts rejected. Labels: reason.
pub const CHECKOUTS_REJECTED_TOTAL: &str = "detailbook_checkouts_rejected_total";

/// Histogram: checkout latency in seconds.
pub const CHECKOUT_DURATION_SECONDS: &str = "detailbook_checkout_duration_seconds";

/// Counter: status changes. Labels: status.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "detailbook_booking_transitions_total";

// ── Read paths ──────────────────────────────────────────────────

/// Counter: availability queries served.
pub const SLOT_QUERIES_TOTAL: &str = "detailbook_slot_queries_total";

/// Histogram: slots returned per availability query.
pub const SLOTS_RETURNED: &str = "detailbook_slots_returned";

// ── Background work ─────────────────────────────────────────────

/// Counter: expired cart sessions removed by the reaper.
pub const CARTS_REAPED_TOTAL: &str = "detailbook_carts_reaped_total";

/// Counter: notification jobs enqueued. Labels: kind.
pub const JOBS_ENQUEUED_TOTAL: &str = "detailbook_jobs_enqueued_total";

/// Counter: notification jobs that failed to enqueue. Labels: kind.
pub const JOBS_FAILED_TOTAL: &str = "detailbook_jobs_failed_total";

/// Counter: payment sessions opened.
pub const PAYMENT_SESSIONS_TOTAL: &str = "detailbook_payment_sessions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
