//! Structured logging (`tracing`) plus a CSV audit trail for the three
//! domains that matter for after-the-fact billing disputes: scheduler
//! decisions, billing fee accruals, and timer lifecycle events.

pub mod csv;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Call once at process start.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hotel_ac_core=info".parse().unwrap())
                .add_directive("tokio=warn".parse().unwrap()),
        )
        .compact()
        .init();
}
