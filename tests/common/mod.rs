//! Shared fixtures for the integration tests: a small, fast-tick `CoreConfig`
//! and a `CoreContext` wired over the in-memory repository.

use std::sync::Arc;

use chrono::Utc;
use hotel_ac_core::config::CoreConfig;
use hotel_ac_core::domain::{AccommodationOrder, Mode, Speed};
use hotel_ac_core::repository::InMemoryRepository;
use hotel_ac_core::CoreContext;

/// `max_concurrent=3, time_slice_seconds=60`, matching the capacity and
/// round-robin scenarios.
pub fn small_config() -> CoreConfig {
    let mut cfg = CoreConfig::default();
    cfg.scheduling.max_concurrent = 3;
    cfg.scheduling.time_slice_seconds = 60;
    cfg.throttle.change_temp_ms = 1000;
    cfg.temperature.auto_restart_threshold = 1.0;
    cfg.temperature.idle_drift_per_min = 0.5;
    cfg
}

pub async fn build_context(cfg: CoreConfig) -> Arc<CoreContext> {
    let repository = Arc::new(InMemoryRepository::new());
    CoreContext::new(cfg, repository).await
}

/// Checks a room in and powers it on at `speed`, returning the order.
pub async fn check_in_and_serve(
    context: &Arc<CoreContext>,
    room_id: &str,
    speed: Speed,
) -> AccommodationOrder {
    let order = context
        .checkin_service
        .check_in(room_id, "cust", "Guest", 1, Utc::now(), 0.0)
        .await
        .expect("check-in");
    context
        .ac_service
        .power_on(room_id, Mode::Cool, 20.0, speed)
        .await
        .expect("power-on");
    order
}

/// Drains any events the last operation published, by yielding long enough
/// for the bus's spawned consumer to run its handlers.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
