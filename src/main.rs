use anyhow::Result;
use chrono::Utc;
use hotel_ac_core::config::Cli;
use hotel_ac_core::domain::{MealItem, Mode, Speed};
use hotel_ac_core::logging;
use hotel_ac_core::repository::InMemoryRepository;
use hotel_ac_core::CoreContext;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let (cli, mut cfg) = Cli::parse_and_build_config()?;
    cfg.clock.ratio = 1.0 / cli.tick_interval_secs.max(f64::MIN_POSITIVE);
    info!(?cfg, "hotel AC control core starting");

    let repository = Arc::new(InMemoryRepository::new());
    let context = CoreContext::new(cfg, repository).await;

    let tick_interval = context.timers.tick_interval_duration();
    let ticker_ctx = Arc::clone(&context);
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            ticker_ctx.tick().await;
        }
    });

    demo_stay(&context).await;

    info!(interval_secs = ?cli.tick_interval_secs, "control core running, press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(?e, "failed to install Ctrl+C handler");
    }
    ticker.abort();
    info!("shutdown signal received; exiting.");
    Ok(())
}

/// Walks one room through check-in, a couple of AC requests, a meal order,
/// and check-out, purely so a fresh checkout of this binary shows something
/// happening in the logs.
async fn demo_stay(context: &Arc<CoreContext>) {
    let room_id = "101";

    if let Err(e) = context
        .checkin_service
        .check_in(room_id, "guest-1", "Demo Guest", 2, Utc::now(), 100.0)
        .await
    {
        warn!(?e, "demo check-in failed");
        return;
    }

    if let Err(e) = context
        .ac_service
        .power_on(room_id, Mode::Cool, 22.0, Speed::Mid)
        .await
    {
        warn!(?e, "demo power-on failed");
    }

    if let Err(e) = context
        .meal_service
        .place_order(
            room_id,
            vec![MealItem {
                name: "breakfast set".into(),
                unit_price: 18.0,
                quantity: 2,
            }],
        )
        .await
    {
        warn!(?e, "demo meal order failed");
    }

    info!(room_id, "demo stay underway; check out with the checkout service when ready");
}
