//! Explicit dependency wiring: TimerRegistry, then
//! BillingService (holding the registry), then Scheduler (holding both),
//! then the scheduler's event handlers are injected onto the bus, and
//! finally the billing fee callback is injected into the registry. No
//! struct in this graph holds a reference back to something constructed
//! after it.

use std::sync::Arc;

use crate::billing::BillingService;
use crate::config::CoreConfig;
use crate::events::EventBus;
use crate::repository::Repository;
use crate::scheduler::Scheduler;
use crate::services::{ACService, CheckInService, CheckOutService, MealService};
use crate::timer::TimeManager;

pub struct CoreContext {
    pub config: Arc<CoreConfig>,
    pub repository: Arc<dyn Repository>,
    pub event_bus: Arc<EventBus>,
    pub timers: Arc<TimeManager>,
    pub billing: Arc<BillingService>,
    pub scheduler: Arc<Scheduler>,
    pub ac_service: Arc<ACService>,
    pub checkin_service: Arc<CheckInService>,
    pub checkout_service: Arc<CheckOutService>,
    pub meal_service: Arc<MealService>,
}

impl CoreContext {
    /// Bounded event queue capacity, matching the timer registry's own
    /// tick-driven publication rate at `max_concurrent` rooms in play.
    const EVENT_BUS_CAPACITY: usize = 1024;

    pub async fn new(config: CoreConfig, repository: Arc<dyn Repository>) -> Arc<Self> {
        let config = Arc::new(config);
        let event_bus = EventBus::new(Self::EVENT_BUS_CAPACITY);
        event_bus.start();

        let timers = Arc::new(TimeManager::new(
            config.temperature.clone(),
            config.scheduling.clone(),
            config.throttle.clone(),
            Arc::clone(&event_bus),
            Arc::clone(&repository),
        ));
        timers
            .set_tick_interval(1.0 / config.clock.ratio.max(f64::MIN_POSITIVE))
            .expect("clock ratio must be positive");

        let billing = BillingService::new(
            config.billing.clone(),
            Arc::clone(&timers),
            Arc::clone(&repository),
        );
        timers.set_fee_callback(billing.as_fee_callback()).await;

        let scheduler = Scheduler::new(
            config.scheduling.clone(),
            Arc::clone(&repository),
            Arc::clone(&timers),
            Arc::clone(&billing),
        );
        scheduler.register_handlers(&event_bus).await;

        let ac_service = ACService::new(
            Arc::clone(&config),
            Arc::clone(&repository),
            Arc::clone(&scheduler),
            Arc::clone(&billing),
        );
        let checkin_service = CheckInService::new(
            Arc::clone(&config),
            Arc::clone(&repository),
            Arc::clone(&scheduler),
            Arc::clone(&billing),
            Arc::clone(&timers),
        );
        let checkout_service = CheckOutService::new(
            Arc::clone(&config),
            Arc::clone(&repository),
            Arc::clone(&billing),
            Arc::clone(&ac_service),
        );
        let meal_service = MealService::new(Arc::clone(&repository));

        Arc::new(CoreContext {
            config,
            repository,
            event_bus,
            timers,
            billing,
            scheduler,
            ac_service,
            checkin_service,
            checkout_service,
            meal_service,
        })
    }

    /// Advances the logical clock by one tick. Callers typically drive
    /// this from a `tokio::time::interval` scaled by `clock.ratio`.
    pub async fn tick(&self) {
        self.timers.tick().await;
    }
}
