//! Check-in workflow, grounded on
//! `original_source/backend/application/checkin_service.py`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::billing::BillingService;
use crate::config::CoreConfig;
use crate::domain::{AccommodationOrder, Room, RoomStatus};
use crate::errors::{CoreError, CoreResult};
use crate::repository::Repository;
use crate::scheduler::Scheduler;
use crate::timer::TimeManager;

pub struct CheckInService {
    config: Arc<CoreConfig>,
    repository: Arc<dyn Repository>,
    scheduler: Arc<Scheduler>,
    billing: Arc<BillingService>,
    timers: Arc<TimeManager>,
}

impl CheckInService {
    pub fn new(
        config: Arc<CoreConfig>,
        repository: Arc<dyn Repository>,
        scheduler: Arc<Scheduler>,
        billing: Arc<BillingService>,
        timers: Arc<TimeManager>,
    ) -> Arc<Self> {
        Arc::new(CheckInService {
            config,
            repository,
            scheduler,
            billing,
            timers,
        })
    }

    async fn get_or_create_room(&self, room_id: &str) -> CoreResult<Room> {
        if let Some(room) = self.repository.get_room(room_id).await? {
            return Ok(room);
        }
        let default_target = self.config.temperature.default_target;
        let room = Room::new(room_id, default_target, self.config.accommodation.rate_per_night);
        self.repository.save_room(room.clone()).await?;
        Ok(room)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn check_in(
        &self,
        room_id: &str,
        customer_id: &str,
        customer_name: &str,
        guest_count: u32,
        check_in_at: DateTime<Utc>,
        deposit: f64,
    ) -> CoreResult<AccommodationOrder> {
        if deposit < 0.0 {
            return Err(CoreError::invalid_argument(format!(
                "deposit {deposit} must not be negative"
            )));
        }

        let mut room = self.get_or_create_room(room_id).await?;
        if room.status == RoomStatus::Occupied {
            return Err(CoreError::precondition_failed(format!(
                "room {room_id} is already checked in"
            )));
        }

        self.scheduler.cancel_request(room_id).await?;
        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close detail record on check-in");
        }

        room.check_in();
        self.repository.save_room(room).await?;

        let handle = self.timers.create_accommodation_timer(room_id);
        let order = AccommodationOrder {
            order_id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            customer_id: customer_id.to_string(),
            customer_name: customer_name.to_string(),
            guest_count,
            nights: 1,
            deposit,
            check_in_at,
            timer_id: Some(handle.timer_id),
        };
        self.repository.add_accommodation_order(order.clone()).await?;
        Ok(order)
    }
}
