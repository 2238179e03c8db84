//! Room-side AC controls, grounded on
//! `original_source/backend/application/use_ac_service.py`.

use std::sync::Arc;

use chrono::Utc;

use crate::billing::BillingService;
use crate::config::CoreConfig;
use crate::domain::{Mode, Room, RoomStatus, Speed};
use crate::errors::{CoreError, CoreResult};
use crate::repository::Repository;
use crate::scheduler::Scheduler;

pub struct ACService {
    config: Arc<CoreConfig>,
    repository: Arc<dyn Repository>,
    scheduler: Arc<Scheduler>,
    billing: Arc<BillingService>,
}

impl ACService {
    pub fn new(
        config: Arc<CoreConfig>,
        repository: Arc<dyn Repository>,
        scheduler: Arc<Scheduler>,
        billing: Arc<BillingService>,
    ) -> Arc<Self> {
        Arc::new(ACService {
            config,
            repository,
            scheduler,
            billing,
        })
    }

    async fn ensure_room(&self, room_id: &str) -> CoreResult<Room> {
        if let Some(room) = self.repository.get_room(room_id).await? {
            return Ok(room);
        }
        let default_target = self.config.temperature.default_target;
        let room = Room::new(room_id, default_target, self.config.accommodation.rate_per_night);
        self.repository.save_room(room.clone()).await?;
        Ok(room)
    }

    fn require_checked_in(room: &Room) -> CoreResult<()> {
        if room.status != RoomStatus::Occupied {
            return Err(CoreError::precondition_failed(format!(
                "room {} is not checked in",
                room.room_id
            )));
        }
        Ok(())
    }

    pub async fn power_on(&self, room_id: &str, mode: Mode, target_temp: f64, speed: Speed) -> CoreResult<()> {
        let mut room = self.ensure_room(room_id).await?;
        Self::require_checked_in(&room)?;

        let range = self.config.temperature.range_for(mode);
        room.mode = mode;
        if let Some((min, max)) = range {
            if target_temp < min || target_temp > max {
                return Err(CoreError::invalid_argument(format!(
                    "target temperature {target_temp} outside range [{min}, {max}]"
                )));
            }
        }
        room.initial_temp = room.current_temp;
        room.speed = speed;
        room.target_temp = target_temp;
        room.is_serving = false;
        room.powered_on = true;
        room.manual_powered_off = false;
        self.repository.save_room(room).await?;

        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close stale detail record on power-on");
        }
        self.scheduler.on_new_request(room_id, speed).await
    }

    pub async fn change_temp(&self, room_id: &str, target_temp: f64) -> CoreResult<()> {
        let mut room = self.ensure_room(room_id).await?;
        Self::require_checked_in(&room)?;
        let throttle_ms = self.config.throttle.change_temp_ms;
        let range = self.config.temperature.range_for(room.mode);
        room.request_target_temp(target_temp, Utc::now(), throttle_ms, range)?;
        self.repository.save_room(room).await
    }

    pub async fn change_speed(&self, room_id: &str, speed: Speed) -> CoreResult<()> {
        let mut room = self.ensure_room(room_id).await?;
        Self::require_checked_in(&room)?;
        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close detail record on speed change");
        }
        room.speed = speed;
        self.repository.save_room(room).await?;
        self.scheduler.on_new_request(room_id, speed).await
    }

    pub async fn power_off(&self, room_id: &str) -> CoreResult<()> {
        let mut room = self.ensure_room(room_id).await?;
        Self::require_checked_in(&room)?;
        room.is_serving = false;
        room.powered_on = false;
        room.manual_powered_off = true;
        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close detail record on power-off");
        }
        self.repository.save_room(room).await?;
        self.scheduler.cancel_request(room_id).await
    }
}
