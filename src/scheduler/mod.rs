//! Preemptive priority scheduler with round-robin time-slicing, grounded
//! on `original_source/backend/application/scheduler.py`.
//!
//! Every public method acquires `lock` then delegates to a private
//! `*_locked` twin that assumes the lock is already held. Internal
//! composition (e.g. `preempt_locked` calling `assign_service_locked`)
//! always goes through the `_locked` twins, never back through the public
//! entry points — `tokio::sync::Mutex` is not reentrant.

pub mod victim;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::billing::BillingService;
use crate::config::SchedulingConfig;
use crate::domain::{Speed, ServiceObject, ServiceStatus};
use crate::errors::CoreResult;
use crate::events::{EventBus, EventType, SchedulerEvent};
use crate::logging::csv as audit;
use crate::repository::{Repository, WaitEntry};
use crate::timer::TimeManager;

use victim::{ServingSnapshot, WaitingSnapshot};

pub struct Scheduler {
    config: SchedulingConfig,
    repository: Arc<dyn Repository>,
    timers: Arc<TimeManager>,
    billing: Arc<BillingService>,
    lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        config: SchedulingConfig,
        repository: Arc<dyn Repository>,
        timers: Arc<TimeManager>,
        billing: Arc<BillingService>,
    ) -> Arc<Self> {
        Arc::new(Scheduler {
            config,
            repository,
            timers,
            billing,
            lock: Mutex::new(()),
        })
    }

    /// Registers this scheduler's reaction to the three timer-driven event
    /// types. Call once, after both scheduler and bus exist.
    pub async fn register_handlers(self: &Arc<Self>, bus: &Arc<EventBus>) {
        let h1 = Arc::clone(self);
        bus.register_handler(
            EventType::TimeSliceExpired,
            Arc::new(move |event: SchedulerEvent| {
                let h1 = Arc::clone(&h1);
                Box::pin(async move {
                    let speed = event.payload.speed.unwrap_or(Speed::Mid);
                    h1.on_time_slice_expired(event.room_id, speed).await
                })
            }),
        )
        .await;

        let h2 = Arc::clone(self);
        bus.register_handler(
            EventType::TemperatureReached,
            Arc::new(move |event: SchedulerEvent| {
                let h2 = Arc::clone(&h2);
                Box::pin(async move { h2.release_service(&event.room_id).await })
            }),
        )
        .await;

        let h3 = Arc::clone(self);
        bus.register_handler(
            EventType::AutoRestartNeeded,
            Arc::new(move |event: SchedulerEvent| {
                let h3 = Arc::clone(&h3);
                Box::pin(async move {
                    let speed = event.payload.speed.unwrap_or(Speed::Mid);
                    h3.on_new_request(&event.room_id, speed).await
                })
            }),
        )
        .await;
    }

    // ---------------- public entry points ----------------

    pub async fn on_new_request(&self, room_id: &str, speed: Speed) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        self.on_new_request_locked(room_id, speed).await
    }

    pub async fn release_service(&self, room_id: &str) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        self.release_service_locked(room_id).await
    }

    pub async fn cancel_request(&self, room_id: &str) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        self.cancel_request_locked(room_id).await
    }

    async fn on_time_slice_expired(&self, waiting_room_id: String, waiting_speed: Speed) -> CoreResult<()> {
        let _guard = self.lock.lock().await;
        self.handle_time_slice_expiry_locked(&waiting_room_id, waiting_speed)
            .await
    }

    // ---------------- locked core logic ----------------

    async fn on_new_request_locked(&self, room_id: &str, speed: Speed) -> CoreResult<()> {
        self.remove_existing_locked(room_id).await?;
        let service = ServiceObject::new(room_id, speed);

        let services = self.repository.list_service_objects().await?;
        if services.len() < self.config.max_concurrent {
            return self.assign_service_locked(service).await;
        }

        let snapshots = self.serving_snapshots(&services).await;
        if let Some(victim_snapshot) = victim::select_victim(&snapshots, speed) {
            let victim = self
                .repository
                .get_service_object(&victim_snapshot.room_id)
                .await?;
            if let Some(victim) = victim {
                return self.preempt_locked(victim, service).await;
            }
        }

        let highest_cmp = services
            .iter()
            .map(|s| victim::compare_speed(speed, s.speed))
            .max();
        let enforced = matches!(highest_cmp, Some(std::cmp::Ordering::Equal));
        self.enqueue_waiting_locked(service, enforced).await
    }

    async fn remove_existing_locked(&self, room_id: &str) -> CoreResult<()> {
        if self.repository.get_service_object(room_id).await?.is_some() {
            self.release_service_locked(room_id).await?;
        }
        self.remove_wait_entry_locked(room_id).await?;
        Ok(())
    }

    async fn assign_service_locked(&self, mut service: ServiceObject) -> CoreResult<()> {
        let handle = self.timers.create_service_timer(&service.room_id, service.speed);
        service.status = ServiceStatus::Serving;
        service.started_at = service.started_at.or(Some(Utc::now()));
        service.priority_token = 0;
        service.time_slice_enforced = false;
        service.timer_id = Some(handle.timer_id);

        self.repository.add_service_object(service.clone()).await?;

        if let Some(mut room) = self.repository.get_room(&service.room_id).await? {
            room.is_serving = true;
            room.speed = service.speed;
            self.repository.save_room(room).await?;
        }

        if let Err(e) = self
            .billing
            .start_new_detail_record(&service.room_id, service.speed)
            .await
        {
            tracing::warn!(error = %e, room_id = %service.room_id, "failed to open detail record");
        }
        audit::log_scheduler_event(
            "assign",
            &service.room_id,
            Some(service.speed.as_str()),
            service.timer_id.as_deref(),
        )
        .await;
        Ok(())
    }

    async fn release_service_locked(&self, room_id: &str) -> CoreResult<()> {
        let Some(service) = self.repository.get_service_object(room_id).await? else {
            return Ok(());
        };
        self.repository.remove_service_object(room_id).await?;
        if let Some(timer_id) = &service.timer_id {
            self.timers.cancel_timer(timer_id);
        }
        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close detail record");
        }
        if let Some(mut room) = self.repository.get_room(room_id).await? {
            room.is_serving = false;
            self.repository.save_room(room).await?;
        }
        audit::log_scheduler_event(
            "release",
            room_id,
            Some(service.speed.as_str()),
            service.timer_id.as_deref(),
        )
        .await;
        self.fill_capacity_if_possible_locked().await
    }

    async fn cancel_request_locked(&self, room_id: &str) -> CoreResult<()> {
        if self.repository.get_service_object(room_id).await?.is_some() {
            self.release_service_locked(room_id).await?;
        }
        self.remove_wait_entry_locked(room_id).await?;
        if let Err(e) = self.billing.close_current_detail_record(room_id).await {
            tracing::warn!(error = %e, room_id, "failed to close detail record on cancel");
        }
        if let Some(mut room) = self.repository.get_room(room_id).await? {
            room.is_serving = false;
            self.repository.save_room(room).await?;
        }
        Ok(())
    }

    async fn preempt_locked(&self, victim: ServiceObject, new_service: ServiceObject) -> CoreResult<()> {
        audit::log_scheduler_event(
            "preempt",
            &victim.room_id,
            Some(victim.speed.as_str()),
            victim.timer_id.as_deref(),
        )
        .await;
        self.repository.remove_service_object(&victim.room_id).await?;
        if let Some(timer_id) = &victim.timer_id {
            self.timers.cancel_timer(timer_id);
        }
        if let Err(e) = self.billing.close_current_detail_record(&victim.room_id).await {
            tracing::warn!(error = %e, room_id = %victim.room_id, "failed to close detail record on preempt");
        }
        self.enqueue_waiting_locked(victim, false).await?;
        self.boost_waiting_priority_locked(new_service.speed).await?;
        self.assign_service_locked(new_service).await
    }

    async fn enqueue_waiting_locked(&self, service: ServiceObject, time_slice_enforced: bool) -> CoreResult<()> {
        let handle = self.timers.create_wait_timer(
            &service.room_id,
            service.speed,
            self.config.time_slice_seconds,
            time_slice_enforced,
        );
        let entry = WaitEntry {
            room_id: service.room_id.clone(),
            speed: service.speed,
            priority_token: service.priority_token,
            timer_id: Some(handle.timer_id),
        };
        audit::log_scheduler_event(
            "enqueue",
            &service.room_id,
            Some(service.speed.as_str()),
            entry.timer_id.as_deref(),
        )
        .await;
        self.repository.add_wait_entry(entry).await?;
        if let Some(mut room) = self.repository.get_room(&service.room_id).await? {
            room.is_serving = false;
            self.repository.save_room(room).await?;
        }
        Ok(())
    }

    async fn remove_wait_entry_locked(&self, room_id: &str) -> CoreResult<()> {
        let entries = self.repository.list_wait_entries().await?;
        if let Some(entry) = entries.into_iter().find(|e| e.room_id == room_id) {
            if let Some(timer_id) = &entry.timer_id {
                self.timers.cancel_timer(timer_id);
            }
        }
        self.repository.remove_wait_entry(room_id).await
    }

    async fn fill_capacity_if_possible_locked(&self) -> CoreResult<()> {
        loop {
            let services = self.repository.list_service_objects().await?;
            if services.len() >= self.config.max_concurrent {
                return Ok(());
            }
            let entries = self.repository.list_wait_entries().await?;
            if entries.is_empty() {
                return Ok(());
            }
            let snapshots = self.waiting_snapshots(&entries);
            let Some(chosen) = victim::pick_highest_priority_waiting(&snapshots) else {
                return Ok(());
            };
            let chosen_room_id = chosen.room_id.clone();
            let chosen_speed = chosen.speed;
            self.remove_wait_entry_locked(&chosen_room_id).await?;
            self.assign_service_locked(ServiceObject::new(chosen_room_id, chosen_speed))
                .await?;
        }
    }

    async fn boost_waiting_priority_locked(&self, new_speed: Speed) -> CoreResult<()> {
        let entries = self.repository.list_wait_entries().await?;
        for mut entry in entries {
            if entry.speed == new_speed {
                entry.priority_token += 1;
                self.repository.add_wait_entry(entry).await?;
            }
        }
        Ok(())
    }

    async fn handle_time_slice_expiry_locked(&self, waiting_room_id: &str, waiting_speed: Speed) -> CoreResult<()> {
        let services = self.repository.list_service_objects().await?;
        let snapshots = self.serving_snapshots(&services).await;
        let Some(victim_snapshot) = victim::longest_served(&snapshots) else {
            return Ok(());
        };
        let victim_room_id = victim_snapshot.room_id.clone();
        let Some(victim) = self.repository.get_service_object(&victim_room_id).await? else {
            return Ok(());
        };

        self.repository.remove_service_object(&victim_room_id).await?;
        if let Some(timer_id) = &victim.timer_id {
            self.timers.cancel_timer(timer_id);
        }
        if let Err(e) = self.billing.close_current_detail_record(&victim_room_id).await {
            tracing::warn!(error = %e, room_id = %victim_room_id, "failed to close detail record on time-slice expiry");
        }
        audit::log_scheduler_event("time_slice_expiry", &victim_room_id, Some(victim.speed.as_str()), None).await;
        self.enqueue_waiting_locked(victim, true).await?;

        self.remove_wait_entry_locked(waiting_room_id).await?;
        self.assign_service_locked(ServiceObject::new(waiting_room_id, waiting_speed))
            .await
    }

    async fn serving_snapshots(&self, services: &[ServiceObject]) -> Vec<ServingSnapshot> {
        services
            .iter()
            .map(|s| ServingSnapshot {
                room_id: s.room_id.clone(),
                speed: s.speed,
                served_seconds: s
                    .timer_id
                    .as_deref()
                    .map(|id| self.timers.get_elapsed_seconds(id))
                    .unwrap_or(0),
            })
            .collect()
    }

    fn waiting_snapshots(&self, entries: &[WaitEntry]) -> Vec<WaitingSnapshot> {
        entries
            .iter()
            .map(|e| WaitingSnapshot {
                room_id: e.room_id.clone(),
                speed: e.speed,
                priority_token: e.priority_token,
                total_waited_seconds: e
                    .timer_id
                    .as_deref()
                    .map(|id| self.timers.get_elapsed_seconds(id))
                    .unwrap_or(0),
            })
            .collect()
    }
}
