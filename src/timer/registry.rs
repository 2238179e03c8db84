//! The logical clock / timer registry, grounded on
//! `original_source/backend/application/time_manager.py`. Owns all
//! per-room timers, drives temperature evolution each tick, and publishes
//! the three scheduler-facing event types.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock as AsyncRwLock};
use uuid::Uuid;

use crate::config::{SchedulingConfig, TemperatureConfig, ThrottleConfig};
use crate::domain::Speed;
use crate::events::{EventBus, EventPayload, EventType, SchedulerEvent};
use crate::logging::csv as audit;
use crate::repository::Repository;

use super::handle::{TimerHandle, TimerType};

#[derive(Debug, Clone)]
pub struct TimerState {
    pub timer_id: String,
    pub timer_type: TimerType,
    pub room_id: String,
    pub speed: Option<Speed>,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    pub current_fee: f64,
    pub time_slice_enforced: bool,
    pub active: bool,
}

/// `room_id, speed -> fee increment`. Bound once at startup by
/// `context::CoreContext::new` to `BillingService::tick_fee`, breaking the
/// TimerRegistry ↔ BillingService cycle the source had via post-hoc
/// setters: the callback is a value, not a back-reference.
pub type FeeCallback = Arc<dyn Fn(String, Speed) -> BoxFuture<'static, f64> + Send + Sync>;

#[derive(Debug, Default)]
pub struct TickErrorCounters {
    pub timers: AtomicU64,
    pub temperature: AtomicU64,
    pub throttle: AtomicU64,
    pub auto_restart: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct TickErrorSnapshot {
    pub timers: u64,
    pub temperature: u64,
    pub throttle: u64,
    pub auto_restart: u64,
}

#[derive(Debug, Clone)]
pub struct TimerStats {
    pub total_timers: usize,
    pub by_type: HashMap<TimerType, usize>,
    pub tick_interval_secs: f64,
    pub tick_counter: u64,
    pub pending_events: usize,
    pub errors: TickErrorSnapshot,
}

#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    pub timer_id: String,
    pub timer_type: TimerType,
    pub room_id: String,
    pub speed: Option<Speed>,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    pub current_fee: f64,
    pub active: bool,
}

struct PostTickSlot {
    callback: Box<dyn FnOnce() + Send>,
    done: Arc<Notify>,
}

struct ChainedWait {
    remaining: u64,
    started_tick: u64,
    done: Arc<Notify>,
}

pub struct TimeManager {
    temperature_cfg: RwLock<TemperatureConfig>,
    scheduling_cfg: RwLock<SchedulingConfig>,
    throttle_cfg: RwLock<ThrottleConfig>,
    tick_interval_secs: RwLock<f64>,

    timers: DashMap<String, TimerState>,
    room_index: DashMap<String, HashMap<TimerType, String>>,

    event_bus: Arc<EventBus>,
    repository: Arc<dyn Repository>,
    fee_callback: AsyncRwLock<Option<FeeCallback>>,

    tick_counter: AtomicU64,
    tick_notify: Notify,
    post_tick: AsyncMutex<Option<PostTickSlot>>,
    chained_wait: AsyncMutex<Option<ChainedWait>>,

    errors: TickErrorCounters,
}

impl TimeManager {
    pub fn new(
        temperature_cfg: TemperatureConfig,
        scheduling_cfg: SchedulingConfig,
        throttle_cfg: ThrottleConfig,
        event_bus: Arc<EventBus>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        TimeManager {
            temperature_cfg: RwLock::new(temperature_cfg),
            scheduling_cfg: RwLock::new(scheduling_cfg),
            throttle_cfg: RwLock::new(throttle_cfg),
            tick_interval_secs: RwLock::new(1.0),
            timers: DashMap::new(),
            room_index: DashMap::new(),
            event_bus,
            repository,
            fee_callback: AsyncRwLock::new(None),
            tick_counter: AtomicU64::new(0),
            tick_notify: Notify::new(),
            post_tick: AsyncMutex::new(None),
            chained_wait: AsyncMutex::new(None),
            errors: TickErrorCounters::default(),
        }
    }

    pub async fn set_fee_callback(&self, callback: FeeCallback) {
        *self.fee_callback.write().await = Some(callback);
    }

    // ---------------- tick interval control ----------------

    pub fn set_tick_interval(&self, seconds: f64) -> Result<(), crate::errors::CoreError> {
        if seconds <= 0.0 {
            return Err(crate::errors::CoreError::invalid_argument(
                "tick_interval must be positive",
            ));
        }
        *self.tick_interval_secs.write().unwrap() = seconds;
        Ok(())
    }

    pub fn tick_interval(&self) -> f64 {
        *self.tick_interval_secs.read().unwrap()
    }

    pub fn tick_interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval())
    }

    // ---------------- timer creation ----------------

    fn remove_timer_by_room(&self, room_id: &str, timer_type: TimerType) {
        if let Some(mut index) = self.room_index.get_mut(room_id) {
            if let Some(timer_id) = index.remove(&timer_type) {
                self.timers.remove(&timer_id);
            }
        }
    }

    fn set_room_timer(&self, room_id: &str, timer_type: TimerType, timer_id: String) {
        self.room_index
            .entry(room_id.to_string())
            .or_default()
            .insert(timer_type, timer_id);
    }

    /// Fire-and-forget audit line; every call site already runs inside a
    /// tokio task, so spawning keeps timer creation/cancellation sync.
    fn audit_timer_event(&self, event: &'static str, timer_id: String, timer_type: TimerType, room_id: String) {
        tokio::spawn(async move {
            audit::log_timer_event(event, &timer_id, timer_type.as_str(), &room_id).await;
        });
    }

    pub fn create_service_timer(&self, room_id: &str, speed: Speed) -> TimerHandle {
        self.remove_timer_by_room(room_id, TimerType::Service);
        let timer_id = Uuid::new_v4().to_string();
        self.timers.insert(
            timer_id.clone(),
            TimerState {
                timer_id: timer_id.clone(),
                timer_type: TimerType::Service,
                room_id: room_id.to_string(),
                speed: Some(speed),
                elapsed_seconds: 0,
                remaining_seconds: 0,
                current_fee: 0.0,
                time_slice_enforced: false,
                active: true,
            },
        );
        self.set_room_timer(room_id, TimerType::Service, timer_id.clone());
        self.audit_timer_event("create", timer_id.clone(), TimerType::Service, room_id.to_string());
        TimerHandle {
            timer_id,
            timer_type: TimerType::Service,
            room_id: room_id.to_string(),
        }
    }

    pub fn create_wait_timer(
        &self,
        room_id: &str,
        speed: Speed,
        wait_seconds: i64,
        time_slice_enforced: bool,
    ) -> TimerHandle {
        self.remove_timer_by_room(room_id, TimerType::Wait);
        let timer_id = Uuid::new_v4().to_string();
        self.timers.insert(
            timer_id.clone(),
            TimerState {
                timer_id: timer_id.clone(),
                timer_type: TimerType::Wait,
                room_id: room_id.to_string(),
                speed: Some(speed),
                elapsed_seconds: 0,
                remaining_seconds: wait_seconds,
                current_fee: 0.0,
                time_slice_enforced,
                active: true,
            },
        );
        self.set_room_timer(room_id, TimerType::Wait, timer_id.clone());
        self.audit_timer_event("create", timer_id.clone(), TimerType::Wait, room_id.to_string());
        TimerHandle {
            timer_id,
            timer_type: TimerType::Wait,
            room_id: room_id.to_string(),
        }
    }

    /// DETAIL timers are allowed to churn as segments open/close — no
    /// removal of a prior one first.
    pub fn create_detail_timer(&self, room_id: &str, speed: Speed) -> TimerHandle {
        let timer_id = Uuid::new_v4().to_string();
        self.timers.insert(
            timer_id.clone(),
            TimerState {
                timer_id: timer_id.clone(),
                timer_type: TimerType::Detail,
                room_id: room_id.to_string(),
                speed: Some(speed),
                elapsed_seconds: 0,
                remaining_seconds: 0,
                current_fee: 0.0,
                time_slice_enforced: false,
                active: true,
            },
        );
        self.set_room_timer(room_id, TimerType::Detail, timer_id.clone());
        self.audit_timer_event("create", timer_id.clone(), TimerType::Detail, room_id.to_string());
        TimerHandle {
            timer_id,
            timer_type: TimerType::Detail,
            room_id: room_id.to_string(),
        }
    }

    pub fn create_accommodation_timer(&self, room_id: &str) -> TimerHandle {
        self.remove_timer_by_room(room_id, TimerType::Accommodation);
        let timer_id = Uuid::new_v4().to_string();
        self.timers.insert(
            timer_id.clone(),
            TimerState {
                timer_id: timer_id.clone(),
                timer_type: TimerType::Accommodation,
                room_id: room_id.to_string(),
                speed: None,
                elapsed_seconds: 0,
                remaining_seconds: 0,
                current_fee: 0.0,
                time_slice_enforced: false,
                active: true,
            },
        );
        self.set_room_timer(room_id, TimerType::Accommodation, timer_id.clone());
        self.audit_timer_event("create", timer_id.clone(), TimerType::Accommodation, room_id.to_string());
        TimerHandle {
            timer_id,
            timer_type: TimerType::Accommodation,
            room_id: room_id.to_string(),
        }
    }

    /// Reattach a timer to existing scaffolding after a process restart,
    /// from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore_timer(
        &self,
        timer_id: String,
        timer_type: TimerType,
        room_id: String,
        speed: Option<Speed>,
        elapsed_seconds: i64,
        remaining_seconds: i64,
        current_fee: f64,
        time_slice_enforced: bool,
    ) -> TimerHandle {
        self.timers.insert(
            timer_id.clone(),
            TimerState {
                timer_id: timer_id.clone(),
                timer_type,
                room_id: room_id.clone(),
                speed,
                elapsed_seconds,
                remaining_seconds,
                current_fee,
                time_slice_enforced,
                active: true,
            },
        );
        self.set_room_timer(&room_id, timer_type, timer_id.clone());
        TimerHandle {
            timer_id,
            timer_type,
            room_id,
        }
    }

    // ---------------- queries ----------------

    pub fn has_timer(&self, timer_id: &str) -> bool {
        self.timers.get(timer_id).map(|t| t.active).unwrap_or(false)
    }

    pub fn get_elapsed_seconds(&self, timer_id: &str) -> i64 {
        self.timers.get(timer_id).map(|t| t.elapsed_seconds).unwrap_or(0)
    }

    pub fn get_remaining_seconds(&self, timer_id: &str) -> i64 {
        self.timers
            .get(timer_id)
            .map(|t| t.remaining_seconds)
            .unwrap_or(0)
    }

    pub fn get_current_fee(&self, timer_id: &str) -> f64 {
        self.timers.get(timer_id).map(|t| t.current_fee).unwrap_or(0.0)
    }

    pub fn get_timer_speed(&self, timer_id: &str) -> Option<Speed> {
        self.timers.get(timer_id).and_then(|t| t.speed)
    }

    pub fn get_timer_state(&self, timer_id: &str) -> Option<TimerState> {
        self.timers.get(timer_id).map(|t| t.clone())
    }

    pub fn cancel_timer(&self, timer_id: &str) {
        if let Some((_, state)) = self.timers.remove(timer_id) {
            if let Some(mut index) = self.room_index.get_mut(&state.room_id) {
                index.remove(&state.timer_type);
            }
            self.audit_timer_event("cancel", state.timer_id, state.timer_type, state.room_id);
        }
    }

    // ---------------- debug / introspection ----------------

    pub fn timer_stats(&self) -> TimerStats {
        let mut by_type: HashMap<TimerType, usize> = HashMap::new();
        for entry in self.timers.iter() {
            *by_type.entry(entry.timer_type).or_insert(0) += 1;
        }
        TimerStats {
            total_timers: self.timers.len(),
            by_type,
            tick_interval_secs: self.tick_interval(),
            tick_counter: self.tick_counter.load(Ordering::SeqCst),
            pending_events: self.event_bus.pending_count(),
            errors: TickErrorSnapshot {
                timers: self.errors.timers.load(Ordering::Relaxed),
                temperature: self.errors.temperature.load(Ordering::Relaxed),
                throttle: self.errors.throttle.load(Ordering::Relaxed),
                auto_restart: self.errors.auto_restart.load(Ordering::Relaxed),
            },
        }
    }

    pub fn list_timers(&self) -> Vec<TimerSnapshot> {
        self.timers
            .iter()
            .map(|e| TimerSnapshot {
                timer_id: e.timer_id.clone(),
                timer_type: e.timer_type,
                room_id: e.room_id.clone(),
                speed: e.speed,
                elapsed_seconds: e.elapsed_seconds,
                remaining_seconds: e.remaining_seconds,
                current_fee: e.current_fee,
                active: e.active,
            })
            .collect()
    }

    // ---------------- tick synchronization ----------------

    pub fn tick_counter(&self) -> u64 {
        self.tick_counter.load(Ordering::SeqCst)
    }

    pub async fn wait_for_next_tick(&self, timeout: Duration) -> bool {
        let start = self.tick_counter.load(Ordering::SeqCst);
        let notified = self.tick_notify.notified();
        if self.tick_counter.load(Ordering::SeqCst) > start {
            return true;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
        self.tick_counter.load(Ordering::SeqCst) > start
    }

    pub async fn wait_for_ticks(&self, count: u64, timeout: Duration) -> bool {
        if count == 0 {
            return true;
        }
        let per_tick = Duration::from_secs_f64(
            (timeout.as_secs_f64() / count as f64 * 3.0).max(10.0),
        );
        for _ in 0..count {
            if !self.wait_for_next_tick(per_tick).await {
                return false;
            }
        }
        true
    }

    /// Runs `callback` on the tick thread immediately after the next tick
    /// completes, blocking the following tick until it returns.
    pub async fn wait_for_ticks_with_callback<F>(
        &self,
        count: u64,
        callback: F,
        timeout: Duration,
    ) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if count > 1 && !self.wait_for_ticks(count - 1, timeout.mul_f64(0.9)).await {
            return false;
        }
        let done = Arc::new(Notify::new());
        {
            let mut slot = self.post_tick.lock().await;
            *slot = Some(PostTickSlot {
                callback: Box::new(callback),
                done: done.clone(),
            });
        }
        let last_timeout = timeout.mul_f64(0.1).max(Duration::from_secs(5));
        if !self.wait_for_next_tick(last_timeout).await {
            *self.post_tick.lock().await = None;
            return false;
        }
        tokio::time::timeout(last_timeout, done.notified())
            .await
            .is_ok()
    }

    /// Registers a wait for `count` further ticks, to be resolved by a
    /// later call to `wait_for_chained_ticks`. Must be called from within a
    /// tick callback: the tick that registers it is skipped, counting
    /// starts at the next one.
    pub async fn start_chained_wait(&self, count: u64) {
        if count == 0 {
            return;
        }
        let started_tick = self.tick_counter.load(Ordering::SeqCst);
        *self.chained_wait.lock().await = Some(ChainedWait {
            remaining: count,
            started_tick,
            done: Arc::new(Notify::new()),
        });
    }

    pub async fn wait_for_chained_ticks(&self, timeout: Duration) -> bool {
        let done = {
            let guard = self.chained_wait.lock().await;
            match guard.as_ref() {
                Some(w) if w.remaining > 0 => w.done.clone(),
                _ => return false,
            }
        };
        let ok = tokio::time::timeout(timeout, done.notified()).await.is_ok();
        *self.chained_wait.lock().await = None;
        ok
    }

    // ---------------- tick ----------------

    /// Advances one logical second: timers, temperature, throttle,
    /// auto-restart, in that order, then notifies waiters. Each stage is
    /// isolated so a failure in one doesn't stop the others; failures
    /// increment a per-stage counter.
    pub async fn tick(&self) {
        self.tick_timers_stage().await;
        self.tick_temperature_stage().await;
        self.tick_throttle_stage().await;
        self.tick_auto_restart_stage().await;

        let n = self.tick_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.tick_notify.notify_waiters();

        self.run_post_tick().await;
        self.advance_chained_wait(n).await;
    }

    async fn run_post_tick(&self) {
        let slot = self.post_tick.lock().await.take();
        if let Some(slot) = slot {
            (slot.callback)();
            slot.done.notify_waiters();
        }
    }

    async fn advance_chained_wait(&self, current_tick: u64) {
        let mut guard = self.chained_wait.lock().await;
        let Some(wait) = guard.as_mut() else {
            return;
        };
        if current_tick <= wait.started_tick {
            return;
        }
        wait.remaining = wait.remaining.saturating_sub(1);
        if wait.remaining == 0 {
            wait.done.notify_waiters();
            *guard = None;
        }
    }

    fn active_service_rooms(&self) -> HashSet<String> {
        self.timers
            .iter()
            .filter(|e| e.timer_type == TimerType::Service && e.active)
            .map(|e| e.room_id.clone())
            .collect()
    }

    fn active_wait_rooms(&self) -> HashSet<String> {
        self.timers
            .iter()
            .filter(|e| e.timer_type == TimerType::Wait && e.active)
            .map(|e| e.room_id.clone())
            .collect()
    }

    fn service_speeds(&self) -> HashSet<Speed> {
        self.timers
            .iter()
            .filter(|e| e.timer_type == TimerType::Service && e.active)
            .filter_map(|e| e.speed)
            .collect()
    }

    async fn tick_timers_stage(&self) {
        self.tick_service_timers();
        self.tick_wait_timers();
        self.tick_detail_timers().await;
        self.tick_accommodation_timers();
    }

    fn tick_service_timers(&self) {
        for mut entry in self.timers.iter_mut() {
            if entry.timer_type == TimerType::Service && entry.active {
                entry.elapsed_seconds += 1;
            }
        }
    }

    fn tick_wait_timers(&self) {
        let service_speeds = self.service_speeds();
        let time_slice_seconds = self.scheduling_cfg.read().unwrap().time_slice_seconds;
        let mut expired: Vec<(String, Speed, String)> = Vec::new();

        for mut entry in self.timers.iter_mut() {
            if entry.timer_type != TimerType::Wait || !entry.active {
                continue;
            }
            entry.elapsed_seconds += 1;
            if !entry.time_slice_enforced
                && entry.speed.map(|s| service_speeds.contains(&s)).unwrap_or(false)
            {
                entry.time_slice_enforced = true;
                entry.remaining_seconds = time_slice_seconds;
            } else if entry.remaining_seconds > 0 {
                entry.remaining_seconds -= 1;
            }
            if entry.remaining_seconds == 0 && entry.time_slice_enforced {
                if let Some(speed) = entry.speed {
                    expired.push((entry.room_id.clone(), speed, entry.timer_id.clone()));
                }
            }
        }

        for (room_id, speed, timer_id) in expired {
            self.event_bus.publish(SchedulerEvent {
                event_id: Uuid::new_v4(),
                event_type: EventType::TimeSliceExpired,
                room_id,
                payload: EventPayload {
                    speed: Some(speed),
                    timer_id: Some(timer_id),
                },
            });
        }
    }

    async fn tick_detail_timers(&self) {
        let detail_ids: Vec<String> = self
            .timers
            .iter()
            .filter(|e| e.timer_type == TimerType::Detail && e.active)
            .map(|e| e.key().clone())
            .collect();

        for timer_id in detail_ids {
            let target = {
                let mut entry = match self.timers.get_mut(&timer_id) {
                    Some(e) => e,
                    None => continue,
                };
                entry.elapsed_seconds += 1;
                entry.speed.map(|speed| (entry.room_id.clone(), speed))
            };
            let Some((room_id, speed)) = target else {
                continue;
            };
            let callback = self.fee_callback.read().await.clone();
            let Some(callback) = callback else { continue };
            let increment = callback(room_id.clone(), speed).await;

            if let Some(mut entry) = self.timers.get_mut(&timer_id) {
                entry.current_fee += increment;
            }
            let service_timer_id = self
                .room_index
                .get(&room_id)
                .and_then(|idx| idx.get(&TimerType::Service).cloned());
            if let Some(service_timer_id) = service_timer_id {
                if let Some(mut svc) = self.timers.get_mut(&service_timer_id) {
                    if svc.active {
                        svc.current_fee += increment;
                    }
                }
            }
        }
    }

    fn tick_accommodation_timers(&self) {
        for mut entry in self.timers.iter_mut() {
            if entry.timer_type == TimerType::Accommodation && entry.active {
                entry.elapsed_seconds += 1;
            }
        }
    }

    async fn tick_temperature_stage(&self) {
        let active_rooms = self.active_service_rooms();
        let temp_cfg = self.temperature_cfg.read().unwrap().clone();
        let rooms = match self.repository.list_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "temperature tick: failed to list rooms");
                self.errors.temperature.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        for mut room in rooms {
            let serving = active_rooms.contains(&room.room_id);
            let reached = room.tick_temperature(&temp_cfg, serving);
            let room_id = room.room_id.clone();
            if let Err(e) = self.repository.save_room(room).await {
                tracing::warn!(error = %e, room_id, "temperature tick: failed to save room");
                self.errors.temperature.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if reached && serving {
                self.event_bus.publish(SchedulerEvent {
                    event_id: Uuid::new_v4(),
                    event_type: EventType::TemperatureReached,
                    room_id,
                    payload: EventPayload::default(),
                });
            }
        }
    }

    async fn tick_throttle_stage(&self) {
        let throttle_ms = self.throttle_cfg.read().unwrap().change_temp_ms;
        let now = Utc::now();
        let rooms = match self.repository.list_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "throttle tick: failed to list rooms");
                self.errors.throttle.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        for mut room in rooms {
            room.apply_pending_target(now, throttle_ms);
            let room_id = room.room_id.clone();
            if let Err(e) = self.repository.save_room(room).await {
                tracing::warn!(error = %e, room_id, "throttle tick: failed to save room");
                self.errors.throttle.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn tick_auto_restart_stage(&self) {
        let active_rooms = self.active_service_rooms();
        let waiting_rooms = self.active_wait_rooms();
        let threshold = self.temperature_cfg.read().unwrap().auto_restart_threshold;
        let rooms = match self.repository.list_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "auto-restart tick: failed to list rooms");
                self.errors.auto_restart.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        for room in rooms {
            if room.status == crate::domain::RoomStatus::Vacant {
                continue;
            }
            if active_rooms.contains(&room.room_id) || waiting_rooms.contains(&room.room_id) {
                continue;
            }
            if room.needs_auto_restart(threshold) {
                self.event_bus.publish(SchedulerEvent {
                    event_id: Uuid::new_v4(),
                    event_type: EventType::AutoRestartNeeded,
                    room_id: room.room_id.clone(),
                    payload: EventPayload {
                        speed: Some(room.speed),
                        timer_id: None,
                    },
                });
            }
        }
    }
}
