//! Billing engine, grounded on
//! `original_source/backend/application/billing_service.py`. Owns DETAIL
//! record lifecycle and the per-tick fee function bound into the timer
//! registry as a [`FeeCallback`](crate::timer::FeeCallback).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::domain::{ACBill, ACDetailRecord, Speed};
use crate::errors::{CoreError, CoreResult};
use crate::logging::csv as audit;
use crate::repository::Repository;
use crate::timer::{FeeCallback, TimeManager};

pub struct BillingService {
    config: BillingConfig,
    timers: Arc<TimeManager>,
    repository: Arc<dyn Repository>,
}

impl BillingService {
    pub fn new(config: BillingConfig, timers: Arc<TimeManager>, repository: Arc<dyn Repository>) -> Arc<Self> {
        Arc::new(BillingService {
            config,
            timers,
            repository,
        })
    }

    pub fn rate_for_speed(&self, speed: Speed) -> f64 {
        self.config.rate_for(speed)
    }

    /// Produces the boxed closure `TimeManager` calls once per DETAIL tick.
    /// Bound in once at wiring time (`context::CoreContext::new`) — the
    /// registry never holds a `BillingService` reference directly.
    pub fn as_fee_callback(self: &Arc<Self>) -> FeeCallback {
        let this = Arc::clone(self);
        Arc::new(move |room_id: String, speed: Speed| -> BoxFuture<'static, f64> {
            let this = Arc::clone(&this);
            Box::pin(async move { this.tick_fee(room_id, speed).await })
        })
    }

    /// Opens a new DETAIL segment for `room_id` at `speed`: one DETAIL
    /// record per continuous speed segment.
    pub async fn start_new_detail_record(&self, room_id: &str, speed: Speed) -> CoreResult<ACDetailRecord> {
        let handle = self.timers.create_detail_timer(room_id, speed);
        let record = ACDetailRecord {
            record_id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            speed,
            started_at: Utc::now(),
            ended_at: None,
            logic_start_seconds: Some(self.timers.tick_counter() as i64),
            logic_end_seconds: None,
            rate_per_min: self.rate_for_speed(speed),
            fee_value: 0.0,
            timer_id: Some(handle.timer_id),
        };
        self.repository.add_detail_record(record.clone()).await?;
        Ok(record)
    }

    /// Closes the active DETAIL segment, if any. Idempotent: a room with
    /// no open segment returns `Ok(None)` rather than an error.
    pub async fn close_current_detail_record(&self, room_id: &str) -> CoreResult<Option<ACDetailRecord>> {
        let Some(mut record) = self.repository.get_active_detail_record(room_id).await? else {
            return Ok(None);
        };
        record.ended_at = Some(Utc::now());
        record.logic_end_seconds = Some(self.timers.tick_counter() as i64);
        if let Some(timer_id) = &record.timer_id {
            record.fee_value = self.timers.get_current_fee(timer_id);
            self.timers.cancel_timer(timer_id);
        }
        self.repository.update_detail_record(record.clone()).await?;
        Ok(Some(record))
    }

    /// The per-tick fee function: matches [`FeeCallback`]'s signature.
    /// Called once per active DETAIL timer per tick; returns the fee
    /// increment for this tick: `rate_per_min / 60 * price_per_unit`.
    pub async fn tick_fee(&self, room_id: String, speed: Speed) -> f64 {
        let increment = self.rate_for_speed(speed) / 60.0 * self.config.price_per_unit;
        if let Ok(Some(mut record)) = self.repository.get_active_detail_record(&room_id).await {
            record.fee_value += increment;
            audit::log_fee_accrual(
                &room_id,
                &record.record_id,
                speed.as_str(),
                increment,
                record.fee_value,
            )
            .await;
            if let Err(e) = self.repository.update_detail_record(record).await {
                tracing::warn!(error = %e, room_id, "failed to persist tick fee increment");
            }
        }
        increment
    }

    /// Aggregates every DETAIL record completed since `check_in_at` into a
    /// fresh `ACBill` scoped to the current stay — never spans two
    /// check-ins.
    pub async fn aggregate_records_to_bill(
        &self,
        room_id: &str,
        check_in_at: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> CoreResult<ACBill> {
        let records = self
            .repository
            .list_completed_detail_records(room_id, check_in_at)
            .await?;
        let mut bill = ACBill::new(Uuid::new_v4().to_string(), room_id, check_in_at, period_end);
        for record in records {
            bill.add_record(record);
        }
        self.repository.add_ac_bill(bill.clone()).await?;
        Ok(bill)
    }

    /// Elapsed seconds on the room's ACCOMMODATION timer, used by
    /// check-out to compute nights.
    pub async fn accommodation_elapsed_seconds(&self, room_id: &str) -> CoreResult<i64> {
        let order = self
            .repository
            .get_latest_accommodation_order(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no accommodation order for room {room_id}")))?;
        let timer_id = order
            .timer_id
            .ok_or_else(|| CoreError::internal("accommodation order missing timer_id"))?;
        Ok(self.timers.get_elapsed_seconds(&timer_id))
    }

    /// Raw elapsed-seconds lookup by timer id, for callers (check-out) that
    /// already hold a `timer_id` and don't want to re-fetch the order.
    pub fn timer_elapsed_seconds(&self, timer_id: &str) -> i64 {
        self.timers.get_elapsed_seconds(timer_id)
    }

    pub fn cancel_timer(&self, timer_id: &str) {
        self.timers.cancel_timer(timer_id);
    }
}
