//! Check-out workflow, grounded on
//! `original_source/backend/application/checkout_service.py`. Nights are
//! computed from the ACCOMMODATION timer's elapsed seconds, rounded up to
//! the next full day (`(seconds + 86399) / 86400`), falling back to the
//! order's nominal `nights` field when no timer is available.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::billing::BillingService;
use crate::config::CoreConfig;
use crate::domain::{ACBill, AccommodationBill, MealOrder};
use crate::errors::{CoreError, CoreResult};
use crate::repository::Repository;
use crate::services::ac_service::ACService;

const SECONDS_PER_DAY: i64 = 86_400;

pub struct CheckOutSummary {
    pub room_id: String,
    pub accommodation_bill: AccommodationBill,
    pub ac_bill: Option<ACBill>,
    pub meal_orders: Vec<MealOrder>,
    pub total_due: f64,
}

pub struct CheckOutService {
    config: Arc<CoreConfig>,
    repository: Arc<dyn Repository>,
    billing: Arc<BillingService>,
    ac_service: Arc<ACService>,
}

impl CheckOutService {
    pub fn new(
        config: Arc<CoreConfig>,
        repository: Arc<dyn Repository>,
        billing: Arc<BillingService>,
        ac_service: Arc<ACService>,
    ) -> Arc<Self> {
        Arc::new(CheckOutService {
            config,
            repository,
            billing,
            ac_service,
        })
    }

    pub async fn check_out(&self, room_id: &str) -> CoreResult<CheckOutSummary> {
        let mut room = self
            .repository
            .get_room(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("room {room_id} not found")))?;

        self.ac_service.power_off(room_id).await?;

        let order = self
            .repository
            .get_latest_accommodation_order(room_id)
            .await?
            .ok_or_else(|| {
                CoreError::precondition_failed(format!("room {room_id} has no active accommodation order"))
            })?;

        let accommodation_seconds = match &order.timer_id {
            Some(timer_id) => {
                let seconds = self.billing.timer_elapsed_seconds(timer_id);
                self.billing.cancel_timer(timer_id);
                seconds
            }
            None => 0,
        };

        let actual_nights = if accommodation_seconds > 0 {
            ((accommodation_seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY).max(1) as u32
        } else {
            order.nights.max(1)
        };

        let rate = self.config.accommodation.rate_per_night;
        let room_fee = actual_nights as f64 * rate;

        let ac_bill = self
            .billing
            .aggregate_records_to_bill(room_id, order.check_in_at, Utc::now())
            .await?;
        let ac_fee = ac_bill.total_fee;

        let meal_orders = self
            .repository
            .list_meal_orders(room_id, order.check_in_at)
            .await?;
        let meal_fee: f64 = meal_orders.iter().map(|o| o.total_fee).sum();

        let accommodation_bill = AccommodationBill {
            bill_id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            total_fee: room_fee,
            nights: actual_nights,
            rate_per_night: rate,
            deposit: order.deposit,
            accommodation_seconds,
            created_at: Utc::now(),
        };
        self.repository
            .add_accommodation_bill(accommodation_bill.clone())
            .await?;

        let total_due = room_fee + ac_fee + meal_fee - order.deposit;

        room.check_out(self.config.temperature.default_target);
        self.repository.save_room(room).await?;

        Ok(CheckOutSummary {
            room_id: room_id.to_string(),
            accommodation_bill,
            ac_bill: Some(ac_bill),
            meal_orders,
            total_due,
        })
    }

    pub async fn get_room_bills(&self, room_id: &str) -> CoreResult<(Option<AccommodationBill>, Vec<ACBill>)> {
        let latest_accommodation_bill = self.repository.get_latest_accommodation_bill(room_id).await?;
        let ac_bills = self.repository.list_ac_bills(room_id).await?;
        Ok((latest_accommodation_bill, ac_bills))
    }
}
