//! Meal ordering: an "if supported" feature this crate completes in full;
//! no `original_source` file backs it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{MealItem, MealOrder, RoomStatus};
use crate::errors::{CoreError, CoreResult};
use crate::repository::Repository;

pub struct MealService {
    repository: Arc<dyn Repository>,
}

impl MealService {
    pub fn new(repository: Arc<dyn Repository>) -> Arc<Self> {
        Arc::new(MealService { repository })
    }

    pub async fn place_order(&self, room_id: &str, items: Vec<MealItem>) -> CoreResult<MealOrder> {
        let room = self
            .repository
            .get_room(room_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("room {room_id} not found")))?;
        if room.status != RoomStatus::Occupied {
            return Err(CoreError::precondition_failed(format!(
                "room {room_id} is not checked in"
            )));
        }
        if items.is_empty() {
            return Err(CoreError::invalid_argument("meal order must contain at least one item"));
        }
        let total_fee = items.iter().map(|i| i.unit_price * i.quantity as f64).sum();
        let order = MealOrder {
            order_id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            items,
            total_fee,
            ordered_at: Utc::now(),
        };
        self.repository.add_meal_order(order.clone()).await?;
        Ok(order)
    }
}
