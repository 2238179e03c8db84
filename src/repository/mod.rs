//! Persistence seam, grounded on
//! `original_source/backend/infrastructure/repository.py`. Two
//! implementations: `memory` (dashmap, default for tests and the demo
//! binary) and `sqlite` (sqlx, short per-call transactions).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::domain::{
    ACBill, ACDetailRecord, AccommodationBill, AccommodationOrder, MealOrder, Room, ServiceObject,
};
use crate::errors::CoreResult;

pub use memory::InMemoryRepository;

/// A wait-queue entry: a room waiting for capacity, with the speed it
/// requested and whether its time slice is already being enforced.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WaitEntry {
    pub room_id: String,
    pub speed: crate::domain::Speed,
    pub priority_token: u64,
    pub timer_id: Option<String>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_room(&self, room_id: &str) -> CoreResult<Option<Room>>;
    async fn list_rooms(&self) -> CoreResult<Vec<Room>>;
    async fn save_room(&self, room: Room) -> CoreResult<()>;

    async fn add_service_object(&self, service: ServiceObject) -> CoreResult<()>;
    async fn update_service_object(&self, service: ServiceObject) -> CoreResult<()>;
    async fn remove_service_object(&self, room_id: &str) -> CoreResult<()>;
    async fn get_service_object(&self, room_id: &str) -> CoreResult<Option<ServiceObject>>;
    async fn list_service_objects(&self) -> CoreResult<Vec<ServiceObject>>;

    async fn add_wait_entry(&self, entry: WaitEntry) -> CoreResult<()>;
    async fn remove_wait_entry(&self, room_id: &str) -> CoreResult<()>;
    async fn list_wait_entries(&self) -> CoreResult<Vec<WaitEntry>>;

    async fn add_detail_record(&self, record: ACDetailRecord) -> CoreResult<()>;
    async fn update_detail_record(&self, record: ACDetailRecord) -> CoreResult<()>;
    async fn get_active_detail_record(&self, room_id: &str) -> CoreResult<Option<ACDetailRecord>>;
    async fn list_completed_detail_records(
        &self,
        room_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> CoreResult<Vec<ACDetailRecord>>;

    async fn add_ac_bill(&self, bill: ACBill) -> CoreResult<()>;
    async fn list_ac_bills(&self, room_id: &str) -> CoreResult<Vec<ACBill>>;

    async fn add_accommodation_order(&self, order: AccommodationOrder) -> CoreResult<()>;
    async fn get_latest_accommodation_order(
        &self,
        room_id: &str,
    ) -> CoreResult<Option<AccommodationOrder>>;
    async fn add_accommodation_bill(&self, bill: AccommodationBill) -> CoreResult<()>;
    async fn list_accommodation_bills(&self, room_id: &str) -> CoreResult<Vec<AccommodationBill>>;

    /// Default implementation folds `list_accommodation_bills`; backends may
    /// override with an `ORDER BY ... LIMIT 1` query if it matters at scale.
    async fn get_latest_accommodation_bill(&self, room_id: &str) -> CoreResult<Option<AccommodationBill>> {
        let bills = self.list_accommodation_bills(room_id).await?;
        Ok(bills.into_iter().last())
    }

    async fn add_meal_order(&self, order: MealOrder) -> CoreResult<()>;
    async fn list_meal_orders(
        &self,
        room_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> CoreResult<Vec<MealOrder>>;

    /// Default implementation folds `list_meal_orders`; backends may
    /// override with a `SUM(total_fee)` query if it matters at scale.
    async fn get_meal_total_fee(
        &self,
        room_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> CoreResult<f64> {
        let orders = self.list_meal_orders(room_id, since).await?;
        Ok(orders.iter().map(|o| o.total_fee).sum())
    }
}
