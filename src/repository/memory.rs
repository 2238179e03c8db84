//! DashMap-backed `Repository`, grounded on
//! `original_source/backend/infrastructure/memory_store.py`.

use async_trait::async_trait;
use dashmap::DashMap;
use chrono::{DateTime, Utc};

use crate::domain::{
    ACBill, ACDetailRecord, AccommodationBill, AccommodationOrder, MealOrder, Room, ServiceObject,
};
use crate::errors::CoreResult;

use super::{Repository, WaitEntry};

#[derive(Default)]
pub struct InMemoryRepository {
    rooms: DashMap<String, Room>,
    services: DashMap<String, ServiceObject>,
    wait_entries: DashMap<String, WaitEntry>,
    detail_records: DashMap<String, ACDetailRecord>,
    room_detail_history: DashMap<String, Vec<String>>,
    ac_bills: DashMap<String, Vec<ACBill>>,
    accommodation_orders: DashMap<String, Vec<AccommodationOrder>>,
    accommodation_bills: DashMap<String, Vec<AccommodationBill>>,
    meal_orders: DashMap<String, Vec<MealOrder>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_room(&self, room_id: &str) -> CoreResult<Option<Room>> {
        Ok(self.rooms.get(room_id).map(|r| r.clone()))
    }

    async fn list_rooms(&self) -> CoreResult<Vec<Room>> {
        Ok(self.rooms.iter().map(|e| e.value().clone()).collect())
    }

    async fn save_room(&self, room: Room) -> CoreResult<()> {
        self.rooms.insert(room.room_id.clone(), room);
        Ok(())
    }

    async fn add_service_object(&self, service: ServiceObject) -> CoreResult<()> {
        self.services.insert(service.room_id.clone(), service);
        Ok(())
    }

    async fn update_service_object(&self, service: ServiceObject) -> CoreResult<()> {
        self.services.insert(service.room_id.clone(), service);
        Ok(())
    }

    async fn remove_service_object(&self, room_id: &str) -> CoreResult<()> {
        self.services.remove(room_id);
        Ok(())
    }

    async fn get_service_object(&self, room_id: &str) -> CoreResult<Option<ServiceObject>> {
        Ok(self.services.get(room_id).map(|s| s.clone()))
    }

    async fn list_service_objects(&self) -> CoreResult<Vec<ServiceObject>> {
        Ok(self.services.iter().map(|e| e.value().clone()).collect())
    }

    async fn add_wait_entry(&self, entry: WaitEntry) -> CoreResult<()> {
        self.wait_entries.insert(entry.room_id.clone(), entry);
        Ok(())
    }

    async fn remove_wait_entry(&self, room_id: &str) -> CoreResult<()> {
        self.wait_entries.remove(room_id);
        Ok(())
    }

    async fn list_wait_entries(&self) -> CoreResult<Vec<WaitEntry>> {
        Ok(self.wait_entries.iter().map(|e| e.value().clone()).collect())
    }

    async fn add_detail_record(&self, record: ACDetailRecord) -> CoreResult<()> {
        self.room_detail_history
            .entry(record.room_id.clone())
            .or_default()
            .push(record.record_id.clone());
        self.detail_records.insert(record.record_id.clone(), record);
        Ok(())
    }

    async fn update_detail_record(&self, record: ACDetailRecord) -> CoreResult<()> {
        self.detail_records.insert(record.record_id.clone(), record);
        Ok(())
    }

    async fn get_active_detail_record(&self, room_id: &str) -> CoreResult<Option<ACDetailRecord>> {
        let Some(ids) = self.room_detail_history.get(room_id) else {
            return Ok(None);
        };
        for record_id in ids.iter().rev() {
            if let Some(record) = self.detail_records.get(record_id) {
                if record.is_open() {
                    return Ok(Some(record.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn list_completed_detail_records(
        &self,
        room_id: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<ACDetailRecord>> {
        let Some(ids) = self.room_detail_history.get(room_id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for record_id in ids.iter() {
            if let Some(record) = self.detail_records.get(record_id) {
                if record.ended_at.is_some() && record.started_at >= since {
                    out.push(record.clone());
                }
            }
        }
        Ok(out)
    }

    async fn add_ac_bill(&self, bill: ACBill) -> CoreResult<()> {
        self.ac_bills.entry(bill.room_id.clone()).or_default().push(bill);
        Ok(())
    }

    async fn list_ac_bills(&self, room_id: &str) -> CoreResult<Vec<ACBill>> {
        Ok(self
            .ac_bills
            .get(room_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn add_accommodation_order(&self, order: AccommodationOrder) -> CoreResult<()> {
        self.accommodation_orders
            .entry(order.room_id.clone())
            .or_default()
            .push(order);
        Ok(())
    }

    async fn get_latest_accommodation_order(
        &self,
        room_id: &str,
    ) -> CoreResult<Option<AccommodationOrder>> {
        Ok(self
            .accommodation_orders
            .get(room_id)
            .and_then(|v| v.last().cloned()))
    }

    async fn add_accommodation_bill(&self, bill: AccommodationBill) -> CoreResult<()> {
        self.accommodation_bills
            .entry(bill.room_id.clone())
            .or_default()
            .push(bill);
        Ok(())
    }

    async fn list_accommodation_bills(&self, room_id: &str) -> CoreResult<Vec<AccommodationBill>> {
        Ok(self
            .accommodation_bills
            .get(room_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn add_meal_order(&self, order: MealOrder) -> CoreResult<()> {
        self.meal_orders.entry(order.room_id.clone()).or_default().push(order);
        Ok(())
    }

    async fn list_meal_orders(
        &self,
        room_id: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<MealOrder>> {
        Ok(self
            .meal_orders
            .get(room_id)
            .map(|v| {
                v.iter()
                    .filter(|o| o.ordered_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
