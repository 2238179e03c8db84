//! Data model: rooms, service objects, billing records, stays.

pub mod accommodation;
pub mod billing_records;
pub mod meal;
pub mod queues;
pub mod room;
pub mod service;

pub use accommodation::{AccommodationBill, AccommodationOrder};
pub use billing_records::{ACBill, ACDetailRecord};
pub use meal::{MealItem, MealOrder};
pub use queues::QueueKind;
pub use room::{Mode, Room, RoomStatus, Speed};
pub use service::{ServiceObject, ServiceStatus};
