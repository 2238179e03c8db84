//! Use-case services: the caller-facing API surface wired on top
//! of the scheduler, timer registry, and billing engine.

pub mod ac_service;
pub mod checkin_service;
pub mod checkout_service;
pub mod meal_service;

pub use ac_service::ACService;
pub use checkin_service::CheckInService;
pub use checkout_service::{CheckOutService, CheckOutSummary};
pub use meal_service::MealService;
