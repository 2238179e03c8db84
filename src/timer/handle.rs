//! Opaque timer handles — a timer handle as opaque id is deliberate, so
//! it is never serialized as a live handle. Grounded on
//! `original_source/backend/application/timer_handle.py`, with the
//! back-reference to the owning `TimeManager` dropped: callers hold only
//! `timer_id` and query the registry by id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerType {
    Service,
    Wait,
    Detail,
    Accommodation,
}

impl TimerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerType::Service => "service",
            TimerType::Wait => "wait",
            TimerType::Detail => "detail",
            TimerType::Accommodation => "accommodation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerHandle {
    pub timer_id: String,
    pub timer_type: TimerType,
    pub room_id: String,
}
