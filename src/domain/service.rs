//! `ServiceObject`: one per room currently known to the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::room::Speed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Serving,
    Waiting,
    Stopped,
}

/// Computed properties (`served_seconds`, `remaining_seconds`, `current_fee`)
/// deliberately are not fields here; they are looked up from the timer
/// registry via `timer_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceObject {
    pub room_id: String,
    pub speed: Speed,
    pub started_at: Option<DateTime<Utc>>,
    pub priority_token: u64,
    pub time_slice_enforced: bool,
    pub status: ServiceStatus,
    pub timer_id: Option<String>,
}

impl ServiceObject {
    pub fn new(room_id: impl Into<String>, speed: Speed) -> Self {
        ServiceObject {
            room_id: room_id.into(),
            speed,
            started_at: None,
            priority_token: 0,
            time_slice_enforced: false,
            status: ServiceStatus::Waiting,
            timer_id: None,
        }
    }
}
