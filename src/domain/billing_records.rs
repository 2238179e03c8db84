//! `ACDetailRecord` / `ACBill`, grounded on
//! `original_source/backend/domain/{detail_record,bill}.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::room::Speed;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ACDetailRecord {
    pub record_id: String,
    pub room_id: String,
    pub speed: Speed,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub logic_start_seconds: Option<i64>,
    pub logic_end_seconds: Option<i64>,
    pub rate_per_min: f64,
    pub fee_value: f64,
    pub timer_id: Option<String>,
}

impl ACDetailRecord {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ACBill {
    pub bill_id: String,
    pub room_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_fee: f64,
    pub details: Vec<ACDetailRecord>,
}

impl ACBill {
    pub fn new(
        bill_id: impl Into<String>,
        room_id: impl Into<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Self {
        ACBill {
            bill_id: bill_id.into(),
            room_id: room_id.into(),
            period_start,
            period_end,
            total_fee: 0.0,
            details: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: ACDetailRecord) {
        self.total_fee += record.fee_value;
        self.details.push(record);
    }
}
