//! Stay records, grounded on `original_source/backend/application/checkin_service.py`
//! and `checkout_service.py` (the kept files pass these around as plain
//! dicts; here they are typed records).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccommodationOrder {
    pub order_id: String,
    pub room_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub guest_count: u32,
    pub nights: u32,
    pub deposit: f64,
    pub check_in_at: DateTime<Utc>,
    pub timer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccommodationBill {
    pub bill_id: String,
    pub room_id: String,
    pub total_fee: f64,
    pub nights: u32,
    pub rate_per_night: f64,
    pub deposit: f64,
    pub accommodation_seconds: i64,
    pub created_at: DateTime<Utc>,
}
