//! Meal orders — named only as "if supported"; this crate completes it in
//! full. Not present in `original_source`'s kept files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealOrder {
    pub order_id: String,
    pub room_id: String,
    pub items: Vec<MealItem>,
    pub total_fee: f64,
    pub ordered_at: DateTime<Utc>,
}
