//! Room state and the thermal/throttle rules, grounded on
//! `original_source/backend/domain/room.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TemperatureConfig;
use crate::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Vacant,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Cool,
    Heat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speed {
    High,
    Mid,
    Low,
}

impl Speed {
    /// HIGH=3, MID=2, LOW=1.
    pub fn priority(self) -> u8 {
        match self {
            Speed::High => 3,
            Speed::Mid => 2,
            Speed::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Speed::High => "high",
            Speed::Mid => "mid",
            Speed::Low => "low",
        }
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Speed::High => "HIGH",
            Speed::Mid => "MID",
            Speed::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub status: RoomStatus,
    pub current_temp: f64,
    pub target_temp: f64,
    pub initial_temp: f64,
    pub mode: Mode,
    pub speed: Speed,
    pub is_serving: bool,
    pub powered_on: bool,
    pub manual_powered_off: bool,
    pub last_temp_change_ts: Option<DateTime<Utc>>,
    pub pending_target_temp: Option<f64>,
    pub rate_per_night: f64,
}

impl Room {
    pub fn new(room_id: impl Into<String>, default_target: f64, rate_per_night: f64) -> Self {
        Room {
            room_id: room_id.into(),
            status: RoomStatus::Vacant,
            current_temp: default_target,
            target_temp: default_target,
            initial_temp: default_target,
            mode: Mode::Cool,
            speed: Speed::Mid,
            is_serving: false,
            powered_on: false,
            manual_powered_off: false,
            last_temp_change_ts: None,
            pending_target_temp: None,
            rate_per_night,
        }
    }

    /// Check-in: VACANT → OCCUPIED, current_temp becomes the new initial_temp.
    pub fn check_in(&mut self) {
        self.status = RoomStatus::Occupied;
        self.initial_temp = self.current_temp;
        self.target_temp = self.current_temp;
        self.speed = Speed::Mid;
        self.is_serving = false;
    }

    /// Checkout: OCCUPIED → VACANT, service fields reset.
    pub fn check_out(&mut self, default_target: f64) {
        self.status = RoomStatus::Vacant;
        self.is_serving = false;
        self.powered_on = false;
        self.manual_powered_off = false;
        self.speed = Speed::Mid;
        self.target_temp = default_target;
    }

    fn validate_range(target: f64, range: Option<(f64, f64)>) -> CoreResult<()> {
        if let Some((min, max)) = range {
            if target < min || target > max {
                return Err(CoreError::invalid_argument(format!(
                    "target temperature {target} outside range [{min}, {max}]"
                )));
            }
        }
        Ok(())
    }

    /// Throttle on target_temp changes. Returns `true` if the
    /// change applied immediately, `false` if it was buffered as pending.
    pub fn request_target_temp(
        &mut self,
        target: f64,
        now: DateTime<Utc>,
        throttle_ms: i64,
        range: Option<(f64, f64)>,
    ) -> CoreResult<bool> {
        Self::validate_range(target, range)?;
        self.pending_target_temp = None;
        if let Some(last) = self.last_temp_change_ts {
            let delta_ms = (now - last).num_milliseconds();
            if delta_ms < throttle_ms {
                self.pending_target_temp = Some(target);
                return Ok(false);
            }
        }
        self.target_temp = target;
        self.last_temp_change_ts = Some(now);
        Ok(true)
    }

    /// Apply a coalesced pending target once the throttle window has elapsed.
    pub fn apply_pending_target(&mut self, now: DateTime<Utc>, throttle_ms: i64) {
        let Some(pending) = self.pending_target_temp else {
            return;
        };
        let Some(last) = self.last_temp_change_ts else {
            self.target_temp = pending;
            self.pending_target_temp = None;
            self.last_temp_change_ts = Some(now);
            return;
        };
        let delta_ms = (now - last).num_milliseconds();
        if delta_ms >= throttle_ms {
            self.target_temp = pending;
            self.pending_target_temp = None;
            self.last_temp_change_ts = Some(now);
        }
    }

    /// Advance current_temp by one logical second. Returns `true` if the
    /// target was just reached while serving.
    pub fn tick_temperature(&mut self, cfg: &TemperatureConfig, serving: bool) -> bool {
        if serving {
            let multiplier = match self.speed {
                Speed::High => cfg.high_multiplier,
                Speed::Low => cfg.low_multiplier,
                Speed::Mid => 1.0,
            };
            let delta_per_sec = (cfg.mid_delta_per_min * multiplier) / 60.0;
            let target = self.target_temp;
            self.move_towards(target, delta_per_sec)
        } else {
            let delta_per_sec = cfg.idle_drift_per_min / 60.0;
            let target = self.initial_temp;
            self.move_towards(target, delta_per_sec);
            false
        }
    }

    /// A room needs auto-restart iff OCCUPIED, not manually powered off, and
    /// drifted at least `threshold` away from its target.
    pub fn needs_auto_restart(&self, threshold: f64) -> bool {
        self.status == RoomStatus::Occupied
            && !self.manual_powered_off
            && (self.current_temp - self.target_temp).abs() >= threshold
    }

    fn move_towards(&mut self, target: f64, delta_per_sec: f64) -> bool {
        if delta_per_sec <= 0.0 {
            return (self.current_temp - target).abs() < 1e-3;
        }
        let difference = target - self.current_temp;
        if difference.abs() <= delta_per_sec {
            self.current_temp = target;
            return true;
        }
        let step = if difference > 0.0 {
            delta_per_sec
        } else {
            -delta_per_sec
        };
        self.current_temp += step;
        false
    }
}
