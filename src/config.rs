//! Layered configuration. All groups are optional with defaults; an outer
//! application may supply a TOML file and/or environment overrides
//! prefixed `HOTEL_AC__` (double underscore separates group and key, e.g.
//! `HOTEL_AC__BILLING__PRICE_PER_UNIT=2`). Loading the TOML file itself is
//! this crate's job; deciding *where that file lives* is not.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    pub default_target: f64,
    pub mid_delta_per_min: f64,
    pub high_multiplier: f64,
    pub low_multiplier: f64,
    pub idle_drift_per_min: f64,
    pub auto_restart_threshold: f64,
    pub cool_range: [f64; 2],
    pub heat_range: [f64; 2],
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        TemperatureConfig {
            default_target: 25.0,
            mid_delta_per_min: 0.5,
            high_multiplier: 1.2,
            low_multiplier: 0.8,
            idle_drift_per_min: 0.5,
            auto_restart_threshold: 1.0,
            cool_range: [16.0, 30.0],
            heat_range: [16.0, 30.0],
        }
    }
}

impl TemperatureConfig {
    pub fn range_for(&self, mode: crate::domain::Mode) -> Option<(f64, f64)> {
        let r = match mode {
            crate::domain::Mode::Cool => self.cool_range,
            crate::domain::Mode::Heat => self.heat_range,
        };
        Some((r[0], r[1]))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub max_concurrent: usize,
    pub time_slice_seconds: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        SchedulingConfig {
            max_concurrent: 3,
            time_slice_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub change_temp_ms: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            change_temp_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub price_per_unit: f64,
    pub rate_high_unit_per_min: f64,
    pub rate_mid_unit_per_min: f64,
    pub rate_low_unit_per_min: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            price_per_unit: 1.0,
            rate_high_unit_per_min: 1.0,
            rate_mid_unit_per_min: 0.5,
            rate_low_unit_per_min: 1.0 / 3.0,
        }
    }
}

impl BillingConfig {
    pub fn rate_for(&self, speed: crate::domain::Speed) -> f64 {
        match speed {
            crate::domain::Speed::High => self.rate_high_unit_per_min,
            crate::domain::Speed::Mid => self.rate_mid_unit_per_min,
            crate::domain::Speed::Low => self.rate_low_unit_per_min,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccommodationConfig {
    pub rate_per_night: f64,
}

impl Default for AccommodationConfig {
    fn default() -> Self {
        AccommodationConfig {
            rate_per_night: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Logical-to-wall-time multiplier; tick interval = 1 / ratio.
    pub ratio: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig { ratio: 1.0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub temperature: TemperatureConfig,
    pub scheduling: SchedulingConfig,
    pub throttle: ThrottleConfig,
    pub billing: BillingConfig,
    pub accommodation: AccommodationConfig,
    pub clock: ClockConfig,
}

impl CoreConfig {
    /// Build a layered config: compiled-in defaults, then an optional TOML
    /// file, then `HOTEL_AC__`-prefixed environment overrides.
    pub fn load(file_path: Option<&str>) -> Result<Self> {
        let defaults = CoreConfig::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults).context("serializing compiled-in defaults")?,
        );
        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("HOTEL_AC")
                .separator("__")
                .try_parsing(true),
        );
        let built = builder.build().context("building layered configuration")?;
        built
            .try_deserialize()
            .context("deserializing CoreConfig")
    }
}

/// CLI entry point for the demonstration binary (`main.rs`); library
/// consumers construct `CoreConfig` directly via `CoreConfig::load`.
#[derive(clap::Parser, Debug, Clone)]
pub struct Cli {
    #[arg(long)]
    pub config_file: Option<String>,

    #[arg(long, default_value_t = 1.0)]
    pub tick_interval_secs: f64,
}

impl Cli {
    pub fn parse_and_build_config() -> Result<(Self, CoreConfig)> {
        let cli = <Cli as clap::Parser>::parse();
        let core_config = CoreConfig::load(cli.config_file.as_deref())?;
        Ok((cli, core_config))
    }
}
