//! Fare computation
//!
//! Fees are `rate(size) * billable_hours`, where billable hours round the stay
//! up to the next whole hour with a one-hour minimum. The peak policy applies
//! a surcharge when the fee is computed (checkout time) inside the evening
//! window.

use crate::domain::types::VehicleSize;
use chrono::{DateTime, Duration, FixedOffset, Timelike};
use serde::Deserialize;

/// First clock hour of the peak window (inclusive)
pub const PEAK_START_HOUR: u32 = 17;
/// Last clock hour of the peak window (inclusive)
pub const PEAK_END_HOUR: u32 = 20;
/// Multiplier applied to the base fee during peak hours
pub const PEAK_MULTIPLIER: f64 = 1.5;

const MS_PER_HOUR: i64 = 3_600_000;

/// Hourly rate per vehicle size
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RateTable {
    #[serde(default = "default_small_rate")]
    pub small: f64,
    #[serde(default = "default_medium_rate")]
    pub medium: f64,
    #[serde(default = "default_large_rate")]
    pub large: f64,
}

fn default_small_rate() -> f64 {
    10.0
}

fn default_medium_rate() -> f64 {
    20.0
}

fn default_large_rate() -> f64 {
    30.0
}

impl Default for RateTable {
    fn default() -> Self {
        Self { small: default_small_rate(), medium: default_medium_rate(), large: default_large_rate() }
    }
}

impl RateTable {
    #[inline]
    pub fn rate(&self, size: VehicleSize) -> f64 {
        match size {
            VehicleSize::Small => self.small,
            VehicleSize::Medium => self.medium,
            VehicleSize::Large => self.large,
        }
    }
}

/// Whole hours billed for a stay: rounded up, never less than one.
///
/// A negative duration (clock stepped backwards) bills the minimum.
pub fn billable_hours(elapsed: Duration) -> u64 {
    let ms = elapsed.num_milliseconds().max(0);
    let hours = (ms + MS_PER_HOUR - 1) / MS_PER_HOUR;
    hours.max(1) as u64
}

pub fn base_compute(rates: &RateTable, size: VehicleSize, elapsed: Duration) -> f64 {
    rates.rate(size) * billable_hours(elapsed) as f64
}

#[inline]
pub fn is_peak_hour(hour: u32) -> bool {
    (PEAK_START_HOUR..=PEAK_END_HOUR).contains(&hour)
}

pub fn peak_compute(rates: &RateTable, size: VehicleSize, elapsed: Duration, clock_hour: u32) -> f64 {
    let fee = base_compute(rates, size, elapsed);
    if is_peak_hour(clock_hour) {
        fee * PEAK_MULTIPLIER
    } else {
        fee
    }
}

/// Fee policy, selected once per lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FarePolicy {
    #[default]
    Base,
    Peak,
}

impl FarePolicy {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            FarePolicy::Base => "base",
            FarePolicy::Peak => "peak",
        }
    }

    /// Compute the fee for a stay of `elapsed` settled at `evaluated_at`
    pub fn compute(
        &self,
        rates: &RateTable,
        size: VehicleSize,
        elapsed: Duration,
        evaluated_at: DateTime<FixedOffset>,
    ) -> f64 {
        match self {
            FarePolicy::Base => base_compute(rates, size, elapsed),
            FarePolicy::Peak => peak_compute(rates, size, elapsed, evaluated_at.hour()),
        }
    }
}

impl std::str::FromStr for FarePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(FarePolicy::Base),
            "peak" => Ok(FarePolicy::Peak),
            other => Err(format!("unknown fare policy '{other}' (expected 'base' or 'peak')")),
        }
    }
}
