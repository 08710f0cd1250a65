//! Linear Power Model
//!
//! Maps average CPU utilization to instantaneous power draw by interpolating
//! between two operating points measured on the target host.

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult};

/// Joules per kilowatt-hour.
pub const JOULES_PER_KWH: f64 = 3_600_000.0;

/// Host power endpoints measured offline (see `calibration`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConstants {
    idle_power_watts: f64,
    max_power_watts: f64,
}

impl CalibrationConstants {
    /// Validates `0 <= idle < max`, both finite.
    pub fn new(idle_power_watts: f64, max_power_watts: f64) -> CoreResult<Self> {
        if !idle_power_watts.is_finite() || !max_power_watts.is_finite() {
            return Err(CoreError::InvalidCalibration(
                "power values must be finite".to_string(),
            ));
        }
        if idle_power_watts < 0.0 {
            return Err(CoreError::InvalidCalibration(format!(
                "idle power must be non-negative, got {idle_power_watts}"
            )));
        }
        if idle_power_watts >= max_power_watts {
            return Err(CoreError::InvalidCalibration(format!(
                "idle power ({idle_power_watts} W) must be below max power ({max_power_watts} W)"
            )));
        }
        Ok(Self {
            idle_power_watts,
            max_power_watts,
        })
    }

    pub fn idle_power_watts(&self) -> f64 {
        self.idle_power_watts
    }

    pub fn max_power_watts(&self) -> f64 {
        self.max_power_watts
    }

    /// Instantaneous power at the given utilization.
    pub fn power(&self, avg_cpu_percent: f64) -> f64 {
        power(avg_cpu_percent, self)
    }
}

/// `idle + (max - idle) * cpu / 100`, with CPU% clamped to [0, 100].
///
/// NaN utilization is treated as 0 so jitter never turns into negative or
/// undefined energy.
pub fn power(avg_cpu_percent: f64, constants: &CalibrationConstants) -> f64 {
    let cpu = clamp_cpu_percent(avg_cpu_percent);
    constants.idle_power_watts
        + (constants.max_power_watts - constants.idle_power_watts) * (cpu / 100.0)
}

/// Clamps a utilization reading into [0, 100].
pub fn clamp_cpu_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Energy in joules to grams of CO2 at the given grid intensity.
pub fn co2_grams(energy_joules: f64, carbon_intensity_g_per_kwh: f64) -> f64 {
    energy_joules / JOULES_PER_KWH * carbon_intensity_g_per_kwh
}
