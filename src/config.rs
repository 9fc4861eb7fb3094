//! Run configuration.
//!
//! Physical and numerical parameters of a run are gathered here and passed
//! explicitly to the estimator and the integrator. Configurations can be
//! read from JSON; absent fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::solver::{DampingModel, IntegratorConfig, PowerIterationConfig};

/// Default fraction of the critical time step used when no step is given.
pub const DEFAULT_STABILITY_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Requested end time (s)
    pub duration: f64,
    /// Nominal time step (s). When absent the step is derived from the
    /// estimated highest frequency.
    pub time_step: Option<f64>,
    /// Fraction of the critical time step used when `time_step` is absent
    pub stability_factor: f64,
    pub damping: DampingModel,
    pub power_iteration: PowerIterationConfig,
    /// Fail as soon as the state becomes non-finite
    pub check_finite: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            duration: 0.,
            time_step: None,
            stability_factor: DEFAULT_STABILITY_FACTOR,
            damping: DampingModel::default(),
            power_iteration: PowerIterationConfig::default(),
            check_finite: false,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.duration.is_finite() && self.duration >= 0.) {
            return Err(Error::InvalidDuration(self.duration));
        }
        if let Some(dt) = self.time_step {
            if !(dt.is_finite() && dt > 0.) {
                return Err(Error::InvalidTimeStep(dt));
            }
        }
        if !(self.stability_factor > 0. && self.stability_factor <= 1.) {
            return Err(Error::InvalidConfig(format!(
                "stability factor must be in (0, 1], got {}",
                self.stability_factor
            )));
        }
        self.damping.validate()?;
        self.power_iteration.validate()
    }

    pub fn integrator(&self) -> IntegratorConfig {
        IntegratorConfig {
            damping: self.damping,
            check_finite: self.check_finite,
        }
    }
}
