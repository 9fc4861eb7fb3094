//! Estimate-then-integrate driver shared by every problem instance.

use log::{info, warn};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::load::ForceGenerator;
use crate::observer::Observer;
use crate::prelude::*;
use crate::solver::{
    CentralDifferenceSolver, RunSummary, SpectralEstimate, SpectralRadiusEstimator,
};
use crate::system::StructuralSystem;

pub struct Simulation<'a> {
    system: &'a StructuralSystem,
    config: SimulationConfig,
    estimate: SpectralEstimate,
    dt: f64,
}

impl<'a> Simulation<'a> {
    /// Validates the configuration, estimates the highest natural frequency
    /// of the system and fixes the nominal time step.
    pub fn new(system: &'a StructuralSystem, config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let estimate = SpectralRadiusEstimator::new(config.power_iteration)?.estimate(system);
        let dt_crit = estimate.critical_time_step();
        info!(
            "omega_max = {:.6e} rad/s after {} iterations, critical dt = {:.6e}",
            estimate.omega_max, estimate.iterations, dt_crit
        );

        let dt = match config.time_step {
            Some(dt) => {
                if dt > dt_crit {
                    warn!(
                        "time step {:.6e} exceeds the critical step {:.6e}, the run will diverge",
                        dt, dt_crit
                    );
                }
                dt
            }
            None if dt_crit.is_finite() => estimate.stable_time_step(config.stability_factor),
            // No stiffness: any step is stable, cover the run in one
            None => config.duration.max(f64::MIN_POSITIVE),
        };

        Ok(Simulation {
            system,
            config,
            estimate,
            dt,
        })
    }

    pub fn estimate(&self) -> &SpectralEstimate {
        &self.estimate
    }

    /// Nominal time step before adjustment to the duration
    pub fn time_step(&self) -> f64 {
        self.dt
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Integrates from `(u0, v0)` to the configured duration.
    pub fn run(
        &self,
        u0: &VectorD,
        v0: &VectorD,
        force: &impl ForceGenerator,
        observer: &mut impl Observer,
    ) -> Result<RunSummary> {
        let mut solver = CentralDifferenceSolver::new(
            self.system,
            self.config.integrator(),
            self.config.duration,
            self.dt,
        )?;
        solver.solve(u0, v0, force, observer)
    }
}
