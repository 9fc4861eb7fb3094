use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prelude::*;
use crate::system::StructuralSystem;

/// Power iteration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerIterationConfig {
    pub max_iterations: usize,
    /// Relative change in the frequency estimate between checkpoints below
    /// which the iteration stops.
    pub relative_tolerance: f64,
    /// Seed for the uniform random trial vector.
    pub seed: u64,
}

impl Default for PowerIterationConfig {
    fn default() -> Self {
        PowerIterationConfig {
            max_iterations: 30,
            relative_tolerance: 1e-4,
            seed: 0,
        }
    }
}

impl PowerIterationConfig {
    /// Number of iterations between Rayleigh quotient checkpoints.
    pub fn check_interval(&self) -> usize {
        self.max_iterations.div_ceil(50) + 1
    }

    pub fn validate(&self) -> Result<()> {
        let check_interval = self.check_interval();
        if self.max_iterations < check_interval {
            return Err(Error::TooFewIterations {
                max_iterations: self.max_iterations,
                check_interval,
            });
        }
        if !(self.relative_tolerance.is_finite() && self.relative_tolerance > 0.) {
            return Err(Error::InvalidTolerance(self.relative_tolerance));
        }
        Ok(())
    }
}

/// Estimate of the highest natural angular frequency of (K, M).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralEstimate {
    /// sqrt(lambda_max) of the generalized problem K x = lambda M x
    pub omega_max: f64,
    /// Iterations performed
    pub iterations: usize,
    /// True if the tolerance was met before max_iterations
    pub converged: bool,
}

impl SpectralEstimate {
    /// Critical central-difference time step `2 / omega_max`.
    ///
    /// Infinite when the system has no stiffness.
    pub fn critical_time_step(&self) -> f64 {
        2. / self.omega_max
    }

    /// Critical time step scaled by a safety factor in (0, 1].
    pub fn stable_time_step(&self, factor: f64) -> f64 {
        factor * self.critical_time_step()
    }
}

/// Estimates the dominant generalized eigenvalue of (K, M) by power
/// iteration on the mass-preconditioned operator M^-1 K.
pub struct SpectralRadiusEstimator {
    config: PowerIterationConfig,
}

impl SpectralRadiusEstimator {
    pub fn new(config: PowerIterationConfig) -> Result<Self> {
        config.validate()?;
        Ok(SpectralRadiusEstimator { config })
    }

    pub fn config(&self) -> &PowerIterationConfig {
        &self.config
    }

    pub fn estimate(&self, system: &StructuralSystem) -> SpectralEstimate {
        let n = system.ndofs();
        let check_interval = self.config.check_interval();

        // Uniform random trial vector
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut v: VectorD = VectorD::from_fn(n, |_, _| rng.gen::<f64>());
        let mut w: VectorD = VectorD::zeros(n);

        let mut omega = 0.;
        let mut omega_prev = 0.;
        let mut have_checkpoint = false;

        for i in 1..=self.config.max_iterations {
            // w = K v, normalized
            system.stiffness_product(&v, &mut w);
            let w_norm = w.norm();
            if w_norm == 0. {
                // Trial vector lies in the null space of K
                debug!("power iteration: K v vanished at iteration {}", i);
                return SpectralEstimate {
                    omega_max: 0.,
                    iterations: i,
                    converged: true,
                };
            }
            w /= w_norm;

            // v = M^-1 w, normalized
            for (vi, &wi, &mi) in izip!(v.iter_mut(), w.iter(), system.mass().iter()) {
                *vi = wi / mi;
            }
            let v_norm = v.norm();
            v /= v_norm;

            if i % check_interval != 0 {
                continue;
            }

            // Rayleigh quotient
            omega = (system.stiffness_quadratic_form(&v) / system.mass_quadratic_form(&v)).sqrt();
            debug!("power iteration {}: omega_max = {:.6e}", i, omega);

            if have_checkpoint
                && (omega - omega_prev).abs() <= self.config.relative_tolerance * omega.abs()
            {
                return SpectralEstimate {
                    omega_max: omega,
                    iterations: i,
                    converged: true,
                };
            }
            omega_prev = omega;
            have_checkpoint = true;
        }

        warn!(
            "power iteration did not converge in {} iterations, omega_max = {:.6e}",
            self.config.max_iterations, omega
        );
        SpectralEstimate {
            omega_max: omega,
            iterations: self.config.max_iterations,
            converged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn diagonal_system(k: &[f64], m: &[f64]) -> StructuralSystem {
        let mut coo = TripletMatrix::new(k.len(), k.len());
        for (i, &ki) in k.iter().enumerate() {
            coo.push(i, i, ki);
        }
        StructuralSystem::new(SparseMatrix::from(&coo), VectorD::from_column_slice(m)).unwrap()
    }

    #[test]
    fn test_check_interval() {
        let mut config = PowerIterationConfig::default();
        assert_eq!(config.check_interval(), 2);
        config.max_iterations = 100;
        assert_eq!(config.check_interval(), 3);
        config.max_iterations = 101;
        assert_eq!(config.check_interval(), 4);
    }

    #[test]
    fn test_rejects_too_few_iterations() {
        let config = PowerIterationConfig {
            max_iterations: 1,
            ..Default::default()
        };
        assert!(matches!(
            SpectralRadiusEstimator::new(config),
            Err(Error::TooFewIterations {
                max_iterations: 1,
                check_interval: 2
            })
        ));
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        let config = PowerIterationConfig {
            relative_tolerance: 0.,
            ..Default::default()
        };
        assert!(matches!(
            SpectralRadiusEstimator::new(config),
            Err(Error::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_single_dof() {
        let sys = diagonal_system(&[9.], &[4.]);
        let est = SpectralRadiusEstimator::new(Default::default())
            .unwrap()
            .estimate(&sys);
        assert_relative_eq!(est.omega_max, 1.5, epsilon = 1e-12);
        assert!(est.converged);
        assert_eq!(est.iterations, 4);
        assert_relative_eq!(est.critical_time_step(), 4. / 3., epsilon = 1e-12);
    }

    #[test]
    fn test_zero_stiffness() {
        let sys = StructuralSystem::new(
            SparseMatrix::from(&TripletMatrix::new(2, 2)),
            dvector![1., 1.],
        )
        .unwrap();
        let est = SpectralRadiusEstimator::new(Default::default())
            .unwrap()
            .estimate(&sys);
        assert_eq!(est.omega_max, 0.);
        assert!(est.critical_time_step().is_infinite());
    }
}
