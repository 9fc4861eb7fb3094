use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::load::ForceGenerator;
use crate::observer::Observer;
use crate::prelude::*;
use crate::system::StructuralSystem;

//------------------------------------------------------------------------------
// Configuration
//------------------------------------------------------------------------------

/// Mass-proportional damping `C = ratio * 2 * reference_frequency * M`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingModel {
    /// Damping ratio
    pub ratio: f64,
    /// Reference angular frequency (rad/s)
    pub reference_frequency: f64,
}

impl DampingModel {
    pub fn new(ratio: f64, reference_frequency: f64) -> Self {
        DampingModel {
            ratio,
            reference_frequency,
        }
    }

    pub fn undamped() -> Self {
        Self::default()
    }

    /// Factor multiplying the mass diagonal to give the damping diagonal.
    pub fn mass_coefficient(&self) -> f64 {
        self.ratio * 2. * self.reference_frequency
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ratio.is_finite() && self.ratio >= 0.) {
            return Err(Error::InvalidDamping(format!(
                "ratio must be non-negative, got {}",
                self.ratio
            )));
        }
        if !(self.reference_frequency.is_finite() && self.reference_frequency >= 0.) {
            return Err(Error::InvalidDamping(format!(
                "reference frequency must be non-negative, got {}",
                self.reference_frequency
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub damping: DampingModel,
    /// Fail with [`Error::UnstableTimeStep`] as soon as U or V is non-finite.
    pub check_finite: bool,
}

//------------------------------------------------------------------------------
// Time grid
//------------------------------------------------------------------------------

/// Integer number of steps covering a requested duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    /// Requested duration
    pub duration: f64,
    /// `round(duration / requested dt)`
    pub rounded_steps: usize,
    /// Steps actually taken
    pub num_steps: usize,
    /// Adjusted time step
    pub dt: f64,
}

impl TimeGrid {
    /// Rounds `duration / dt` to a step count. If that count falls short of
    /// the duration, dt shrinks to `duration / (count + 1)` and one more step
    /// is taken, so the final time is never before `duration`.
    pub fn new(duration: f64, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.) {
            return Err(Error::InvalidTimeStep(dt));
        }
        if !(duration.is_finite() && duration >= 0.) {
            return Err(Error::InvalidDuration(duration));
        }

        // Step count must fit with room for the extra adjusted step
        let steps = (duration / dt).round();
        if !(steps < usize::MAX as f64) {
            return Err(Error::InvalidTimeStep(dt));
        }
        let rounded_steps = steps as usize;
        let (num_steps, dt) = if (rounded_steps as f64) * dt < duration {
            let num_steps = rounded_steps
                .checked_add(1)
                .ok_or(Error::InvalidTimeStep(dt))?;
            (num_steps, duration / num_steps as f64)
        } else {
            (rounded_steps, dt)
        };

        Ok(TimeGrid {
            duration,
            rounded_steps,
            num_steps,
            dt,
        })
    }

    /// Time at the end of the last step
    pub fn end_time(&self) -> f64 {
        self.num_steps as f64 * self.dt
    }
}

//------------------------------------------------------------------------------
// State
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub t: f64,     // time
    pub u: VectorD, // displacement
    pub v: VectorD, // velocity
    pub a: VectorD, // acceleration
}

impl State {
    pub fn new(ndofs: usize) -> Self {
        State {
            t: 0.,
            u: VectorD::zeros(ndofs),
            v: VectorD::zeros(ndofs),
            a: VectorD::zeros(ndofs),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.u.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub num_steps: usize,
    pub dt: f64,
    pub final_time: f64,
}

//------------------------------------------------------------------------------
// Solver
//------------------------------------------------------------------------------

/// Central-difference integrator for `M a + C v + K u = f(t)` with lumped
/// mass and mass-proportional damping.
///
/// The solver never factorizes a matrix: each step costs one sparse product
/// `K u` plus O(n) vector updates. It is conditionally stable and does not
/// check the time step against the critical step.
pub struct CentralDifferenceSolver<'a> {
    system: &'a StructuralSystem,
    config: IntegratorConfig,
    grid: TimeGrid,
    damping: VectorD,      // damping diagonal
    inv_mass_eff: VectorD, // 1 / (m + dt/2 c)
    force: VectorD,        // residual force
    elastic: VectorD,      // K u
    pub state: State,
}

impl<'a> CentralDifferenceSolver<'a> {
    pub fn new(
        system: &'a StructuralSystem,
        config: IntegratorConfig,
        duration: f64,
        dt: f64,
    ) -> Result<Self> {
        config.damping.validate()?;
        let grid = TimeGrid::new(duration, dt)?;
        let n = system.ndofs();

        // Damping diagonal and effective inverse mass
        let damping: VectorD = system.mass() * config.damping.mass_coefficient();
        let inv_mass_eff: VectorD = VectorD::from_iterator(
            n,
            izip!(system.mass().iter(), damping.iter())
                .map(|(&m, &c)| 1. / (m + 0.5 * grid.dt * c)),
        );

        Ok(CentralDifferenceSolver {
            system,
            config,
            grid,
            damping,
            inv_mass_eff,
            force: VectorD::zeros(n),
            elastic: VectorD::zeros(n),
            state: State::new(n),
        })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn damping_diagonal(&self) -> &VectorD {
        &self.damping
    }

    /// Sets the state at t = 0.
    ///
    /// The initial acceleration is `f(0) / (m + dt/2 c)`; the elastic and
    /// damping forces of the initial state are not included, which is exact
    /// only when `u0` is stress-free and `v0` is zero or damping is off.
    pub fn initialize(
        &mut self,
        u0: &VectorD,
        v0: &VectorD,
        force: &impl ForceGenerator,
    ) -> Result<()> {
        self.system.check_len("initial displacement", u0)?;
        self.system.check_len("initial velocity", v0)?;
        force.check(self.system)?;

        self.state.t = 0.;
        self.state.u.copy_from(u0);
        self.state.v.copy_from(v0);

        self.force.fill(0.);
        force.generate(&mut self.force, 0.);
        self.state.a.copy_from(&self.force);
        self.state.a.component_mul_assign(&self.inv_mass_eff);
        Ok(())
    }

    /// Advances the state by one time step.
    pub fn step(&mut self, force: &impl ForceGenerator) {
        let dt = self.grid.dt;
        let half_dt = 0.5 * dt;
        let State { t, u, v, a } = &mut self.state;

        // Increment time
        *t += dt;

        // Displacement update
        for (ui, &vi, &ai) in izip!(u.iter_mut(), v.iter(), a.iter()) {
            *ui += dt * vi + half_dt * dt * ai;
        }

        // External and elastic forces at the new time
        self.force.fill(0.);
        force.generate(&mut self.force, *t);
        self.system.stiffness_product(u, &mut self.elastic);

        // Residual force, half velocity update with the old acceleration, new
        // acceleration, and second half velocity update
        for (fi, &ei, &ci, &mi, vi, ai) in izip!(
            self.force.iter_mut(),
            self.elastic.iter(),
            self.damping.iter(),
            self.inv_mass_eff.iter(),
            v.iter_mut(),
            a.iter_mut()
        ) {
            *fi -= ei + ci * (*vi + half_dt * *ai);
            *vi += half_dt * *ai;
            *ai = mi * *fi;
            *vi += half_dt * *ai;
        }
    }

    /// Runs from the initial conditions to the end of the time grid, calling
    /// the observer after initialization and after every step.
    pub fn solve(
        &mut self,
        u0: &VectorD,
        v0: &VectorD,
        force: &impl ForceGenerator,
        observer: &mut impl Observer,
    ) -> Result<RunSummary> {
        observer.check(self.system)?;
        self.initialize(u0, v0, force)?;

        info!(
            "central difference: {} dofs, {} steps, dt = {:.6e}",
            self.system.ndofs(),
            self.grid.num_steps,
            self.grid.dt
        );

        observer.observe(0, &self.state.u, &self.state.v, self.state.t);

        for step in 1..=self.grid.num_steps {
            self.step(force);
            trace!("step {} t = {:.6e}", step, self.state.t);

            if self.config.check_finite && !self.state.is_finite() {
                return Err(Error::UnstableTimeStep {
                    step,
                    time: self.state.t,
                });
            }

            observer.observe(step, &self.state.u, &self.state.v, self.state.t);
        }

        info!("central difference: finished at t = {:.6e}", self.state.t);

        Ok(RunSummary {
            num_steps: self.grid.num_steps,
            dt: self.grid.dt,
            final_time: self.state.t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::ZeroLoad;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn sdof(k: f64, m: f64) -> StructuralSystem {
        let mut coo = TripletMatrix::new(1, 1);
        coo.push(0, 0, k);
        StructuralSystem::new(SparseMatrix::from(&coo), dvector![m]).unwrap()
    }

    #[test]
    fn test_time_grid_adjustment() {
        let grid = TimeGrid::new(1.0, 0.3).unwrap();
        assert_eq!(grid.rounded_steps, 3);
        assert_eq!(grid.num_steps, 4);
        assert_eq!(grid.dt, 0.25);
        assert_eq!(grid.end_time(), 1.0);
    }

    #[test]
    fn test_time_grid_without_adjustment() {
        // round(2.86) = 3 and 3 * 0.35 already covers the duration
        let grid = TimeGrid::new(1.0, 0.35).unwrap();
        assert_eq!(grid.rounded_steps, 3);
        assert_eq!(grid.num_steps, 3);
        assert_eq!(grid.dt, 0.35);

        let grid = TimeGrid::new(0., 0.1).unwrap();
        assert_eq!(grid.num_steps, 0);

        let grid = TimeGrid::new(1.0, 3.0).unwrap();
        assert_eq!(grid.rounded_steps, 0);
        assert_eq!(grid.num_steps, 1);
        assert_eq!(grid.dt, 1.0);
    }

    #[test]
    fn test_time_grid_rejects_unrepresentable_step_count() {
        assert!(matches!(
            TimeGrid::new(1.0, 1e-320),
            Err(Error::InvalidTimeStep(_))
        ));
        assert!(matches!(
            TimeGrid::new(1e300, 1e-10),
            Err(Error::InvalidTimeStep(_))
        ));
    }

    #[test]
    fn test_time_grid_rejects_bad_input() {
        assert!(matches!(TimeGrid::new(1., 0.), Err(Error::InvalidTimeStep(_))));
        assert!(matches!(TimeGrid::new(1., -0.1), Err(Error::InvalidTimeStep(_))));
        assert!(matches!(TimeGrid::new(1., f64::NAN), Err(Error::InvalidTimeStep(_))));
        assert!(matches!(TimeGrid::new(-1., 0.1), Err(Error::InvalidDuration(_))));
    }

    #[test]
    fn test_damping_coefficients() {
        let sys = sdof(4., 2.);
        let config = IntegratorConfig {
            damping: DampingModel::new(0.05, 10.),
            check_finite: false,
        };
        let solver = CentralDifferenceSolver::new(&sys, config, 1., 0.1).unwrap();
        assert_relative_eq!(solver.damping_diagonal()[0], 2., epsilon = 1e-14);
        assert_relative_eq!(solver.inv_mass_eff[0], 1. / 2.1, epsilon = 1e-14);
    }

    #[test]
    fn test_rejects_negative_damping() {
        let sys = sdof(4., 2.);
        let config = IntegratorConfig {
            damping: DampingModel::new(-0.1, 10.),
            check_finite: false,
        };
        assert!(matches!(
            CentralDifferenceSolver::new(&sys, config, 1., 0.1),
            Err(Error::InvalidDamping(_))
        ));
    }

    #[test]
    fn test_initial_acceleration_ignores_stiffness() {
        let sys = sdof(4., 2.);
        let mut solver = CentralDifferenceSolver::new(&sys, Default::default(), 1., 0.1).unwrap();
        let push = |f: &mut VectorD, _t: f64| f.fill(6.);
        solver.initialize(&dvector![1.], &dvector![0.], &push).unwrap();
        assert_eq!(solver.state.a, dvector![3.]);
    }

    #[test]
    fn test_rejects_wrong_initial_length() {
        let sys = sdof(4., 2.);
        let mut solver = CentralDifferenceSolver::new(&sys, Default::default(), 1., 0.1).unwrap();
        let err = solver
            .initialize(&dvector![1., 2.], &dvector![0.], &ZeroLoad)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { found: 2, .. }));
    }

    #[test]
    fn test_single_step() {
        // k = 4, m = 1, u0 = 0, v0 = 1, no load
        let sys = sdof(4., 1.);
        let mut solver = CentralDifferenceSolver::new(&sys, Default::default(), 1., 0.1).unwrap();
        solver.initialize(&dvector![0.], &dvector![1.], &ZeroLoad).unwrap();
        solver.step(&ZeroLoad);

        // u1 = 0.1, a1 = -0.4, v1 = 1 + 0.05 * (0 - 0.4)
        assert_relative_eq!(solver.state.t, 0.1, epsilon = 1e-14);
        assert_relative_eq!(solver.state.u[0], 0.1, epsilon = 1e-14);
        assert_relative_eq!(solver.state.a[0], -0.4, epsilon = 1e-14);
        assert_relative_eq!(solver.state.v[0], 0.98, epsilon = 1e-14);
    }
}
