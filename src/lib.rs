//! Explicit transient dynamics for thin-shell structures under impulsive
//! loading.
//!
//! The crate consumes an externally assembled sparse stiffness matrix and a
//! lumped mass matrix, estimates the highest natural frequency to bound the
//! stable time step, and marches the equations of motion forward with the
//! central-difference scheme.

pub mod config;
pub mod error;
pub mod load;
pub mod observer;
pub mod prelude;
pub mod simulation;
pub mod solver;
pub mod system;

pub use config::SimulationConfig;
pub use error::{Error, Result};
pub use load::{Envelope, ForceGenerator, PatternLoad, ZeroLoad};
pub use observer::{DofHistory, EnergyHistory, Observer, Snapshot, SnapshotRecorder};
pub use simulation::Simulation;
pub use solver::{
    CentralDifferenceSolver, DampingModel, IntegratorConfig, PowerIterationConfig, RunSummary,
    SpectralEstimate, SpectralRadiusEstimator, State, TimeGrid,
};
pub use system::StructuralSystem;
