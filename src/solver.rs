pub mod explicit;
pub mod spectral;

pub use explicit::{
    CentralDifferenceSolver, DampingModel, IntegratorConfig, RunSummary, State, TimeGrid,
};
pub use spectral::{PowerIterationConfig, SpectralEstimate, SpectralRadiusEstimator};
