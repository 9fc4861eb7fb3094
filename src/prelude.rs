pub use itertools::izip;

//------------------------------------------------------------------------------
// Types
//------------------------------------------------------------------------------

/// Column vector (Degrees of Freedom)
pub type VectorD = nalgebra::DVector<f64>;

/// Sparse matrix (DOFs x DOFs), compressed row storage
pub type SparseMatrix = nalgebra_sparse::CsrMatrix<f64>;

/// Sparse matrix builder (DOFs x DOFs), coordinate storage
pub type TripletMatrix = nalgebra_sparse::CooMatrix<f64>;
