use crate::error::{Error, Result};
use crate::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Semi-discrete structural system: sparse stiffness K and lumped mass M
/// over a fixed number of free degrees of freedom.
///
/// Both matrices come from an external assembler and are read-only for the
/// lifetime of the system. Only the diagonal of M is kept.
#[derive(Debug, Clone)]
pub struct StructuralSystem {
    stiffness: SparseMatrix,
    mass: VectorD,
}

impl StructuralSystem {
    /// Creates a system from a stiffness matrix and the lumped mass diagonal.
    pub fn new(stiffness: SparseMatrix, mass: VectorD) -> Result<Self> {
        if stiffness.nrows() != stiffness.ncols() {
            return Err(Error::NotSquare {
                rows: stiffness.nrows(),
                cols: stiffness.ncols(),
            });
        }
        if mass.len() != stiffness.nrows() {
            return Err(Error::DimensionMismatch {
                what: "mass diagonal",
                expected: stiffness.nrows(),
                found: mass.len(),
            });
        }
        if let Some((dof, &value)) = mass
            .iter()
            .enumerate()
            .find(|(_, &m)| !(m.is_finite() && m > 0.))
        {
            return Err(Error::NonPositiveMass { dof, value });
        }
        Ok(StructuralSystem { stiffness, mass })
    }

    /// Creates a system from a sparse mass matrix by extracting its diagonal.
    /// Off-diagonal mass terms are ignored.
    pub fn from_mass_matrix(stiffness: SparseMatrix, mass: &SparseMatrix) -> Result<Self> {
        if mass.nrows() != mass.ncols() {
            return Err(Error::NotSquare {
                rows: mass.nrows(),
                cols: mass.ncols(),
            });
        }
        let mut diagonal = VectorD::zeros(mass.nrows());
        for (i, j, &v) in mass.triplet_iter() {
            if i == j {
                diagonal[i] += v;
            }
        }
        Self::new(stiffness, diagonal)
    }

    /// Number of degrees of freedom
    pub fn ndofs(&self) -> usize {
        self.mass.len()
    }

    pub fn stiffness(&self) -> &SparseMatrix {
        &self.stiffness
    }

    pub fn mass(&self) -> &VectorD {
        &self.mass
    }

    /// Computes `out = K * x`.
    ///
    /// Rows are independent; with the `parallel` feature they are
    /// partitioned across the rayon pool. Each row is summed in storage
    /// order in both paths so the result does not depend on the feature.
    pub fn stiffness_product(&self, x: &VectorD, out: &mut VectorD) {
        debug_assert_eq!(x.len(), self.ndofs());
        debug_assert_eq!(out.len(), self.ndofs());

        let offsets = self.stiffness.row_offsets();
        let cols = self.stiffness.col_indices();
        let vals = self.stiffness.values();
        let x = x.as_slice();

        let row_dot = |i: usize| -> f64 {
            let range = offsets[i]..offsets[i + 1];
            cols[range.clone()]
                .iter()
                .zip(&vals[range])
                .map(|(&j, &k)| k * x[j])
                .sum()
        };

        #[cfg(feature = "parallel")]
        out.as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, y)| *y = row_dot(i));

        #[cfg(not(feature = "parallel"))]
        out.as_mut_slice()
            .iter_mut()
            .enumerate()
            .for_each(|(i, y)| *y = row_dot(i));
    }

    /// Returns `x^T K x`.
    pub fn stiffness_quadratic_form(&self, x: &VectorD) -> f64 {
        let mut kx = VectorD::zeros(self.ndofs());
        self.stiffness_product(x, &mut kx);
        x.dot(&kx)
    }

    /// Returns `x^T M x`.
    pub fn mass_quadratic_form(&self, x: &VectorD) -> f64 {
        izip!(x.iter(), self.mass.iter())
            .map(|(&xi, &mi)| mi * xi * xi)
            .sum()
    }

    /// Kinetic energy `1/2 v^T M v`
    pub fn kinetic_energy(&self, v: &VectorD) -> f64 {
        0.5 * self.mass_quadratic_form(v)
    }

    /// Elastic strain energy `1/2 u^T K u`
    pub fn strain_energy(&self, u: &VectorD) -> f64 {
        0.5 * self.stiffness_quadratic_form(u)
    }

    /// Checks that a state vector matches the number of degrees of freedom.
    pub(crate) fn check_len(&self, what: &'static str, x: &VectorD) -> Result<()> {
        if x.len() != self.ndofs() {
            return Err(Error::DimensionMismatch {
                what,
                expected: self.ndofs(),
                found: x.len(),
            });
        }
        Ok(())
    }
}
