//! Per-step observers.
//!
//! An [`Observer`] is called once after initialization (step 0) and once
//! after every completed step. It sees the state through shared references
//! and cannot change it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prelude::*;
use crate::system::StructuralSystem;

pub trait Observer {
    fn observe(&mut self, step: usize, u: &VectorD, v: &VectorD, t: f64);

    /// Checks that the observer fits the system; called once before a run.
    fn check(&self, _system: &StructuralSystem) -> Result<()> {
        Ok(())
    }
}

impl<F> Observer for F
where
    F: FnMut(usize, &VectorD, &VectorD, f64),
{
    fn observe(&mut self, step: usize, u: &VectorD, v: &VectorD, t: f64) {
        self(step, u, v, t)
    }
}

//------------------------------------------------------------------------------
// Degree of freedom history
//------------------------------------------------------------------------------

/// Records the displacement of selected degrees of freedom at every step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DofHistory {
    pub dofs: Vec<usize>,
    pub times: Vec<f64>,
    /// One row per step, one column per entry of `dofs`
    pub values: Vec<Vec<f64>>,
}

impl DofHistory {
    pub fn new(dofs: Vec<usize>) -> Self {
        DofHistory {
            dofs,
            ..Default::default()
        }
    }

    /// Time series of the `i`-th recorded dof
    pub fn series(&self, i: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[i]).collect()
    }
}

impl Observer for DofHistory {
    fn observe(&mut self, _step: usize, u: &VectorD, _v: &VectorD, t: f64) {
        self.times.push(t);
        self.values.push(self.dofs.iter().map(|&d| u[d]).collect());
    }

    fn check(&self, system: &StructuralSystem) -> Result<()> {
        match self.dofs.iter().find(|&&d| d >= system.ndofs()) {
            Some(d) => Err(Error::InvalidConfig(format!(
                "history dof {} out of range for {} dofs",
                d,
                system.ndofs()
            ))),
            None => Ok(()),
        }
    }
}

//------------------------------------------------------------------------------
// Snapshots
//------------------------------------------------------------------------------

/// Full state at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: usize,
    pub t: f64,
    pub u: VectorD,
    pub v: VectorD,
}

/// Keeps a copy of the full state every `stride` steps, starting at step 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RecorderFields")]
pub struct SnapshotRecorder {
    stride: usize,
    pub snapshots: Vec<Snapshot>,
}

#[derive(Deserialize)]
struct RecorderFields {
    stride: usize,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

impl TryFrom<RecorderFields> for SnapshotRecorder {
    type Error = Error;

    fn try_from(fields: RecorderFields) -> Result<Self> {
        let mut recorder = SnapshotRecorder::new(fields.stride)?;
        recorder.snapshots = fields.snapshots;
        Ok(recorder)
    }
}

impl SnapshotRecorder {
    pub fn new(stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::InvalidConfig(
                "snapshot stride must be at least 1".to_string(),
            ));
        }
        Ok(SnapshotRecorder {
            stride,
            snapshots: Vec::new(),
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Serializes the recorded snapshots as JSON for external
    /// post-processing.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshots)?)
    }
}

impl Observer for SnapshotRecorder {
    fn observe(&mut self, step: usize, u: &VectorD, v: &VectorD, t: f64) {
        if step % self.stride == 0 {
            self.snapshots.push(Snapshot {
                step,
                t,
                u: u.clone(),
                v: v.clone(),
            });
        }
    }
}

//------------------------------------------------------------------------------
// Energy
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    pub step: usize,
    pub t: f64,
    pub kinetic: f64,
    pub strain: f64,
}

impl EnergyRecord {
    pub fn total(&self) -> f64 {
        self.kinetic + self.strain
    }
}

/// Records kinetic and strain energy at every step.
pub struct EnergyHistory<'a> {
    system: &'a StructuralSystem,
    pub records: Vec<EnergyRecord>,
}

impl<'a> EnergyHistory<'a> {
    pub fn new(system: &'a StructuralSystem) -> Self {
        EnergyHistory {
            system,
            records: Vec::new(),
        }
    }

    pub fn totals(&self) -> Vec<f64> {
        self.records.iter().map(EnergyRecord::total).collect()
    }
}

impl Observer for EnergyHistory<'_> {
    fn observe(&mut self, step: usize, u: &VectorD, v: &VectorD, t: f64) {
        self.records.push(EnergyRecord {
            step,
            t,
            kinetic: self.system.kinetic_energy(v),
            strain: self.system.strain_energy(u),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_dof_history() {
        let mut hist = DofHistory::new(vec![2, 0]);
        hist.observe(0, &dvector![1., 2., 3.], &dvector![0., 0., 0.], 0.);
        hist.observe(1, &dvector![4., 5., 6.], &dvector![0., 0., 0.], 0.1);
        assert_eq!(hist.times, vec![0., 0.1]);
        assert_eq!(hist.series(0), vec![3., 6.]);
        assert_eq!(hist.series(1), vec![1., 4.]);
    }

    #[test]
    fn test_snapshot_stride() {
        let mut rec = SnapshotRecorder::new(3).unwrap();
        for step in 0..8 {
            rec.observe(step, &dvector![step as f64], &dvector![0.], step as f64);
        }
        let steps: Vec<usize> = rec.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 3, 6]);
        assert_eq!(rec.snapshots[1].u, dvector![3.]);
        assert!(rec.to_json().unwrap().starts_with('['));
    }

    #[test]
    fn test_snapshot_zero_stride() {
        assert!(SnapshotRecorder::new(0).is_err());
    }

    #[test]
    fn test_snapshot_recorder_from_json() {
        let err = serde_json::from_str::<SnapshotRecorder>(r#"{"stride": 0, "snapshots": []}"#);
        assert!(err.is_err());

        let mut rec: SnapshotRecorder = serde_json::from_str(r#"{"stride": 2}"#).unwrap();
        assert_eq!(rec.stride(), 2);
        rec.observe(0, &dvector![1.], &dvector![0.], 0.);
        rec.observe(1, &dvector![2.], &dvector![0.], 0.1);
        assert_eq!(rec.snapshots.len(), 1);
    }

    #[test]
    fn test_dof_history_check() {
        let mut k = TripletMatrix::new(2, 2);
        k.push(0, 0, 1.);
        k.push(1, 1, 1.);
        let sys = StructuralSystem::new(SparseMatrix::from(&k), dvector![1., 1.]).unwrap();
        assert!(DofHistory::new(vec![0, 1]).check(&sys).is_ok());
        assert!(matches!(
            DofHistory::new(vec![1, 2]).check(&sys),
            Err(Error::InvalidConfig(_))
        ));
    }
}
