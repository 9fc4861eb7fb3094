//! Time-varying external loads.
//!
//! A [`ForceGenerator`] fills the nodal force vector for a given instant. It
//! must be a pure function of time: the integrator may call it any number of
//! times and expects the same answer for the same `t`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prelude::*;
use crate::system::StructuralSystem;

/// Writes the external force at time `t` into `out`, overwriting it.
///
/// The integrator zeroes `out` before each call, so entries a generator
/// leaves untouched carry no load.
pub trait ForceGenerator {
    fn generate(&self, out: &mut VectorD, t: f64);

    /// Checks that the generator fits the system; called once before a run.
    fn check(&self, _system: &StructuralSystem) -> Result<()> {
        Ok(())
    }
}

impl<F> ForceGenerator for F
where
    F: Fn(&mut VectorD, f64),
{
    fn generate(&self, out: &mut VectorD, t: f64) {
        self(out, t)
    }
}

/// No external load
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroLoad;

impl ForceGenerator for ZeroLoad {
    fn generate(&self, out: &mut VectorD, _t: f64) {
        out.fill(0.);
    }
}

//------------------------------------------------------------------------------
// Envelopes
//------------------------------------------------------------------------------

/// Scalar time history multiplying a spatial load pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Constant {
        amplitude: f64,
    },
    /// Single positive half sine lasting `duration` seconds
    HalfSine { amplitude: f64, duration: f64 },
    /// Hann-windowed sine carrier of `frequency` Hz lasting `cycles` periods
    ToneBurst {
        amplitude: f64,
        frequency: f64,
        cycles: f64,
    },
}

impl Envelope {
    pub fn value(&self, t: f64) -> f64 {
        match *self {
            Envelope::Constant { amplitude } => amplitude,
            Envelope::HalfSine {
                amplitude,
                duration,
            } => {
                if (0. ..=duration).contains(&t) {
                    amplitude * (PI * t / duration).sin()
                } else {
                    0.
                }
            }
            Envelope::ToneBurst {
                amplitude,
                frequency,
                cycles,
            } => {
                if (0. ..=cycles / frequency).contains(&t) {
                    let phase = 2. * PI * frequency * t;
                    let window = 0.5 * (1. - (phase / cycles).cos());
                    amplitude * window * phase.sin()
                } else {
                    0.
                }
            }
        }
    }

    /// Time after which the envelope is identically zero, if any.
    pub fn duration(&self) -> Option<f64> {
        match *self {
            Envelope::Constant { .. } => None,
            Envelope::HalfSine { duration, .. } => Some(duration),
            Envelope::ToneBurst {
                frequency, cycles, ..
            } => Some(cycles / frequency),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Envelope::Constant { amplitude } => amplitude.is_finite(),
            Envelope::HalfSine {
                amplitude,
                duration,
            } => amplitude.is_finite() && duration.is_finite() && duration > 0.,
            Envelope::ToneBurst {
                amplitude,
                frequency,
                cycles,
            } => {
                amplitude.is_finite()
                    && frequency.is_finite()
                    && frequency > 0.
                    && cycles.is_finite()
                    && cycles > 0.
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!("invalid load envelope {:?}", self)))
        }
    }
}

//------------------------------------------------------------------------------
// Pattern load
//------------------------------------------------------------------------------

/// Fixed spatial load pattern scaled by an envelope: `f(t) = p * e(t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternLoad {
    pub pattern: VectorD,
    pub envelope: Envelope,
}

impl PatternLoad {
    pub fn new(pattern: VectorD, envelope: Envelope) -> Result<Self> {
        envelope.validate()?;
        Ok(PatternLoad { pattern, envelope })
    }

    /// Unit load at a single degree of freedom
    pub fn point(ndofs: usize, dof: usize, envelope: Envelope) -> Result<Self> {
        if dof >= ndofs {
            return Err(Error::InvalidConfig(format!(
                "load dof {} out of range for {} dofs",
                dof, ndofs
            )));
        }
        let mut pattern = VectorD::zeros(ndofs);
        pattern[dof] = 1.;
        Self::new(pattern, envelope)
    }
}

impl ForceGenerator for PatternLoad {
    fn generate(&self, out: &mut VectorD, t: f64) {
        out.copy_from(&self.pattern);
        *out *= self.envelope.value(t);
    }

    fn check(&self, system: &StructuralSystem) -> Result<()> {
        system.check_len("load pattern", &self.pattern)
    }
}
