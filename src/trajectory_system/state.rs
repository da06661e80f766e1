use std::fmt;
use std::str::FromStr;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::errors::SimulationError;

use super::events::EventKind;

pub const STATE_SIZE: usize = 13;

/// `[x, y, z, vx, vy, vz, e0, e1, e2, e3, w1, w2, w3]`: inertial position
/// and velocity (z up), the body-to-inertial attitude quaternion with the
/// scalar first, and body-frame angular velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector(pub [f64; STATE_SIZE]);

impl StateVector {
    pub fn new(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        attitude: UnitQuaternion<f64>,
        angular_velocity: Vector3<f64>,
    ) -> Self {
        let q = attitude.into_inner();
        StateVector([
            position.x,
            position.y,
            position.z,
            velocity.x,
            velocity.y,
            velocity.z,
            q.w,
            q.i,
            q.j,
            q.k,
            angular_velocity.x,
            angular_velocity.y,
            angular_velocity.z,
        ])
    }

    pub fn zeros() -> Self {
        StateVector([0.0; STATE_SIZE])
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.0[3], self.0[4], self.0[5])
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        Vector3::new(self.0[10], self.0[11], self.0[12])
    }

    pub fn altitude(&self) -> f64 {
        self.0[2]
    }

    pub fn vertical_velocity(&self) -> f64 {
        self.0[5]
    }

    pub fn speed(&self) -> f64 {
        self.velocity().norm()
    }

    /// Raw attitude components, not normalized.
    pub fn quaternion(&self) -> Quaternion<f64> {
        Quaternion::new(self.0[6], self.0[7], self.0[8], self.0[9])
    }

    /// Normalized attitude. A zero quaternion (e.g. `StateVector::zeros()`)
    /// has no orientation and is rejected with `PhysicsError`, so a state
    /// must be built with a valid attitude before any derivative is taken.
    pub fn attitude(&self) -> Result<UnitQuaternion<f64>, SimulationError> {
        let q = self.quaternion();
        if q.norm() <= f64::EPSILON {
            return Err(SimulationError::PhysicsError(
                "attitude quaternion has zero norm".to_string(),
            ));
        }
        Ok(UnitQuaternion::from_quaternion(q))
    }

    pub fn set_position(&mut self, position: &Vector3<f64>) {
        self.0[0..3].copy_from_slice(position.as_slice());
    }

    pub fn set_velocity(&mut self, velocity: &Vector3<f64>) {
        self.0[3..6].copy_from_slice(velocity.as_slice());
    }

    pub fn set_quaternion(&mut self, q: &Quaternion<f64>) {
        self.0[6..10].copy_from_slice(&[q.w, q.i, q.j, q.k]);
    }

    pub fn set_angular_velocity(&mut self, omega: &Vector3<f64>) {
        self.0[10..13].copy_from_slice(omega.as_slice());
    }

    /// Rescales the attitude to unit norm and returns the norm it had.
    pub fn renormalize_attitude(&mut self) -> Result<f64, SimulationError> {
        let q = self.quaternion();
        let norm = q.norm();
        if norm <= f64::EPSILON {
            return Err(SimulationError::PhysicsError(
                "attitude quaternion has zero norm".to_string(),
            ));
        }
        self.set_quaternion(&(q / norm));
        Ok(norm)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Translational only, or translational plus rotational dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SimulationMode {
    ThreeDof,
    #[default]
    SixDof,
}

impl FromStr for SimulationMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3 DOF" => Ok(SimulationMode::ThreeDof),
            "6 DOF" => Ok(SimulationMode::SixDof),
            other => Err(SimulationError::InvalidSimulationMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for SimulationMode {
    type Error = SimulationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationMode::ThreeDof => write!(f, "3 DOF"),
            SimulationMode::SixDof => write!(f, "6 DOF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Rail,
    PoweredAscent,
    UnpoweredAscent,
    ApogeeToEvent,
    ParachuteDescent { parachute: usize },
    Terminated,
}

impl PhaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Rail => "RAIL",
            PhaseKind::PoweredAscent => "POWERED",
            PhaseKind::UnpoweredAscent => "COAST",
            PhaseKind::ApogeeToEvent => "APOGEE",
            PhaseKind::ParachuteDescent { .. } => "PARACHUTE",
            PhaseKind::Terminated => "TERMINATED",
        }
    }

    /// Phases integrated with the configured free-flight dynamics.
    pub fn is_free_flight(&self) -> bool {
        matches!(
            self,
            PhaseKind::PoweredAscent | PhaseKind::UnpoweredAscent | PhaseKind::ApogeeToEvent
        )
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A contiguous time interval governed by one derivative function.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub kind: PhaseKind,
    pub start_time: f64,
    pub start_state: StateVector,
    pub end_time: f64,
    pub ended_by: Option<EventKind>,
}

impl PhaseRecord {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}
