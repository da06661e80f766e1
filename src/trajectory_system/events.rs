//! Phase-ending conditions and their location inside an accepted step.
//!
//! Each trigger is a scalar function `g(t, y)` whose zero crossing in a
//! given direction ends the current phase. Crossings are detected from the
//! sign of `g` at both ends of a step and refined with Brent's method on the
//! step's dense output.

use std::fmt;

use log::warn;
use nalgebra::Vector3;

use crate::control::rocket::DeploymentTrigger;
use crate::errors::SimulationError;

use super::integrator::DenseSegment;
use super::state::{StateVector, STATE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDirection {
    /// `g` goes from negative to positive.
    Rising,
    /// `g` goes from positive to negative.
    Falling,
    #[default]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RailExit,
    Burnout,
    Apogee,
    ParachuteTrigger(usize),
    ParachuteInflation(usize),
    Impact,
}

impl EventKind {
    /// Lower values win when two events share a time within the root
    /// tolerance.
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::RailExit => 0,
            EventKind::Burnout => 1,
            EventKind::Apogee => 2,
            EventKind::ParachuteTrigger(_) | EventKind::ParachuteInflation(_) => 3,
            EventKind::Impact => 4,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventKind::RailExit => write!(f, "rail exit"),
            EventKind::Burnout => write!(f, "burnout"),
            EventKind::Apogee => write!(f, "apogee"),
            EventKind::ParachuteTrigger(i) => write!(f, "parachute {} trigger", i),
            EventKind::ParachuteInflation(i) => write!(f, "parachute {} inflation", i),
            EventKind::Impact => write!(f, "impact"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TriggerFunction {
    /// Distance travelled along the rail beyond `length`.
    RailTravel {
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        length: f64,
    },
    Time(f64),
    VerticalVelocity(f64),
    Altitude(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub kind: EventKind,
    pub direction: EventDirection,
    function: TriggerFunction,
}

impl Trigger {
    pub fn rail_exit(origin: Vector3<f64>, direction: Vector3<f64>, length: f64) -> Self {
        Trigger {
            kind: EventKind::RailExit,
            direction: EventDirection::Rising,
            function: TriggerFunction::RailTravel {
                origin,
                direction,
                length,
            },
        }
    }

    pub fn burnout(burn_out_time: f64) -> Self {
        Trigger {
            kind: EventKind::Burnout,
            direction: EventDirection::Rising,
            function: TriggerFunction::Time(burn_out_time),
        }
    }

    pub fn apogee() -> Self {
        Trigger {
            kind: EventKind::Apogee,
            direction: EventDirection::Falling,
            function: TriggerFunction::VerticalVelocity(0.0),
        }
    }

    pub fn impact(elevation: f64) -> Self {
        Trigger {
            kind: EventKind::Impact,
            direction: EventDirection::Falling,
            function: TriggerFunction::Altitude(elevation),
        }
    }

    /// Trigger for a parachute's deployment condition. Apogee deployments are
    /// handled by the apogee event itself and have no trigger of their own.
    pub fn parachute(index: usize, trigger: &DeploymentTrigger, elevation: f64) -> Option<Self> {
        let function = match *trigger {
            DeploymentTrigger::Apogee => return None,
            DeploymentTrigger::Altitude(height) => TriggerFunction::Altitude(elevation + height),
            DeploymentTrigger::DescentRate(rate) => TriggerFunction::VerticalVelocity(rate.abs()),
        };
        Some(Trigger {
            kind: EventKind::ParachuteTrigger(index),
            direction: EventDirection::Falling,
            function,
        })
    }

    pub fn inflation(index: usize, time: f64) -> Self {
        Trigger {
            kind: EventKind::ParachuteInflation(index),
            direction: EventDirection::Rising,
            function: TriggerFunction::Time(time),
        }
    }

    pub fn value(&self, t: f64, state: &StateVector) -> f64 {
        match self.function {
            TriggerFunction::RailTravel {
                origin,
                direction,
                length,
            } => (state.position() - origin).dot(&direction) - length,
            TriggerFunction::Time(target) => t - target,
            TriggerFunction::VerticalVelocity(offset) => state.vertical_velocity() + offset,
            TriggerFunction::Altitude(level) => state.altitude() - level,
        }
    }

    /// The time this trigger fires at, if it depends on time alone.
    pub fn scheduled_time(&self) -> Option<f64> {
        match self.function {
            TriggerFunction::Time(target) => Some(target),
            _ => None,
        }
    }
}

/// Whether `g` crossed zero between two samples in the requested direction.
/// Landing exactly on zero counts; starting on zero does not.
pub fn crossing_detected(g_old: f64, g_new: f64, direction: EventDirection) -> bool {
    if g_old == 0.0 || g_old * g_new > 0.0 {
        return false;
    }
    match direction {
        EventDirection::Rising => g_old < 0.0,
        EventDirection::Falling => g_old > 0.0,
        EventDirection::Any => true,
    }
}

/// Brent's method on a bracketed scalar function.
#[derive(Debug, Clone, Copy)]
pub struct BrentSolver {
    pub tol: f64,
    pub max_iter: usize,
}

impl BrentSolver {
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self { tol, max_iter }
    }

    /// Finds a root of `f` in `[a, b]` given `fa = f(a)` and `fb = f(b)` of
    /// opposite signs. The returned abscissa lies within `tol` of the root on
    /// the side of `b`, so `f` at the result has the sign of `fb` or is zero.
    pub fn find_root<F>(
        &self,
        mut f: F,
        a: f64,
        b: f64,
        fa: f64,
        fb: f64,
    ) -> Result<f64, SimulationError>
    where
        F: FnMut(f64) -> f64,
    {
        if fa * fb > 0.0 {
            return Err(SimulationError::EventFindingFailed(format!(
                "root not bracketed: f({}) = {}, f({}) = {}",
                a, fa, b, fb
            )));
        }
        if fb == 0.0 {
            return Ok(b);
        }
        let target_sign = fb.signum();

        // `lo` keeps the sign of fa and `hi` the sign of fb.
        let (mut lo, mut f_lo) = (a, fa);
        let (mut hi, mut f_hi) = (b, fb);
        // Secant/inverse-quadratic state.
        let (mut x0, mut f0) = (a, fa);
        let (mut x1, mut f1) = (b, fb);
        let (mut x2, mut f2) = (a, fa);
        let mut previous_width = (b - a).abs();

        for _ in 0..self.max_iter {
            if (hi - lo).abs() <= self.tol {
                return Ok(hi);
            }

            let candidate = if f0 != f2 && f1 != f2 && f0 != f1 {
                x0 * f1 * f2 / ((f0 - f1) * (f0 - f2))
                    + x1 * f0 * f2 / ((f1 - f0) * (f1 - f2))
                    + x2 * f0 * f1 / ((f2 - f0) * (f2 - f1))
            } else if f1 != f0 {
                x1 - f1 * (x1 - x0) / (f1 - f0)
            } else {
                0.5 * (lo + hi)
            };

            let (left, right) = if lo < hi { (lo, hi) } else { (hi, lo) };
            let width = right - left;
            let x = if candidate > left && candidate < right && width < 0.5 * previous_width + self.tol {
                candidate
            } else {
                0.5 * (lo + hi)
            };
            previous_width = width;

            let fx = f(x);
            if fx == 0.0 {
                return Ok(x);
            }
            x2 = x0;
            f2 = f0;
            x0 = x1;
            f0 = f1;
            x1 = x;
            f1 = fx;

            if fx.signum() == target_sign {
                hi = x;
                f_hi = fx;
            } else {
                lo = x;
                f_lo = fx;
            }
        }

        warn!(
            "root finding stopped after {} iterations, bracket [{}, {}] with g = ({}, {})",
            self.max_iter, lo, hi, f_lo, f_hi
        );
        Ok(hi)
    }
}

/// The first event inside one accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventCrossing {
    pub kind: EventKind,
    pub t: f64,
    pub state: StateVector,
}

/// Finds the earliest trigger crossing inside `segment`. `g_start` and `g_end`
/// hold each trigger's value at the segment ends. Crossings within the
/// solver tolerance of the earliest one are ordered by
/// [`EventKind::priority`].
pub fn locate_first_event(
    triggers: &[Trigger],
    g_start: &[f64],
    g_end: &[f64],
    segment: &DenseSegment<STATE_SIZE>,
    solver: &BrentSolver,
) -> Result<Option<EventCrossing>, SimulationError> {
    let mut crossings = Vec::new();
    for ((trigger, &g0), &g1) in triggers.iter().zip(g_start).zip(g_end) {
        if !crossing_detected(g0, g1, trigger.direction) {
            continue;
        }
        let t = solver.find_root(
            |t| trigger.value(t, &StateVector(segment.interpolate(t))),
            segment.t0,
            segment.t1,
            g0,
            g1,
        )?;
        crossings.push((t, trigger.kind));
    }

    let earliest = match crossings.iter().map(|c| c.0).reduce(f64::min) {
        Some(t) => t,
        None => return Ok(None),
    };
    let chosen = crossings
        .into_iter()
        .filter(|(t, _)| *t - earliest <= solver.tol)
        .min_by_key(|(_, kind)| kind.priority());

    Ok(chosen.map(|(t, kind)| EventCrossing {
        kind,
        t,
        state: StateVector(segment.interpolate(t)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state_with(z: f64, vz: f64) -> StateVector {
        let mut state = StateVector::zeros();
        state.0[2] = z;
        state.0[5] = vz;
        state.0[6] = 1.0;
        state
    }

    #[test]
    fn test_crossing_detection() {
        assert!(crossing_detected(-1.0, 1.0, EventDirection::Rising));
        assert!(!crossing_detected(1.0, -1.0, EventDirection::Rising));
        assert!(crossing_detected(1.0, -1.0, EventDirection::Falling));
        assert!(!crossing_detected(-1.0, 1.0, EventDirection::Falling));
        assert!(crossing_detected(1.0, -1.0, EventDirection::Any));
        assert!(crossing_detected(-1.0, 0.0, EventDirection::Rising));
        assert!(!crossing_detected(-1.0, 0.0, EventDirection::Falling));
        assert!(!crossing_detected(0.0, 1.0, EventDirection::Rising));
        assert!(!crossing_detected(1.0, 2.0, EventDirection::Any));
    }

    #[test]
    fn test_brent_simple_root() {
        let solver = BrentSolver::new(1e-12, 100);
        let root = solver.find_root(|x| x * x - 2.0, 0.0, 2.0, -2.0, 2.0).unwrap();
        assert!((root - 2.0_f64.sqrt()).abs() < 1e-11);
        assert!(root * root - 2.0 >= 0.0);
    }

    #[test]
    fn test_brent_keeps_post_crossing_side() {
        let solver = BrentSolver::new(1e-6, 100);
        let root = solver.find_root(|x| 1.0 - x, 0.0, 3.0, 1.0, -2.0).unwrap();
        assert!(root >= 1.0 && root - 1.0 <= 1e-6);
    }

    #[test]
    fn test_brent_trigonometric() {
        let solver = BrentSolver::new(1e-12, 100);
        let root = solver.find_root(f64::sin, 3.0, 4.0, 3.0f64.sin(), 4.0f64.sin()).unwrap();
        assert!((root - std::f64::consts::PI).abs() < 1e-11);
    }

    #[test]
    fn test_brent_not_bracketed() {
        let solver = BrentSolver::new(1e-12, 100);
        let result = solver.find_root(|x| x * x + 1.0, -1.0, 1.0, 2.0, 2.0);
        assert!(matches!(result, Err(SimulationError::EventFindingFailed(_))));
    }

    #[test]
    fn test_trigger_values() {
        let state = state_with(120.0, -3.0);
        assert_eq!(Trigger::apogee().value(0.0, &state), -3.0);
        assert_eq!(Trigger::impact(100.0).value(0.0, &state), 20.0);
        assert_eq!(Trigger::burnout(2.5).value(3.0, &state), 0.5);
        assert_eq!(Trigger::burnout(2.5).scheduled_time(), Some(2.5));

        let chute = Trigger::parachute(0, &DeploymentTrigger::Altitude(50.0), 100.0).unwrap();
        assert_eq!(chute.value(0.0, &state), -30.0);
        let chute = Trigger::parachute(1, &DeploymentTrigger::DescentRate(10.0), 0.0).unwrap();
        assert_eq!(chute.value(0.0, &state), 7.0);
        assert!(Trigger::parachute(2, &DeploymentTrigger::Apogee, 0.0).is_none());

        let rail = Trigger::rail_exit(Vector3::zeros(), Vector3::z(), 5.0);
        assert_eq!(rail.value(0.0, &state), 115.0);
    }

    #[test]
    fn test_locate_earliest_event_in_segment() {
        // Ballistic arc z = 10 t - 5 t^2, vz = 10 - 10 t, over [0, 2].
        let mut y0 = state_with(0.0, 10.0).0;
        let mut f0 = [0.0; STATE_SIZE];
        f0[2] = 10.0;
        f0[5] = -10.0;
        let mut y1 = state_with(0.0, -10.0).0;
        let mut f1 = f0;
        f1[2] = -10.0;
        y0[2] = 1e-3;
        y1[2] = -1e-3;

        let segment = DenseSegment {
            t0: 0.0,
            y0,
            f0,
            t1: 2.0,
            y1,
            f1,
        };
        let triggers = [Trigger::impact(0.0), Trigger::apogee()];
        let g_start: Vec<f64> = triggers.iter().map(|tr| tr.value(0.0, &StateVector(y0))).collect();
        let g_end: Vec<f64> = triggers.iter().map(|tr| tr.value(2.0, &StateVector(y1))).collect();
        let solver = BrentSolver::new(1e-10, 100);

        let event = locate_first_event(&triggers, &g_start, &g_end, &segment, &solver)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::Apogee);
        assert_relative_eq!(event.t, 1.0, epsilon = 1e-8);
        assert!(event.state.vertical_velocity() <= 0.0);
    }

    #[test]
    fn test_ties_resolved_by_priority() {
        let y = state_with(10.0, 0.0).0;
        let segment = DenseSegment {
            t0: 0.0,
            y0: y,
            f0: [0.0; STATE_SIZE],
            t1: 1.0,
            y1: y,
            f1: [0.0; STATE_SIZE],
        };
        let triggers = [Trigger::inflation(0, 0.5), Trigger::burnout(0.5)];
        let g_start = [-0.5, -0.5];
        let g_end = [0.5, 0.5];
        let solver = BrentSolver::new(1e-9, 100);
        let event = locate_first_event(&triggers, &g_start, &g_end, &segment, &solver)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::Burnout);
        assert_relative_eq!(event.t, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_no_event() {
        let y = state_with(10.0, 1.0).0;
        let segment = DenseSegment {
            t0: 0.0,
            y0: y,
            f0: [0.0; STATE_SIZE],
            t1: 1.0,
            y1: y,
            f1: [0.0; STATE_SIZE],
        };
        let triggers = [Trigger::apogee()];
        let solver = BrentSolver::new(1e-9, 100);
        assert!(locate_first_event(&triggers, &[1.0], &[1.0], &segment, &solver)
            .unwrap()
            .is_none());
    }
}
