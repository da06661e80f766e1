//! Time derivative of the flight state for every phase and both dynamics
//! modes.
//!
//! The mode is resolved once, when [`EquationsOfMotion`] is built: a rocket
//! that cannot provide an inertia tensor is flown with point-mass dynamics
//! even when rigid-body dynamics were requested.

use std::fmt;
use std::f64::consts::PI;

use log::warn;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::constants::{ALIGNMENT_TOLERANCE, MIN_FREE_STREAM_SPEED};
use crate::control::environment::Environment;
use crate::control::rocket::RocketBody;
use crate::control::settings::FlightSettings;
use crate::errors::SimulationError;

use super::aerodynamics::{angle_of_attack, Aerodynamics, FlowConditions};
use super::integrator::OdeSystem;
use super::state::{PhaseKind, SimulationMode, StateVector, STATE_SIZE};

/// Quantities computed alongside a derivative, from the same flow state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlightDiagnostics {
    pub mach: f64,
    pub reynolds: f64,
    /// Degrees.
    pub angle_of_attack: f64,
    pub density: f64,
    pub dynamic_pressure: f64,
    pub free_stream_speed: f64,
    pub drag_coefficient: f64,
    pub thrust: f64,
    pub mass: f64,
}

impl FlightDiagnostics {
    fn new(flow: &FlowConditions, angle_of_attack: f64, drag_coefficient: f64, thrust: f64, mass: f64) -> Self {
        FlightDiagnostics {
            mach: flow.mach,
            reynolds: flow.reynolds,
            angle_of_attack,
            density: flow.atmosphere.density,
            dynamic_pressure: flow.dynamic_pressure,
            free_stream_speed: flow.free_stream_speed,
            drag_coefficient,
            thrust,
            mass,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationWarning {
    ModeDowngraded {
        requested: SimulationMode,
        used: SimulationMode,
    },
}

impl fmt::Display for SimulationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationWarning::ModeDowngraded { requested, used } => write!(
                f,
                "{} requested but the rocket has no inertia tensor, flying {}",
                requested, used
            ),
        }
    }
}

/// Launch rail placement. Inclination is measured from the horizon and
/// heading clockwise from north, with x east, y north and z up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailGeometry {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub length: f64,
    /// Travel until the upper rail button leaves the rail.
    pub effective_length: f64,
    pub initial_attitude: UnitQuaternion<f64>,
}

impl RailGeometry {
    pub fn new(
        settings: &FlightSettings,
        elevation: f64,
        rocket: &dyn RocketBody,
    ) -> Result<Self, SimulationError> {
        let inclination = settings.inclination.to_radians();
        let heading = settings.heading.to_radians();
        let direction = Vector3::new(
            inclination.cos() * heading.sin(),
            inclination.cos() * heading.cos(),
            inclination.sin(),
        );

        let effective_length = match rocket.rail_buttons() {
            Some(buttons) => settings.rail_length - (buttons.upper - rocket.nozzle_position()).abs(),
            None => settings.rail_length,
        };
        if effective_length <= 0.0 {
            return Err(SimulationError::InitializationError(format!(
                "rail of {} m is shorter than the button to nozzle distance",
                settings.rail_length
            )));
        }

        let initial_attitude = UnitQuaternion::rotation_between(&Vector3::z(), &direction)
            .ok_or_else(|| {
                SimulationError::InitializationError("rail cannot point straight down".to_string())
            })?;

        Ok(RailGeometry {
            origin: Vector3::new(0.0, 0.0, elevation),
            direction,
            length: settings.rail_length,
            effective_length,
            initial_attitude,
        })
    }

    pub fn initial_state(&self) -> StateVector {
        StateVector::new(self.origin, Vector3::zeros(), self.initial_attitude, Vector3::zeros())
    }
}

/// Attitude rate that turns the body axis toward the direction of travel
/// through the air. The returned quaternion derivative rotates the body about
/// an inertial axis at `coeff * angle` rad/s, where `angle` is the
/// misalignment.
pub fn weathercock_rate(
    attitude: &UnitQuaternion<f64>,
    free_stream_velocity: &Vector3<f64>,
    coeff: f64,
) -> Quaternion<f64> {
    let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    let speed = free_stream_velocity.norm();
    if coeff <= 0.0 || speed < MIN_FREE_STREAM_SPEED {
        return zero;
    }

    let body_axis = attitude * Vector3::z();
    let desired = -free_stream_velocity / speed;
    let cos_angle = body_axis.dot(&desired).clamp(-1.0, 1.0);
    let mut axis = body_axis.cross(&desired);
    let sin_angle = axis.norm();

    let angle = if sin_angle < ALIGNMENT_TOLERANCE {
        if cos_angle > 0.0 {
            return zero;
        }
        // Anti-aligned: any perpendicular axis works; prefer the inertial x axis.
        axis = body_axis.cross(&Vector3::x());
        if axis.norm() < ALIGNMENT_TOLERANCE {
            axis = body_axis.cross(&Vector3::y());
        }
        PI
    } else {
        sin_angle.atan2(cos_angle)
    };

    let omega = axis.normalize() * (coeff * angle);
    Quaternion::from_imag(omega) * attitude.into_inner() * 0.5
}

fn assemble(
    velocity: &Vector3<f64>,
    acceleration: &Vector3<f64>,
    quaternion_rate: &Quaternion<f64>,
    angular_acceleration: &Vector3<f64>,
) -> StateVector {
    let mut derivative = StateVector::zeros();
    derivative.set_position(velocity);
    derivative.set_velocity(acceleration);
    derivative.set_quaternion(quaternion_rate);
    derivative.set_angular_velocity(angular_acceleration);
    derivative
}

fn gravity_vector(gravity: f64) -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -gravity)
}

/// Free-flight dynamics for one mode.
trait FlightDynamics: Send + Sync {
    fn derivative(
        &self,
        rocket: &dyn RocketBody,
        environment: &Environment,
        t: f64,
        state: &StateVector,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError>;
}

/// Translation and rotation of a rigid body with time-varying inertia.
struct RigidBodyDynamics;

impl FlightDynamics for RigidBodyDynamics {
    fn derivative(
        &self,
        rocket: &dyn RocketBody,
        environment: &Environment,
        t: f64,
        state: &StateVector,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        let attitude = state.attitude()?;
        let velocity = state.velocity();
        let omega = state.angular_velocity();

        let mass = rocket.total_mass(t)?;
        let thrust = rocket.thrust(t)?;
        let inertia = rocket.inertia_tensor(t)?.ok_or_else(|| {
            SimulationError::PhysicsError("rigid-body dynamics need an inertia tensor".to_string())
        })?;
        let center_of_mass = rocket.center_of_mass(t)?;

        let aero = Aerodynamics::new(rocket);
        let flow = FlowConditions::at(environment, &state.position(), &velocity, aero.diameter)?;
        let body_axis = attitude * Vector3::z();
        let alpha = angle_of_attack(&body_axis, &flow.free_stream_velocity);
        let cd = aero.drag_coefficient(thrust > 0.0, &flow, alpha)?;

        let stream_body = attitude.inverse_transform_vector(&flow.free_stream_velocity);
        let mut force = Vector3::new(0.0, 0.0, thrust + aero.calculate_axial_drag(&flow, cd));
        let mut moment = Vector3::zeros();
        for surface in rocket.aerodynamic_surfaces() {
            let arm = Vector3::new(0.0, 0.0, surface.center_of_pressure - center_of_mass);
            let local_stream = stream_body - omega.cross(&arm);
            let normal = aero.calculate_normal_force(
                flow.atmosphere.density,
                &local_stream,
                surface.normal_force_slope,
            );
            force += normal;
            moment += arm.cross(&normal);
        }

        let acceleration = attitude * force / mass + gravity_vector(flow.atmosphere.gravity);

        let inverse = inertia.tensor.try_inverse().ok_or_else(|| {
            SimulationError::PhysicsError(format!("singular inertia tensor at t = {}", t))
        })?;
        let angular_momentum = inertia.tensor * omega;
        let angular_acceleration =
            inverse * (moment - inertia.rate * omega - omega.cross(&angular_momentum));

        let quaternion_rate = attitude.into_inner() * Quaternion::from_imag(omega) * 0.5;

        Ok((
            assemble(&velocity, &acceleration, &quaternion_rate, &angular_acceleration),
            FlightDiagnostics::new(&flow, alpha, cd, thrust, mass),
        ))
    }
}

/// Translation of a point mass; the attitude only steers thrust and, with a
/// positive coefficient, relaxes toward the relative wind.
struct PointMassDynamics {
    weathercock_coeff: f64,
}

impl FlightDynamics for PointMassDynamics {
    fn derivative(
        &self,
        rocket: &dyn RocketBody,
        environment: &Environment,
        t: f64,
        state: &StateVector,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        let attitude = state.attitude()?;
        let velocity = state.velocity();

        let mass = rocket.total_mass(t)?;
        let thrust = rocket.thrust(t)?;

        let aero = Aerodynamics::new(rocket);
        let flow = FlowConditions::at(environment, &state.position(), &velocity, aero.diameter)?;
        let body_axis = attitude * Vector3::z();
        let alpha = angle_of_attack(&body_axis, &flow.free_stream_velocity);
        let cd = aero.drag_coefficient(thrust > 0.0, &flow, alpha)?;

        let force = body_axis * thrust + aero.calculate_drag(&flow, cd);
        let acceleration = force / mass + gravity_vector(flow.atmosphere.gravity);
        let quaternion_rate =
            weathercock_rate(&attitude, &flow.free_stream_velocity, self.weathercock_coeff);

        Ok((
            assemble(&velocity, &acceleration, &quaternion_rate, &Vector3::zeros()),
            FlightDiagnostics::new(&flow, alpha, cd, thrust, mass),
        ))
    }
}

pub struct EquationsOfMotion<'a> {
    rocket: &'a dyn RocketBody,
    environment: &'a Environment,
    rail: RailGeometry,
    mode: SimulationMode,
    weathercock_coeff: f64,
    dynamics: Box<dyn FlightDynamics>,
    warnings: Vec<SimulationWarning>,
}

impl<'a> EquationsOfMotion<'a> {
    pub fn new(
        rocket: &'a dyn RocketBody,
        environment: &'a Environment,
        settings: &FlightSettings,
    ) -> Result<Self, SimulationError> {
        settings.validate()?;

        let has_inertia = rocket.attitude_supported() && rocket.inertia_tensor(0.0)?.is_some();
        let mut warnings = Vec::new();
        let mode = match settings.simulation_mode {
            SimulationMode::SixDof if !has_inertia => {
                let warning = SimulationWarning::ModeDowngraded {
                    requested: SimulationMode::SixDof,
                    used: SimulationMode::ThreeDof,
                };
                warn!("{}", warning);
                warnings.push(warning);
                SimulationMode::ThreeDof
            }
            mode => mode,
        };

        let dynamics: Box<dyn FlightDynamics> = match mode {
            SimulationMode::SixDof => Box::new(RigidBodyDynamics),
            SimulationMode::ThreeDof => Box::new(PointMassDynamics {
                weathercock_coeff: settings.weathercock_coeff,
            }),
        };

        Ok(EquationsOfMotion {
            rocket,
            environment,
            rail: RailGeometry::new(settings, environment.elevation, rocket)?,
            mode,
            weathercock_coeff: settings.weathercock_coeff,
            dynamics,
            warnings,
        })
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn weathercock_coeff(&self) -> f64 {
        self.weathercock_coeff
    }

    pub fn rail(&self) -> &RailGeometry {
        &self.rail
    }

    pub fn warnings(&self) -> &[SimulationWarning] {
        &self.warnings
    }

    pub fn derivative(
        &self,
        t: f64,
        state: &StateVector,
        phase: PhaseKind,
    ) -> Result<StateVector, SimulationError> {
        Ok(self.evaluate(t, state, phase)?.0)
    }

    pub fn evaluate(
        &self,
        t: f64,
        state: &StateVector,
        phase: PhaseKind,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        match phase {
            PhaseKind::Rail => self.rail_derivative(t, state),
            PhaseKind::PoweredAscent | PhaseKind::UnpoweredAscent | PhaseKind::ApogeeToEvent => {
                self.dynamics.derivative(self.rocket, self.environment, t, state)
            }
            PhaseKind::ParachuteDescent { parachute } => self.parachute_derivative(t, state, parachute),
            PhaseKind::Terminated => Ok((StateVector::zeros(), FlightDiagnostics::default())),
        }
    }

    /// Motion constrained to the rail, attitude frozen. The rocket does not
    /// slide back down while thrust is below weight.
    fn rail_derivative(
        &self,
        t: f64,
        state: &StateVector,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        let direction = self.rail.direction;
        let speed = state.velocity().dot(&direction);

        let mass = self.rocket.total_mass(t)?;
        let thrust = self.rocket.thrust(t)?;

        let aero = Aerodynamics::new(self.rocket);
        let atmosphere = self.environment.conditions(state.altitude())?;
        let flow = FlowConditions::from_free_stream(atmosphere, -direction * speed, aero.diameter);
        let cd = aero.drag_coefficient(thrust > 0.0, &flow, 0.0)?;
        let drag = aero.calculate_axial_drag(&flow, cd) * speed.signum();

        let mut acceleration = (thrust + drag) / mass - atmosphere.gravity * direction.z;
        if speed <= 0.0 && acceleration < 0.0 {
            acceleration = 0.0;
        }

        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        Ok((
            assemble(&(direction * speed), &(direction * acceleration), &zero, &Vector3::zeros()),
            FlightDiagnostics::new(&flow, 0.0, cd, thrust, mass),
        ))
    }

    fn parachute_derivative(
        &self,
        t: f64,
        state: &StateVector,
        index: usize,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        let parachute = self.rocket.parachutes().get(index).ok_or_else(|| {
            SimulationError::PhysicsError(format!("no parachute with index {}", index))
        })?;
        let velocity = state.velocity();
        let mass = self.rocket.total_mass(t)?;

        let aero = Aerodynamics::new(self.rocket);
        let flow = FlowConditions::at(self.environment, &state.position(), &velocity, aero.diameter)?;
        let acceleration = aero.calculate_drag_with_area(&flow, parachute.cd_s) / mass
            + gravity_vector(flow.atmosphere.gravity);

        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        Ok((
            assemble(&velocity, &acceleration, &zero, &Vector3::zeros()),
            FlightDiagnostics::new(&flow, 0.0, parachute.cd_s / aero.surface_area, 0.0, mass),
        ))
    }

    /// Binds a phase so the integrator sees a plain ODE system.
    pub fn system(&self, phase: PhaseKind) -> PhaseSystem<'_, 'a> {
        PhaseSystem {
            equations: self,
            phase,
        }
    }
}

pub struct PhaseSystem<'e, 'a> {
    equations: &'e EquationsOfMotion<'a>,
    phase: PhaseKind,
}

impl OdeSystem<STATE_SIZE> for PhaseSystem<'_, '_> {
    fn rhs(&self, t: f64, y: &[f64; STATE_SIZE]) -> Result<[f64; STATE_SIZE], SimulationError> {
        Ok(self.equations.derivative(t, &StateVector(*y), self.phase)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::propulsion::Motor;
    use crate::control::rocket::{Parachute, DeploymentTrigger, PointMassRocket, Rocket};
    use crate::utils::grid_function::GridFunction;
    use crate::utils::time_series::VectorTimeSeries;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn point_mass_rocket() -> PointMassRocket {
        point_mass_rocket_with_thrust(10.0)
    }

    fn point_mass_rocket_with_thrust(thrust: f64) -> PointMassRocket {
        let mut rocket =
            PointMassRocket::new(0.05, 2.0, GridFunction::constant(0.5), GridFunction::constant(0.6))
                .unwrap();
        rocket.add_motor(Motor::constant_thrust(thrust, 2.2, 1.0, 0.5).unwrap());
        rocket.add_parachute(Parachute::new("main", 1.0, DeploymentTrigger::Apogee, 0.0));
        rocket
    }

    fn rigid_rocket() -> Rocket {
        let mut rocket = Rocket::new(
            0.0635,
            14.0,
            (6.321, 6.321, 0.034),
            GridFunction::constant(0.45),
            GridFunction::constant(0.5),
            0.0,
        )
        .unwrap();
        rocket.add_motor(Motor::constant_thrust(1500.0, 3.0, 1.5, 2.5).unwrap(), -1.255);
        rocket.add_surface(2.0, 0.7);
        rocket.add_surface(6.0, -1.1);
        rocket
    }

    fn settings(mode: &str, weathercock_coeff: f64) -> FlightSettings {
        let mut settings = FlightSettings::default()
            .with_simulation_mode(mode)
            .unwrap()
            .with_rail(1.0, 85.0, 0.0);
        settings.weathercock_coeff = weathercock_coeff;
        settings
    }

    fn state_with(velocity: Vector3<f64>, q: [f64; 4]) -> StateVector {
        let mut state = StateVector::zeros();
        state.0[2] = 100.0;
        state.set_velocity(&velocity);
        state.0[6..10].copy_from_slice(&q);
        state
    }

    fn quaternion_part(derivative: &StateVector) -> Vector3<f64> {
        Vector3::new(derivative.0[7], derivative.0[8], derivative.0[9])
    }

    #[test]
    fn test_aligned_attitude_has_no_weathercock_rate() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 1.0)).unwrap();
        let state = state_with(
            Vector3::new(50.0, 0.0, 0.0),
            [FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2, 0.0],
        );
        let derivative = eom.derivative(3.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        assert!(derivative.0[6].abs() < 1e-12);
        assert!(quaternion_part(&derivative).norm() < 1e-12);
    }

    #[test]
    fn test_anti_aligned_attitude_rotates() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 1.0)).unwrap();
        let state = state_with(
            Vector3::new(50.0, 0.0, 0.0),
            [FRAC_1_SQRT_2, 0.0, -FRAC_1_SQRT_2, 0.0],
        );
        let derivative = eom.derivative(3.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        let rate = Quaternion::new(derivative.0[6], derivative.0[7], derivative.0[8], derivative.0[9]);
        assert!(rate.norm() > 0.1);
    }

    #[test]
    fn test_misaligned_attitude_rotates_toward_travel() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 1.0)).unwrap();
        let state = state_with(Vector3::new(50.0, 0.0, 0.0), [1.0, 0.0, 0.0, 0.0]);
        let derivative = eom.derivative(3.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        // Turning +z toward +x is a positive rotation about +y.
        assert_relative_eq!(derivative.0[8], 0.5 * PI / 2.0, epsilon = 1e-9);
        assert!(derivative.0[7].abs() < 1e-12);
        assert_eq!(derivative.angular_velocity(), Vector3::zeros());
    }

    #[test]
    fn test_zero_coefficient_freezes_attitude() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 0.0)).unwrap();
        let state = state_with(Vector3::new(50.0, 0.0, 0.0), [1.0, 0.0, 0.0, 0.0]);
        let derivative = eom.derivative(3.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        assert_eq!(derivative.quaternion(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_weathercock_rate_anti_aligned_with_x_axis_body() {
        // Body axis along +x, travel along -x: the x pivot is degenerate, y is used.
        let attitude = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI / 2.0);
        let rate = weathercock_rate(&attitude, &Vector3::new(50.0, 0.0, 0.0), 1.0);
        assert!(rate.norm() > 0.1);
        assert!(rate.coords.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_point_mass_rocket_downgrades_six_dof() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("6 DOF", 0.0)).unwrap();
        assert_eq!(eom.mode(), SimulationMode::ThreeDof);
        assert_eq!(
            eom.warnings(),
            &[SimulationWarning::ModeDowngraded {
                requested: SimulationMode::SixDof,
                used: SimulationMode::ThreeDof,
            }]
        );
    }

    #[test]
    fn test_rigid_rocket_keeps_requested_mode() {
        let rocket = rigid_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("6 DOF", 0.0)).unwrap();
        assert_eq!(eom.mode(), SimulationMode::SixDof);
        assert!(eom.warnings().is_empty());
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 0.0)).unwrap();
        assert_eq!(eom.mode(), SimulationMode::ThreeDof);
    }

    #[test]
    fn test_rail_phase_moves_along_rail() {
        let rocket = point_mass_rocket_with_thrust(100.0);
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 0.0)).unwrap();
        let state = eom.rail().initial_state();
        let derivative = eom.derivative(0.0, &state, PhaseKind::Rail).unwrap();
        let direction = eom.rail().direction;
        let acceleration = derivative.velocity();
        assert!(acceleration.dot(&direction) > 0.0);
        assert!((acceleration.normalize() - direction).norm() < 1e-12);
        let expected = 100.0 / 3.5 - 9.80665 * direction.z;
        assert_relative_eq!(acceleration.norm(), expected, epsilon = 1e-6);
        assert_eq!(derivative.quaternion(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_rail_phase_does_not_slide_back() {
        let mut rocket =
            PointMassRocket::new(0.05, 20.0, GridFunction::constant(0.5), GridFunction::constant(0.6))
                .unwrap();
        rocket.add_motor(Motor::constant_thrust(10.0, 2.2, 1.0, 0.5).unwrap());
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 0.0)).unwrap();
        let derivative = eom
            .derivative(0.0, &eom.rail().initial_state(), PhaseKind::Rail)
            .unwrap();
        assert_eq!(derivative.velocity(), Vector3::zeros());
    }

    #[test]
    fn test_six_dof_restoring_moment() {
        let rocket = rigid_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("6 DOF", 0.0)).unwrap();
        // Nose vertical, travelling up and slightly toward +x.
        let state = state_with(Vector3::new(10.0, 0.0, 100.0), [1.0, 0.0, 0.0, 0.0]);
        let (derivative, diagnostics) =
            eom.evaluate(5.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        // Pitching the nose toward +x is a positive rotation about +y.
        assert!(derivative.0[11] > 0.0);
        assert!(diagnostics.angle_of_attack > 5.0 && diagnostics.angle_of_attack < 6.0);
        assert_relative_eq!(diagnostics.drag_coefficient, 0.45);
        assert_eq!(diagnostics.thrust, 0.0);
    }

    #[test]
    fn test_six_dof_quaternion_kinematics() {
        let rocket = rigid_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("6 DOF", 0.0)).unwrap();
        let mut state = state_with(Vector3::zeros(), [1.0, 0.0, 0.0, 0.0]);
        state.set_angular_velocity(&Vector3::new(0.0, 0.0, 2.0));
        let derivative = eom.derivative(5.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        assert_relative_eq!(derivative.0[9], 1.0, epsilon = 1e-12);
        assert_relative_eq!(derivative.0[6], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parachute_and_terminated_phases() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere().unwrap();
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 0.0)).unwrap();
        let state = state_with(Vector3::new(0.0, 0.0, -20.0), [1.0, 0.0, 0.0, 0.0]);
        let derivative = eom
            .derivative(10.0, &state, PhaseKind::ParachuteDescent { parachute: 0 })
            .unwrap();
        assert!(derivative.velocity().z > -9.80665);
        assert_eq!(derivative.quaternion(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert!(eom
            .derivative(10.0, &state, PhaseKind::ParachuteDescent { parachute: 3 })
            .is_err());
        assert_eq!(
            eom.derivative(10.0, &state, PhaseKind::Terminated).unwrap(),
            StateVector::zeros()
        );
    }

    #[test]
    fn test_wind_changes_free_stream() {
        let rocket = point_mass_rocket();
        let environment = Environment::standard_atmosphere()
            .unwrap()
            .with_wind(VectorTimeSeries::constant(Vector3::new(-50.0, 0.0, 0.0)));
        let eom = EquationsOfMotion::new(&rocket, &environment, &settings("3 DOF", 1.0)).unwrap();
        // Drifting with the wind means no relative air flow.
        let state = state_with(Vector3::new(-50.0, 0.0, 0.0), [1.0, 0.0, 0.0, 0.0]);
        let (derivative, diagnostics) =
            eom.evaluate(3.0, &state, PhaseKind::UnpoweredAscent).unwrap();
        assert_eq!(diagnostics.free_stream_speed, 0.0);
        assert_eq!(derivative.quaternion(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
    }
}
