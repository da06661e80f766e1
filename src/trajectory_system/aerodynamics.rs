use nalgebra::Vector3;

use crate::constants::MIN_FREE_STREAM_SPEED;
use crate::control::environment::{AtmosphericConditions, Environment};
use crate::control::rocket::RocketBody;
use crate::errors::SimulationError;
use crate::utils::grid_function::GridFunction;

/// Air data at the vehicle for one derivative evaluation. The free stream
/// velocity is the air velocity relative to the vehicle, `wind - velocity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConditions {
    pub atmosphere: AtmosphericConditions,
    pub free_stream_velocity: Vector3<f64>,
    pub free_stream_speed: f64,
    pub mach: f64,
    pub reynolds: f64,
    pub dynamic_pressure: f64,
}

impl FlowConditions {
    pub fn at(
        environment: &Environment,
        position: &Vector3<f64>,
        velocity: &Vector3<f64>,
        diameter: f64,
    ) -> Result<Self, SimulationError> {
        let atmosphere = environment.conditions(position.z)?;
        let free_stream = atmosphere.wind - velocity;
        Ok(Self::from_free_stream(atmosphere, free_stream, diameter))
    }

    pub fn from_free_stream(
        atmosphere: AtmosphericConditions,
        free_stream_velocity: Vector3<f64>,
        diameter: f64,
    ) -> Self {
        let speed = free_stream_velocity.norm();
        FlowConditions {
            atmosphere,
            free_stream_velocity,
            free_stream_speed: speed,
            mach: speed / atmosphere.speed_of_sound,
            reynolds: atmosphere.density * speed * diameter / atmosphere.dynamic_viscosity,
            dynamic_pressure: 0.5 * atmosphere.density * speed.powi(2),
        }
    }
}

/// Angle in degrees between the body axis and the direction of travel
/// through the air. Zero when there is no relative wind.
pub fn angle_of_attack(body_axis: &Vector3<f64>, free_stream_velocity: &Vector3<f64>) -> f64 {
    let speed = free_stream_velocity.norm();
    if speed < MIN_FREE_STREAM_SPEED {
        return 0.0;
    }
    let travel = -free_stream_velocity / speed;
    let cos = body_axis.dot(&travel) / body_axis.norm();
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Evaluates a drag curve over (Mach), (Mach, Reynolds) or
/// (Mach, Reynolds, angle of attack in degrees), depending on its arity.
pub fn evaluate_drag_coefficient(
    curve: &GridFunction,
    mach: f64,
    reynolds: f64,
    angle_of_attack: f64,
) -> Result<f64, SimulationError> {
    if !curve.is_multidimensional() {
        return curve.evaluate(&[mach]);
    }
    match curve.input_count() {
        2 => curve.evaluate(&[mach, reynolds]),
        3 => curve.evaluate(&[mach, reynolds, angle_of_attack]),
        found => Err(SimulationError::DimensionMismatch { expected: 3, found }),
    }
}

/// Aerodynamic model of one vehicle.
pub struct Aerodynamics<'a> {
    rocket: &'a dyn RocketBody,
    pub surface_area: f64,
    pub diameter: f64,
}

impl<'a> Aerodynamics<'a> {
    pub fn new(rocket: &'a dyn RocketBody) -> Self {
        Aerodynamics {
            rocket,
            surface_area: rocket.reference_area(),
            diameter: 2.0 * rocket.radius(),
        }
    }

    pub fn drag_coefficient(
        &self,
        powered: bool,
        flow: &FlowConditions,
        angle_of_attack: f64,
    ) -> Result<f64, SimulationError> {
        evaluate_drag_coefficient(
            self.rocket.drag_curve(powered),
            flow.mach,
            flow.reynolds,
            angle_of_attack,
        )
    }

    /// Drag force along the free stream, `½ρ S Cd |v| v`.
    pub fn calculate_drag(&self, flow: &FlowConditions, drag_coefficient: f64) -> Vector3<f64> {
        self.calculate_drag_with_area(flow, drag_coefficient * self.surface_area)
    }

    pub fn calculate_drag_with_area(&self, flow: &FlowConditions, cd_s: f64) -> Vector3<f64> {
        0.5 * flow.atmosphere.density * cd_s * flow.free_stream_speed * flow.free_stream_velocity
    }

    /// Signed axial force along the body axis (negative pushes tailward).
    pub fn calculate_axial_drag(&self, flow: &FlowConditions, drag_coefficient: f64) -> f64 {
        -flow.dynamic_pressure * self.surface_area * drag_coefficient
    }

    /// Normal force on a lifting surface given the body-frame air velocity at
    /// its center of pressure. Returns a body-frame force perpendicular to the
    /// body axis, or zero when the local flow is axial or absent.
    pub fn calculate_normal_force(
        &self,
        density: f64,
        local_stream: &Vector3<f64>,
        normal_force_slope: f64,
    ) -> Vector3<f64> {
        let lateral = Vector3::new(local_stream.x, local_stream.y, 0.0);
        let lateral_speed = lateral.norm();
        if lateral_speed < MIN_FREE_STREAM_SPEED {
            return Vector3::zeros();
        }
        let local_alpha = lateral_speed.atan2(-local_stream.z);
        let magnitude = 0.5
            * density
            * local_stream.norm_squared()
            * self.surface_area
            * normal_force_slope
            * local_alpha;
        lateral * (magnitude / lateral_speed)
    }
}
