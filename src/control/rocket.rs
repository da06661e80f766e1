use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

use crate::errors::SimulationError;
use crate::utils::grid_function::GridFunction;

use super::propulsion::Motor;

/// Principal inertia about the instantaneous center of mass and its time
/// derivative, both in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaState {
    pub tensor: Matrix3<f64>,
    pub rate: Matrix3<f64>,
}

/// A lifting surface reduced to its normal force slope (per radian, referred
/// to the body cross-section area) and center of pressure position along the
/// body axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeroSurface {
    pub normal_force_slope: f64,
    pub center_of_pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailButtons {
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeploymentTrigger {
    Apogee,
    /// Deploy while descending through this height above ground level.
    Altitude(f64),
    /// Deploy once the descent rate reaches this magnitude (m/s).
    DescentRate(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parachute {
    pub name: String,
    pub cd_s: f64,
    pub trigger: DeploymentTrigger,
    pub lag: f64,
}

impl Parachute {
    pub fn new(name: &str, cd_s: f64, trigger: DeploymentTrigger, lag: f64) -> Self {
        Parachute {
            name: name.to_string(),
            cd_s,
            trigger,
            lag: lag.max(0.0),
        }
    }
}

/// What the equations of motion need to know about a vehicle. Positions are
/// measured along the body axis, positive toward the nose.
pub trait RocketBody: Send + Sync {
    fn radius(&self) -> f64;

    /// Mass without the motor.
    fn dry_mass(&self) -> f64;

    fn motor(&self) -> Option<&Motor>;

    fn power_off_drag(&self) -> &GridFunction;

    fn power_on_drag(&self) -> &GridFunction;

    fn parachutes(&self) -> &[Parachute];

    /// Full inertia tensor at `t`, or `None` when the model carries no
    /// rotational properties.
    fn inertia_tensor(&self, t: f64) -> Result<Option<InertiaState>, SimulationError>;

    fn attitude_supported(&self) -> bool {
        false
    }

    fn aerodynamic_surfaces(&self) -> &[AeroSurface] {
        &[]
    }

    fn rail_buttons(&self) -> Option<&RailButtons> {
        None
    }

    fn nozzle_position(&self) -> f64 {
        0.0
    }

    fn center_of_mass(&self, _t: f64) -> Result<f64, SimulationError> {
        Ok(0.0)
    }

    fn reference_area(&self) -> f64 {
        PI * self.radius().powi(2)
    }

    fn total_mass(&self, t: f64) -> Result<f64, SimulationError> {
        let motor_mass = match self.motor() {
            Some(motor) => motor.total_mass(t)?,
            None => 0.0,
        };
        Ok(self.dry_mass() + motor_mass)
    }

    fn thrust(&self, t: f64) -> Result<f64, SimulationError> {
        self.motor().map_or(Ok(0.0), |motor| motor.thrust(t))
    }

    fn burn_out_time(&self) -> f64 {
        self.motor().map_or(0.0, Motor::burn_out_time)
    }

    fn drag_curve(&self, powered: bool) -> &GridFunction {
        if powered {
            self.power_on_drag()
        } else {
            self.power_off_drag()
        }
    }
}

/// Rigid vehicle with distributed mass and lifting surfaces.
#[derive(Debug, Clone)]
pub struct Rocket {
    pub radius: f64,
    pub mass: f64,
    /// `(I11, I22, I33)` of the motorless rocket about its own center of mass.
    pub inertia: Vector3<f64>,
    pub center_of_mass_without_motor: f64,
    power_off_drag: GridFunction,
    power_on_drag: GridFunction,
    motor: Option<Motor>,
    motor_position: f64,
    surfaces: Vec<AeroSurface>,
    rail_buttons: Option<RailButtons>,
    parachutes: Vec<Parachute>,
}

impl Rocket {
    pub fn new(
        radius: f64,
        mass: f64,
        inertia: (f64, f64, f64),
        power_off_drag: GridFunction,
        power_on_drag: GridFunction,
        center_of_mass_without_motor: f64,
    ) -> Result<Self, SimulationError> {
        validate_body(radius, mass)?;
        if inertia.0 <= 0.0 || inertia.1 <= 0.0 || inertia.2 <= 0.0 {
            return Err(SimulationError::InitializationError(
                "principal moments of inertia must be positive".to_string(),
            ));
        }
        Ok(Rocket {
            radius,
            mass,
            inertia: Vector3::new(inertia.0, inertia.1, inertia.2),
            center_of_mass_without_motor,
            power_off_drag,
            power_on_drag,
            motor: None,
            motor_position: 0.0,
            surfaces: Vec::new(),
            rail_buttons: None,
            parachutes: Vec::new(),
        })
    }

    /// Mounts `motor` with its nozzle at `position`.
    pub fn add_motor(&mut self, motor: Motor, position: f64) {
        self.motor = Some(motor);
        self.motor_position = position;
    }

    pub fn add_surface(&mut self, normal_force_slope: f64, center_of_pressure: f64) {
        self.surfaces.push(AeroSurface {
            normal_force_slope,
            center_of_pressure,
        });
    }

    pub fn set_rail_buttons(&mut self, upper: f64, lower: f64) {
        self.rail_buttons = Some(RailButtons { upper, lower });
    }

    pub fn add_parachute(&mut self, parachute: Parachute) {
        self.parachutes.push(parachute);
    }

    /// Returns `(mass, position)` pairs for the rocket, the motor casing and
    /// the propellant at `t`.
    fn mass_elements(&self, t: f64) -> Result<[(f64, f64); 3], SimulationError> {
        let rocket = (self.mass, self.center_of_mass_without_motor);
        Ok(match &self.motor {
            Some(motor) => [
                rocket,
                (motor.dry_mass, self.motor_position + motor.center_of_dry_mass),
                (
                    motor.propellant_mass(t)?,
                    self.motor_position + motor.propellant_center(),
                ),
            ],
            None => [rocket, (0.0, 0.0), (0.0, 0.0)],
        })
    }
}

impl RocketBody for Rocket {
    fn radius(&self) -> f64 {
        self.radius
    }

    fn dry_mass(&self) -> f64 {
        self.mass
    }

    fn motor(&self) -> Option<&Motor> {
        self.motor.as_ref()
    }

    fn power_off_drag(&self) -> &GridFunction {
        &self.power_off_drag
    }

    fn power_on_drag(&self) -> &GridFunction {
        &self.power_on_drag
    }

    fn parachutes(&self) -> &[Parachute] {
        &self.parachutes
    }

    fn attitude_supported(&self) -> bool {
        true
    }

    fn aerodynamic_surfaces(&self) -> &[AeroSurface] {
        &self.surfaces
    }

    fn rail_buttons(&self) -> Option<&RailButtons> {
        self.rail_buttons.as_ref()
    }

    fn nozzle_position(&self) -> f64 {
        self.motor_position
    }

    fn center_of_mass(&self, t: f64) -> Result<f64, SimulationError> {
        let elements = self.mass_elements(t)?;
        let mass: f64 = elements.iter().map(|e| e.0).sum();
        let moment: f64 = elements.iter().map(|e| e.0 * e.1).sum();
        Ok(moment / mass)
    }

    fn inertia_tensor(&self, t: f64) -> Result<Option<InertiaState>, SimulationError> {
        let elements = self.mass_elements(t)?;
        let total_mass: f64 = elements.iter().map(|e| e.0).sum();
        let cm = self.center_of_mass(t)?;

        let (motor_inertia, gyration, mass_flow) = match &self.motor {
            Some(motor) => (motor.dry_inertia, motor.propellant_gyration(), motor.mass_flow_rate(t)?),
            None => (Vector3::zeros(), Vector3::zeros(), 0.0),
        };
        let [_, _, (propellant_mass, propellant_position)] = elements;

        // Parallel axis theorem about the combined center of mass.
        let offset_term: f64 = elements.iter().map(|(m, z)| m * (z - cm).powi(2)).sum();
        let own = self.inertia + motor_inertia + gyration * propellant_mass;
        let tensor = Matrix3::from_diagonal(&Vector3::new(
            own.x + offset_term,
            own.y + offset_term,
            own.z,
        ));

        let cm_rate = mass_flow * (propellant_position - cm) / total_mass;
        let offset_rate: f64 = mass_flow * (propellant_position - cm).powi(2)
            - elements
                .iter()
                .map(|(m, z)| 2.0 * m * (z - cm) * cm_rate)
                .sum::<f64>();
        let own_rate = gyration * mass_flow;
        let rate = Matrix3::from_diagonal(&Vector3::new(
            own_rate.x + offset_rate,
            own_rate.y + offset_rate,
            own_rate.z,
        ));

        Ok(Some(InertiaState { tensor, rate }))
    }
}

/// Vehicle reduced to a point mass; it has no inertia tensor, so only
/// translational (3 DOF) dynamics are available for it.
#[derive(Debug, Clone)]
pub struct PointMassRocket {
    pub radius: f64,
    pub mass: f64,
    power_off_drag: GridFunction,
    power_on_drag: GridFunction,
    motor: Option<Motor>,
    parachutes: Vec<Parachute>,
}

impl PointMassRocket {
    pub fn new(
        radius: f64,
        mass: f64,
        power_off_drag: GridFunction,
        power_on_drag: GridFunction,
    ) -> Result<Self, SimulationError> {
        validate_body(radius, mass)?;
        Ok(PointMassRocket {
            radius,
            mass,
            power_off_drag,
            power_on_drag,
            motor: None,
            parachutes: Vec::new(),
        })
    }

    pub fn add_motor(&mut self, motor: Motor) {
        self.motor = Some(motor);
    }

    pub fn add_parachute(&mut self, parachute: Parachute) {
        self.parachutes.push(parachute);
    }
}

impl RocketBody for PointMassRocket {
    fn radius(&self) -> f64 {
        self.radius
    }

    fn dry_mass(&self) -> f64 {
        self.mass
    }

    fn motor(&self) -> Option<&Motor> {
        self.motor.as_ref()
    }

    fn power_off_drag(&self) -> &GridFunction {
        &self.power_off_drag
    }

    fn power_on_drag(&self) -> &GridFunction {
        &self.power_on_drag
    }

    fn parachutes(&self) -> &[Parachute] {
        &self.parachutes
    }

    fn inertia_tensor(&self, _t: f64) -> Result<Option<InertiaState>, SimulationError> {
        Ok(None)
    }
}

fn validate_body(radius: f64, mass: f64) -> Result<(), SimulationError> {
    if radius <= 0.0 || mass <= 0.0 {
        return Err(SimulationError::InitializationError(format!(
            "rocket radius and mass must be positive (radius = {}, mass = {})",
            radius, mass
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::propulsion::GrainGeometry;
    use approx::assert_relative_eq;

    fn calisto() -> Rocket {
        let motor = Motor::constant_thrust(1500.0, 3.9, 1.815, 2.956)
            .unwrap()
            .with_dry_inertia((0.125, 0.125, 0.002))
            .with_center_of_dry_mass(0.317)
            .with_grain_geometry(GrainGeometry {
                outer_radius: 0.033,
                length: 0.7,
                center: 0.397,
            });
        let mut rocket = Rocket::new(
            0.0635,
            14.426,
            (6.321, 6.321, 0.034),
            GridFunction::constant(0.45),
            GridFunction::constant(0.5),
            0.0,
        )
        .unwrap();
        rocket.add_motor(motor, -1.255);
        rocket
    }

    #[test]
    fn test_mass_budget() {
        let rocket = calisto();
        assert_relative_eq!(rocket.total_mass(0.0).unwrap(), 14.426 + 1.815 + 2.956, epsilon = 1e-9);
        assert_relative_eq!(rocket.total_mass(10.0).unwrap(), 14.426 + 1.815, epsilon = 1e-9);
        assert_relative_eq!(rocket.burn_out_time(), 3.9);
    }

    #[test]
    fn test_center_of_mass_moves_forward_during_burn() {
        let rocket = calisto();
        let before = rocket.center_of_mass(0.0).unwrap();
        let after = rocket.center_of_mass(5.0).unwrap();
        assert!(before < 0.0);
        assert!(after > before);
    }

    #[test]
    fn test_inertia_decreases_during_burn() {
        let rocket = calisto();
        let full = rocket.inertia_tensor(0.0).unwrap().unwrap();
        let empty = rocket.inertia_tensor(5.0).unwrap().unwrap();
        assert!(full.tensor[(0, 0)] > empty.tensor[(0, 0)]);
        assert_eq!(full.tensor[(0, 0)], full.tensor[(1, 1)]);
        assert!(full.rate[(2, 2)] < 0.0);
        assert_eq!(empty.rate, Matrix3::zeros());
    }

    #[test]
    fn test_inertia_rate_matches_finite_difference() {
        let rocket = calisto();
        let dt = 1e-5;
        let before = rocket.inertia_tensor(1.0 - dt).unwrap().unwrap().tensor;
        let after = rocket.inertia_tensor(1.0 + dt).unwrap().unwrap().tensor;
        let rate = rocket.inertia_tensor(1.0).unwrap().unwrap().rate;
        let numeric = (after - before) / (2.0 * dt);
        assert_relative_eq!(rate[(0, 0)], numeric[(0, 0)], max_relative = 1e-4);
        assert_relative_eq!(rate[(2, 2)], numeric[(2, 2)], max_relative = 1e-4);
    }

    #[test]
    fn test_point_mass_has_no_inertia() {
        let rocket = PointMassRocket::new(0.05, 2.0, GridFunction::constant(0.5), GridFunction::constant(0.6))
            .unwrap();
        assert!(rocket.inertia_tensor(0.0).unwrap().is_none());
        assert!(!rocket.attitude_supported());
        assert_eq!(rocket.drag_curve(true).evaluate(&[0.3]).unwrap(), 0.6);
        assert_eq!(rocket.drag_curve(false).evaluate(&[0.3]).unwrap(), 0.5);
    }

    #[test]
    fn test_invalid_bodies() {
        assert!(PointMassRocket::new(0.0, 2.0, GridFunction::constant(0.5), GridFunction::constant(0.5)).is_err());
        assert!(Rocket::new(
            0.05,
            2.0,
            (0.0, 1.0, 1.0),
            GridFunction::constant(0.5),
            GridFunction::constant(0.5),
            0.0
        )
        .is_err());
    }
}
