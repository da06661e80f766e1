use nalgebra::Vector3;

use crate::errors::SimulationError;
use crate::utils::grid_function::Extrapolation;
use crate::utils::time_series::TimeSeries;

/// Solid propellant modelled as a cylinder for inertia purposes. `center` is
/// measured from the nozzle along the motor axis, positive toward the nose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainGeometry {
    pub outer_radius: f64,
    pub length: f64,
    pub center: f64,
}

/// A motor reduced to the time functions the equations of motion consume.
///
/// Exhaust velocity is the total impulse over the propellant mass, so the
/// mass flow follows the thrust curve and the propellant is exhausted exactly
/// at burnout.
#[derive(Debug, Clone)]
pub struct Motor {
    pub dry_mass: f64,
    pub propellant_initial_mass: f64,
    pub dry_inertia: Vector3<f64>,
    pub center_of_dry_mass: f64,
    grain: Option<GrainGeometry>,
    thrust: TimeSeries,
    burn_time: (f64, f64),
    total_impulse: f64,
    exhaust_velocity: f64,
    propellant_mass: TimeSeries,
}

impl Motor {
    pub fn new(
        thrust: TimeSeries,
        burn_time: (f64, f64),
        dry_mass: f64,
        propellant_initial_mass: f64,
    ) -> Result<Self, SimulationError> {
        let (start, end) = burn_time;
        if !(end > start) || start < 0.0 {
            return Err(SimulationError::InitializationError(format!(
                "invalid burn window ({}, {})",
                start, end
            )));
        }
        if dry_mass < 0.0 || propellant_initial_mass <= 0.0 {
            return Err(SimulationError::InitializationError(
                "motor masses must be positive".to_string(),
            ));
        }

        let total_impulse = thrust.integral(start, end)?;
        if total_impulse <= 0.0 {
            return Err(SimulationError::InitializationError(
                "thrust curve delivers no impulse during the burn".to_string(),
            ));
        }
        let exhaust_velocity = total_impulse / propellant_initial_mass;

        let mut nodes = vec![start];
        nodes.extend(thrust.x_array().iter().copied().filter(|&t| t > start && t < end));
        nodes.push(end);
        let flow = nodes
            .iter()
            .map(|&t| Ok(-thrust.evaluate(t)? / exhaust_velocity))
            .collect::<Result<Vec<f64>, SimulationError>>()?;
        let propellant_mass = TimeSeries::from_arrays(nodes, flow)?
            .cumulative_integral(propellant_initial_mass)?
            .with_extrapolation_policy(Extrapolation::Constant)
            .with_names("Time (s)", "Propellant Mass (kg)");

        Ok(Motor {
            dry_mass,
            propellant_initial_mass,
            dry_inertia: Vector3::zeros(),
            center_of_dry_mass: 0.0,
            grain: None,
            thrust: thrust.with_names("Time (s)", "Thrust (N)"),
            burn_time,
            total_impulse,
            exhaust_velocity,
            propellant_mass,
        })
    }

    pub fn constant_thrust(
        thrust: f64,
        burn_time: f64,
        dry_mass: f64,
        propellant_initial_mass: f64,
    ) -> Result<Self, SimulationError> {
        let curve = TimeSeries::from_points(&[(0.0, thrust), (burn_time, thrust)])?;
        Self::new(curve, (0.0, burn_time), dry_mass, propellant_initial_mass)
    }

    pub fn with_dry_inertia(mut self, inertia: (f64, f64, f64)) -> Self {
        self.dry_inertia = Vector3::new(inertia.0, inertia.1, inertia.2);
        self
    }

    pub fn with_center_of_dry_mass(mut self, position: f64) -> Self {
        self.center_of_dry_mass = position;
        self
    }

    pub fn with_grain_geometry(mut self, grain: GrainGeometry) -> Self {
        self.grain = Some(grain);
        self
    }

    pub fn burn_start_time(&self) -> f64 {
        self.burn_time.0
    }

    pub fn burn_out_time(&self) -> f64 {
        self.burn_time.1
    }

    pub fn total_impulse(&self) -> f64 {
        self.total_impulse
    }

    pub fn exhaust_velocity(&self) -> f64 {
        self.exhaust_velocity
    }

    pub fn average_thrust(&self) -> f64 {
        self.total_impulse / (self.burn_time.1 - self.burn_time.0)
    }

    /// Burning over `[start, end)`, so thrust is already zero at burnout.
    fn is_burning(&self, t: f64) -> bool {
        t >= self.burn_time.0 && t < self.burn_time.1
    }

    pub fn thrust(&self, t: f64) -> Result<f64, SimulationError> {
        if self.is_burning(t) {
            self.thrust.evaluate(t)
        } else {
            Ok(0.0)
        }
    }

    /// Rate of change of motor mass (negative while burning).
    pub fn mass_flow_rate(&self, t: f64) -> Result<f64, SimulationError> {
        if self.is_burning(t) {
            Ok(-self.thrust.evaluate(t)? / self.exhaust_velocity)
        } else {
            Ok(0.0)
        }
    }

    pub fn propellant_mass(&self, t: f64) -> Result<f64, SimulationError> {
        Ok(self.propellant_mass.evaluate(t)?.max(0.0))
    }

    pub fn total_mass(&self, t: f64) -> Result<f64, SimulationError> {
        Ok(self.dry_mass + self.propellant_mass(t)?)
    }

    /// Position of the propellant center of mass relative to the nozzle.
    pub fn propellant_center(&self) -> f64 {
        self.grain.map_or(self.center_of_dry_mass, |grain| grain.center)
    }

    /// Principal inertia per unit propellant mass about the propellant's own
    /// center of mass, `(transverse, transverse, axial)`.
    pub fn propellant_gyration(&self) -> Vector3<f64> {
        match self.grain {
            Some(grain) => {
                let r2 = grain.outer_radius.powi(2);
                let transverse = (3.0 * r2 + grain.length.powi(2)) / 12.0;
                Vector3::new(transverse, transverse, 0.5 * r2)
            }
            None => Vector3::zeros(),
        }
    }

    pub fn thrust_curve(&self) -> &TimeSeries {
        &self.thrust
    }

    pub fn propellant_mass_curve(&self) -> &TimeSeries {
        &self.propellant_mass
    }
}
