use nalgebra::Vector3;

use crate::constants::{
    AIR_GAS_CONSTANT, AIR_HEAT_CAPACITY_RATIO, ATMOSPHERE_TABLE_CEILING, ATMOSPHERE_TABLE_STEP,
    EARTH_RADIUS, SEA_LEVEL_PRESSURE, SEA_LEVEL_TEMPERATURE, STANDARD_GRAVITY,
    SUTHERLAND_REFERENCE_VISCOSITY, SUTHERLAND_TEMPERATURE, TROPOSPHERE_HEIGHT,
    TROPOSPHERE_TEMP_GRADIENT,
};
use crate::errors::SimulationError;
use crate::utils::time_series::{TimeSeries, VectorTimeSeries};

/// (base altitude m, base temperature K, lapse rate K/m, base pressure Pa)
const STANDARD_LAYERS: [(f64, f64, f64, f64); 7] = [
    (0.0, SEA_LEVEL_TEMPERATURE, TROPOSPHERE_TEMP_GRADIENT, SEA_LEVEL_PRESSURE),
    (TROPOSPHERE_HEIGHT, 216.65, 0.0, 22_632.06),
    (20_000.0, 216.65, 0.001, 5_474.889),
    (32_000.0, 228.65, 0.0028, 868.0187),
    (47_000.0, 270.65, 0.0, 110.9063),
    (51_000.0, 270.65, -0.0028, 66.938_87),
    (71_000.0, 214.65, -0.002, 3.956_420),
];

/// Temperature and pressure of the layered standard atmosphere.
pub fn standard_temperature_pressure(altitude: f64) -> (f64, f64) {
    let (base, t_base, lapse, p_base) = STANDARD_LAYERS
        .iter()
        .rev()
        .find(|layer| altitude >= layer.0)
        .copied()
        .unwrap_or(STANDARD_LAYERS[0]);

    let temperature = t_base + lapse * (altitude - base);
    let pressure = if lapse == 0.0 {
        p_base * (-STANDARD_GRAVITY * (altitude - base) / (AIR_GAS_CONSTANT * t_base)).exp()
    } else {
        p_base * (temperature / t_base).powf(-STANDARD_GRAVITY / (AIR_GAS_CONSTANT * lapse))
    };
    (temperature, pressure)
}

fn sutherland_viscosity(temperature: f64) -> f64 {
    SUTHERLAND_REFERENCE_VISCOSITY * temperature.powf(1.5) / (temperature + SUTHERLAND_TEMPERATURE)
}

/// Atmospheric state at a single altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericConditions {
    pub density: f64,
    pub speed_of_sound: f64,
    pub dynamic_viscosity: f64,
    pub gravity: f64,
    pub wind: Vector3<f64>,
}

/// Altitude profiles read by the equations of motion. Altitudes are above
/// sea level; the launch site sits at `elevation`.
#[derive(Debug, Clone)]
pub struct Environment {
    pub elevation: f64,
    temperature: TimeSeries,
    pressure: TimeSeries,
    density: TimeSeries,
    speed_of_sound: TimeSeries,
    dynamic_viscosity: TimeSeries,
    gravity: TimeSeries,
    wind: VectorTimeSeries,
}

impl Environment {
    pub fn standard_atmosphere() -> Result<Self, SimulationError> {
        let samples = (ATMOSPHERE_TABLE_CEILING / ATMOSPHERE_TABLE_STEP) as usize + 1;
        let temperature = TimeSeries::sample(
            |h| standard_temperature_pressure(h).0,
            0.0,
            ATMOSPHERE_TABLE_CEILING,
            samples,
        )?;
        let pressure = TimeSeries::sample(
            |h| standard_temperature_pressure(h).1,
            0.0,
            ATMOSPHERE_TABLE_CEILING,
            samples,
        )?;
        Self::from_temperature_pressure(temperature, pressure)
    }

    /// Derives density, speed of sound and viscosity from temperature and
    /// pressure profiles sharing the same altitude nodes.
    pub fn from_temperature_pressure(
        temperature: TimeSeries,
        pressure: TimeSeries,
    ) -> Result<Self, SimulationError> {
        if temperature.x_array() != pressure.x_array() {
            return Err(SimulationError::InitializationError(
                "temperature and pressure profiles must share altitude nodes".to_string(),
            ));
        }
        if temperature.y_array().iter().any(|&t| t <= 0.0) {
            return Err(SimulationError::InitializationError(
                "temperature profile must be strictly positive".to_string(),
            ));
        }

        let altitudes = temperature.x_array().to_vec();
        let (density, sound, viscosity): (Vec<f64>, Vec<f64>, Vec<f64>) = temperature
            .y_array()
            .iter()
            .zip(pressure.y_array())
            .map(|(&t, &p)| {
                (
                    p / (AIR_GAS_CONSTANT * t),
                    (AIR_HEAT_CAPACITY_RATIO * AIR_GAS_CONSTANT * t).sqrt(),
                    sutherland_viscosity(t),
                )
            })
            .fold((vec![], vec![], vec![]), |mut acc, (d, s, v)| {
                acc.0.push(d);
                acc.1.push(s);
                acc.2.push(v);
                acc
            });

        Ok(Environment {
            elevation: 0.0,
            density: TimeSeries::from_arrays(altitudes.clone(), density)?
                .with_names("Altitude", "Density"),
            speed_of_sound: TimeSeries::from_arrays(altitudes.clone(), sound)?
                .with_names("Altitude", "Speed of Sound"),
            dynamic_viscosity: TimeSeries::from_arrays(altitudes, viscosity)?
                .with_names("Altitude", "Dynamic Viscosity"),
            temperature,
            pressure,
            gravity: TimeSeries::constant(STANDARD_GRAVITY),
            wind: VectorTimeSeries::zero(),
        })
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_wind(mut self, wind: VectorTimeSeries) -> Self {
        self.wind = wind;
        self
    }

    pub fn with_gravity(mut self, gravity: TimeSeries) -> Self {
        self.gravity = gravity;
        self
    }

    /// Inverse-square gravity scaled from `surface_gravity` at sea level.
    pub fn with_gravity_model(mut self, surface_gravity: f64) -> Result<Self, SimulationError> {
        self.gravity = TimeSeries::sample(
            |h| surface_gravity * (EARTH_RADIUS / (EARTH_RADIUS + h)).powi(2),
            0.0,
            ATMOSPHERE_TABLE_CEILING,
            161,
        )?
        .with_extrapolation("natural")?
        .with_names("Altitude", "Gravity");
        Ok(self)
    }

    pub fn conditions(&self, altitude: f64) -> Result<AtmosphericConditions, SimulationError> {
        Ok(AtmosphericConditions {
            density: self.density.evaluate(altitude)?,
            speed_of_sound: self.speed_of_sound.evaluate(altitude)?,
            dynamic_viscosity: self.dynamic_viscosity.evaluate(altitude)?,
            gravity: self.gravity.evaluate(altitude)?,
            wind: self.wind.evaluate(altitude)?,
        })
    }

    pub fn density(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.density.evaluate(altitude)
    }

    pub fn speed_of_sound(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.speed_of_sound.evaluate(altitude)
    }

    pub fn dynamic_viscosity(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.dynamic_viscosity.evaluate(altitude)
    }

    pub fn temperature(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.temperature.evaluate(altitude)
    }

    pub fn pressure(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.pressure.evaluate(altitude)
    }

    pub fn gravity(&self, altitude: f64) -> Result<f64, SimulationError> {
        self.gravity.evaluate(altitude)
    }

    pub fn wind_velocity(&self, altitude: f64) -> Result<Vector3<f64>, SimulationError> {
        self.wind.evaluate(altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sea_level_conditions() {
        let environment = Environment::standard_atmosphere().unwrap();
        assert_abs_diff_eq!(environment.temperature(0.0).unwrap(), 288.15, epsilon = 0.1);
        assert_abs_diff_eq!(environment.pressure(0.0).unwrap(), 101_325.0, epsilon = 1.0);
        assert_abs_diff_eq!(environment.density(0.0).unwrap(), 1.225, epsilon = 0.01);
        assert_abs_diff_eq!(environment.speed_of_sound(0.0).unwrap(), 340.3, epsilon = 0.5);
        assert_abs_diff_eq!(environment.dynamic_viscosity(0.0).unwrap(), 1.789e-5, epsilon = 1e-7);
    }

    #[test]
    fn test_tropopause_conditions() {
        let environment = Environment::standard_atmosphere().unwrap();
        assert_abs_diff_eq!(environment.temperature(11_000.0).unwrap(), 216.65, epsilon = 0.1);
        assert_abs_diff_eq!(environment.pressure(11_000.0).unwrap(), 22_632.0, epsilon = 5.0);
        assert_abs_diff_eq!(environment.density(11_000.0).unwrap(), 0.3639, epsilon = 0.01);
    }

    #[test]
    fn test_layers_are_continuous() {
        for &(base, ..) in STANDARD_LAYERS.iter().skip(1) {
            let below = standard_temperature_pressure(base - 1e-6);
            let above = standard_temperature_pressure(base + 1e-6);
            assert_abs_diff_eq!(below.0, above.0, epsilon = 1e-3);
            assert!((below.1 - above.1).abs() / above.1 < 1e-3);
        }
    }

    #[test]
    fn test_density_decreases_with_altitude() {
        let environment = Environment::standard_atmosphere().unwrap();
        let mut previous = f64::INFINITY;
        for h in (0..=60_000).step_by(5_000) {
            let rho = environment.density(h as f64).unwrap();
            assert!(rho < previous);
            previous = rho;
        }
    }

    #[test]
    fn test_constant_above_table_ceiling() {
        let environment = Environment::standard_atmosphere().unwrap();
        assert_eq!(
            environment.density(500_000.0).unwrap(),
            environment.density(ATMOSPHERE_TABLE_CEILING).unwrap()
        );
    }

    #[test]
    fn test_gravity_variation_with_altitude() {
        let environment = Environment::standard_atmosphere()
            .unwrap()
            .with_gravity_model(STANDARD_GRAVITY)
            .unwrap();
        let g0 = environment.gravity(0.0).unwrap();
        let g100 = environment.gravity(100_000.0).unwrap();
        assert_abs_diff_eq!(g0, STANDARD_GRAVITY, epsilon = 1e-9);
        assert!(g100 < g0);
        let expected_ratio = (EARTH_RADIUS / (EARTH_RADIUS + 100_000.0)).powi(2);
        assert_abs_diff_eq!(g100 / g0, expected_ratio, epsilon = 0.01);
    }

    #[test]
    fn test_wind_profile() {
        let wind = VectorTimeSeries::new(
            TimeSeries::from_points(&[(0.0, 5.0), (4000.0, 5.0)]).unwrap(),
            TimeSeries::constant(2.0),
            TimeSeries::constant(0.0),
        );
        let environment = Environment::standard_atmosphere().unwrap().with_wind(wind);
        let conditions = environment.conditions(1500.0).unwrap();
        assert_abs_diff_eq!(conditions.wind.x, 5.0);
        assert_abs_diff_eq!(conditions.wind.y, 2.0);
        assert_abs_diff_eq!(conditions.gravity, STANDARD_GRAVITY);
    }

    #[test]
    fn test_mismatched_profiles_rejected() {
        let t = TimeSeries::from_points(&[(0.0, 288.0), (1000.0, 281.0)]).unwrap();
        let p = TimeSeries::from_points(&[(0.0, 101_325.0), (2000.0, 80_000.0)]).unwrap();
        assert!(Environment::from_temperature_pressure(t, p).is_err());
    }
}
