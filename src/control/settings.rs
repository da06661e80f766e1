use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_ATOL, DEFAULT_HEADING, DEFAULT_INCLINATION, DEFAULT_INITIAL_TIME_STEP,
    DEFAULT_MAX_TIME, DEFAULT_MAX_TIME_STEP, DEFAULT_MIN_TIME_STEP, DEFAULT_RAIL_LENGTH,
    DEFAULT_ROOT_TOLERANCE, DEFAULT_RTOL,
};
use crate::errors::SimulationError;
use crate::trajectory_system::state::SimulationMode;

/// Flight configuration. Every field is optional in TOML and falls back to
/// the default below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlightSettings {
    pub simulation_mode: SimulationMode,
    pub weathercock_coeff: f64,
    pub terminate_on_apogee: bool,
    pub time_overshoot: bool,
    pub rail_length: f64,
    /// Degrees above the horizon.
    pub inclination: f64,
    /// Degrees clockwise from north.
    pub heading: f64,
    pub max_time: f64,
    pub max_time_step: f64,
    pub min_time_step: f64,
    pub initial_time_step: f64,
    pub rtol: f64,
    pub atol: f64,
    pub root_tolerance: f64,
}

impl Default for FlightSettings {
    fn default() -> Self {
        FlightSettings {
            simulation_mode: SimulationMode::default(),
            weathercock_coeff: 0.0,
            terminate_on_apogee: false,
            time_overshoot: true,
            rail_length: DEFAULT_RAIL_LENGTH,
            inclination: DEFAULT_INCLINATION,
            heading: DEFAULT_HEADING,
            max_time: DEFAULT_MAX_TIME,
            max_time_step: DEFAULT_MAX_TIME_STEP,
            min_time_step: DEFAULT_MIN_TIME_STEP,
            initial_time_step: DEFAULT_INITIAL_TIME_STEP,
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
            root_tolerance: DEFAULT_ROOT_TOLERANCE,
        }
    }
}

impl FlightSettings {
    pub fn from_toml_str(source: &str) -> Result<Self, SimulationError> {
        let settings: FlightSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Parses and sets the mode by its textual name ("3 DOF" or "6 DOF").
    pub fn with_simulation_mode(mut self, mode: &str) -> Result<Self, SimulationError> {
        self.simulation_mode = mode.parse()?;
        Ok(self)
    }

    pub fn with_rail(mut self, length: f64, inclination: f64, heading: f64) -> Self {
        self.rail_length = length;
        self.inclination = inclination;
        self.heading = heading;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |what: &str| Err(SimulationError::InitializationError(what.to_string()));

        if !(self.weathercock_coeff >= 0.0) {
            return invalid("weathercock_coeff must be non-negative");
        }
        if !(self.rail_length > 0.0) {
            return invalid("rail_length must be positive");
        }
        if !(self.inclination > 0.0 && self.inclination <= 90.0) {
            return invalid("inclination must lie in (0, 90] degrees");
        }
        if !(self.max_time > 0.0) {
            return invalid("max_time must be positive");
        }
        if !(self.min_time_step >= 0.0 && self.max_time_step > self.min_time_step) {
            return invalid("time step limits must satisfy 0 <= min_time_step < max_time_step");
        }
        if !(self.initial_time_step > 0.0) {
            return invalid("initial_time_step must be positive");
        }
        if !(self.rtol > 0.0 && self.atol > 0.0 && self.root_tolerance > 0.0) {
            return invalid("tolerances must be positive");
        }
        Ok(())
    }
}
