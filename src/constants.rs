// Physical Constants
pub const STANDARD_GRAVITY: f64 = 9.80665; // m/s²
pub const EARTH_RADIUS: f64 = 6_371_000.0; // meters
pub const AIR_GAS_CONSTANT: f64 = 287.05287; // J/(kg⋅K)
pub const AIR_HEAT_CAPACITY_RATIO: f64 = 1.4;

// Standard Atmosphere
pub const SEA_LEVEL_TEMPERATURE: f64 = 288.15; // K
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0; // Pa
pub const TROPOSPHERE_TEMP_GRADIENT: f64 = -6.5 / 1_000.0; // K per meter
pub const TROPOSPHERE_HEIGHT: f64 = 11_000.0; // m
pub const ATMOSPHERE_TABLE_CEILING: f64 = 80_000.0; // m
pub const ATMOSPHERE_TABLE_STEP: f64 = 250.0; // m
pub const SUTHERLAND_REFERENCE_VISCOSITY: f64 = 1.458e-6; // kg/(m⋅s⋅√K)
pub const SUTHERLAND_TEMPERATURE: f64 = 110.4; // K

// Simulation Parameters
pub const DEFAULT_MAX_TIME: f64 = 600.0; // s
pub const DEFAULT_MAX_TIME_STEP: f64 = f64::INFINITY; // s
pub const DEFAULT_MIN_TIME_STEP: f64 = 1e-9; // s
pub const DEFAULT_INITIAL_TIME_STEP: f64 = 1e-3; // s
pub const DEFAULT_RTOL: f64 = 1e-6;
pub const DEFAULT_ATOL: f64 = 1e-6;
pub const DEFAULT_ROOT_TOLERANCE: f64 = 1e-9; // s
pub const DEFAULT_ROOT_MAX_ITERATIONS: usize = 100;
pub const MAX_INTEGRATION_STEPS: u64 = 2_000_000;

// Launch Rail
pub const DEFAULT_RAIL_LENGTH: f64 = 5.2; // m
pub const DEFAULT_INCLINATION: f64 = 80.0; // degrees from horizontal
pub const DEFAULT_HEADING: f64 = 90.0; // degrees from north

// Attitude
pub const QUATERNION_DRIFT_TOLERANCE: f64 = 1e-3;
pub const ALIGNMENT_TOLERANCE: f64 = 1e-6;
pub const MIN_FREE_STREAM_SPEED: f64 = 1e-6; // m/s
