use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Dimension mismatch: expected {expected} coordinates, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Number of axes ({axes}) does not match data dimensions ({dimensions})")]
    AxisCountMismatch { axes: usize, dimensions: usize },

    #[error("Axis {axis} has {axis_len} points but data dimension {axis} has {data_len}")]
    AxisLengthMismatch {
        axis: usize,
        axis_len: usize,
        data_len: usize,
    },

    #[error("Number of inputs ({inputs}) does not match number of axes ({axes})")]
    InputCountMismatch { inputs: usize, axes: usize },

    #[error("Invalid axis {axis}: {reason}")]
    InvalidAxis { axis: usize, reason: String },

    #[error("Unsupported extrapolation '{0}', expected one of constant, natural, zero, error")]
    UnsupportedExtrapolation(String),

    #[error("Coordinate {value} on axis {axis} is outside the domain [{min}, {max}]")]
    OutOfDomain {
        axis: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid simulation mode '{0}', expected \"3 DOF\" or \"6 DOF\"")]
    InvalidSimulationMode(String),

    #[error("Attitude quaternion drifted to norm {norm} at t = {t} s")]
    QuaternionDrift { t: f64, norm: f64 },

    #[error("Step size {h} s fell below the minimum at t = {t} s")]
    StepSizeTooSmall { t: f64, h: f64 },

    #[error("Non-finite state encountered at t = {t} s")]
    NonFiniteState { t: f64 },

    #[error("Event location failed: {0}")]
    EventFindingFailed(String),

    #[error("Physics error: {0}")]
    PhysicsError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
