pub mod constants;
pub mod control;
pub mod errors;
pub mod telemetry_system;
pub mod trajectory_system;
pub mod utils;

pub use constants::*;
pub use control::environment::{AtmosphericConditions, Environment};
pub use control::propulsion::{GrainGeometry, Motor};
pub use control::rocket::{
    AeroSurface, DeploymentTrigger, InertiaState, Parachute, PointMassRocket, RailButtons, Rocket,
    RocketBody,
};
pub use control::settings::FlightSettings;
pub use errors::SimulationError;

// Re-export commonly used items from trajectory_system
pub use trajectory_system::aerodynamics::{Aerodynamics, FlowConditions};
pub use trajectory_system::equations_of_motion::{
    weathercock_rate, EquationsOfMotion, FlightDiagnostics, RailGeometry, SimulationWarning,
};
pub use trajectory_system::events::{EventDirection, EventKind};
pub use trajectory_system::flight::{Flight, FlightSolution, TerminationReason};
pub use trajectory_system::state::{PhaseKind, PhaseRecord, SimulationMode, StateVector};

// Re-export commonly used items from telemetry_system
pub use telemetry_system::telemetry::{EventRecord, FlightSummary, Telemetry, TrajectorySample};

// Re-export commonly used utilities
pub use utils::discretization::{DiscretizationCache, Discretize};
pub use utils::grid_function::{Extrapolation, GridData, GridFunction};
pub use utils::time_series::{TimeSeries, VectorTimeSeries};
