pub mod aerodynamics;
pub mod equations_of_motion;
pub mod events;
pub mod flight;
pub mod integrator;
pub mod state;
