pub mod environment;
pub mod propulsion;
pub mod rocket;
pub mod settings;
