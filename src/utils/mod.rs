pub mod discretization;
pub mod grid_function;
pub mod time_series;
