use std::env;

use log::{error, info};
use rocket_flight::*;

fn drag_curve(points: &[(f64, f64)]) -> Result<GridFunction, SimulationError> {
    let (mach, cd): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
    GridFunction::from_grid(GridData::from_vec(cd), vec![mach])?
        .with_inputs(&["Mach"])
        .map(|curve| curve.with_output("Cd"))
}

fn build_motor() -> Result<Motor, SimulationError> {
    let thrust = TimeSeries::from_points(&[
        (0.0, 0.0),
        (0.055, 100.0),
        (0.092, 1500.0),
        (0.1, 2000.0),
        (0.15, 2200.0),
        (0.2, 1800.0),
        (0.5, 1950.0),
        (1.0, 2034.0),
        (1.5, 2000.0),
        (2.0, 1900.0),
        (2.5, 1760.0),
        (2.9, 1700.0),
        (3.0, 1650.0),
        (3.3, 530.0),
        (3.4, 350.0),
        (3.9, 0.0),
    ])?
    .with_extrapolation("zero")?;

    Ok(Motor::new(thrust, (0.0, 3.9), 1.815, 2.956)?
        .with_dry_inertia((0.125, 0.125, 0.002))
        .with_center_of_dry_mass(0.317)
        .with_grain_geometry(GrainGeometry {
            outer_radius: 0.033,
            length: 0.6,
            center: 0.397,
        }))
}

fn build_rocket() -> Result<Rocket, SimulationError> {
    let power_off = drag_curve(&[(0.0, 0.45), (0.8, 0.44), (1.0, 0.58), (1.2, 0.52), (2.0, 0.40)])?;
    let power_on = drag_curve(&[(0.0, 0.40), (0.8, 0.39), (1.0, 0.53), (1.2, 0.47), (2.0, 0.36)])?;

    let mut rocket = Rocket::new(0.0635, 14.426, (6.321, 6.321, 0.034), power_off, power_on, 0.0)?;
    rocket.add_motor(build_motor()?, -1.255);
    rocket.add_surface(2.0, 1.16);
    rocket.add_surface(6.3, -1.04);
    rocket.set_rail_buttons(0.0818, -0.618);
    rocket.add_parachute(Parachute::new("Drogue", 1.0, DeploymentTrigger::Apogee, 1.5));
    rocket.add_parachute(Parachute::new("Main", 10.0, DeploymentTrigger::Altitude(800.0), 1.5));
    Ok(rocket)
}

fn run() -> Result<(), SimulationError> {
    let settings = match env::args().nth(1) {
        Some(path) => {
            info!("loading flight settings from {}", path);
            FlightSettings::from_path(path)?
        }
        None => FlightSettings::default().with_rail(5.2, 85.0, 0.0),
    };

    let rocket = build_rocket()?;
    let environment = Environment::standard_atmosphere()?.with_elevation(1400.0);

    let flight = Flight::new(&rocket, &environment, settings)?;
    info!(
        "simulating {} flight, rail {:.2} m",
        flight.simulation_mode(),
        flight.settings().rail_length
    );
    let solution = flight.simulate()?;

    for phase in solution.phases() {
        info!(
            "{:<18} {:>8.3}s -> {:>8.3}s",
            phase.kind.label(),
            phase.start_time,
            phase.end_time
        );
    }
    info!("\n{}", solution.summary());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("simulation failed: {}", e);
        std::process::exit(1);
    }
}
