use std::fmt;

use crate::errors::SimulationError;
use crate::trajectory_system::equations_of_motion::FlightDiagnostics;
use crate::trajectory_system::events::EventKind;
use crate::trajectory_system::state::{PhaseKind, PhaseRecord, SimulationMode, StateVector};
use crate::utils::time_series::TimeSeries;

/// One accepted point of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    pub t: f64,
    pub state: StateVector,
    pub phase: PhaseKind,
    pub diagnostics: FlightDiagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub t: f64,
    pub state: StateVector,
}

/// Everything recorded while a flight is integrated: the dense list of
/// accepted states, the located events and the phase history.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    samples: Vec<TrajectorySample>,
    events: Vec<EventRecord>,
    phases: Vec<PhaseRecord>,
}

impl Telemetry {
    pub fn new() -> Self {
        Telemetry::default()
    }

    /// Appends a sample; a sample at the same time as the last one replaces it.
    pub fn collect_data(&mut self, sample: TrajectorySample) {
        match self.samples.last_mut() {
            Some(last) if sample.t <= last.t => *last = sample,
            _ => self.samples.push(sample),
        }
    }

    pub fn record_event(&mut self, event: EventRecord) {
        self.events.push(event);
    }

    pub fn open_phase(&mut self, kind: PhaseKind, t: f64, state: StateVector) {
        self.phases.push(PhaseRecord {
            kind,
            start_time: t,
            start_state: state,
            end_time: t,
            ended_by: None,
        });
    }

    pub fn close_phase(&mut self, t: f64, ended_by: Option<EventKind>) {
        if let Some(phase) = self.phases.last_mut() {
            phase.end_time = t;
            phase.ended_by = ended_by;
        }
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    pub fn event(&self, kind: EventKind) -> Option<&EventRecord> {
        self.events.iter().find(|event| event.kind == kind)
    }

    pub fn max_by<F: Fn(&TrajectorySample) -> f64>(&self, f: F) -> f64 {
        self.samples.iter().map(f).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Builds a time series of any sampled quantity.
    pub fn series<F>(&self, name: &str, f: F) -> Result<TimeSeries, SimulationError>
    where
        F: Fn(&TrajectorySample) -> f64,
    {
        let (t, y): (Vec<f64>, Vec<f64>) = self.samples.iter().map(|s| (s.t, f(s))).unzip();
        Ok(TimeSeries::from_arrays(t, y)?.with_names("Time (s)", name))
    }
}

/// Headline numbers of a finished flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSummary {
    pub mode: SimulationMode,
    pub apogee: f64,
    pub apogee_agl: f64,
    pub apogee_time: Option<f64>,
    pub out_of_rail_time: Option<f64>,
    pub out_of_rail_velocity: Option<f64>,
    pub burn_out_time: f64,
    pub max_speed: f64,
    pub max_mach: f64,
    pub impact_velocity: Option<f64>,
    pub t_final: f64,
    pub truncated: bool,
}

fn format_time(elapsed_time: f64) -> String {
    if elapsed_time >= 3600.0 {
        let hours = (elapsed_time / 3600.0).floor();
        let minutes = ((elapsed_time % 3600.0) / 60.0).floor();
        let seconds = elapsed_time % 60.0;
        format!("{:.0}h {:.0}m {:.2}s", hours, minutes, seconds)
    } else if elapsed_time >= 60.0 {
        let minutes = (elapsed_time / 60.0).floor();
        let seconds = elapsed_time % 60.0;
        format!("{:.0}m {:.2}s", minutes, seconds)
    } else {
        format!("{:.2}s", elapsed_time)
    }
}

fn format_altitude(altitude: f64) -> String {
    if altitude.abs() >= 1000.0 {
        format!("{:.2} km", altitude / 1000.0)
    } else {
        format!("{:.2} m", altitude)
    }
}

fn format_optional_time(t: Option<f64>) -> String {
    t.map_or_else(|| "n/a".to_string(), format_time)
}

impl fmt::Display for FlightSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "--- Flight Summary ({}) ---", self.mode)?;
        writeln!(f, "Out of rail: {}", format_optional_time(self.out_of_rail_time))?;
        if let Some(velocity) = self.out_of_rail_velocity {
            writeln!(f, "Out of rail velocity: {:.2} m/s", velocity)?;
        }
        writeln!(f, "Burnout: {}", format_time(self.burn_out_time))?;
        writeln!(
            f,
            "Apogee: {} ASL, {} AGL at {}",
            format_altitude(self.apogee),
            format_altitude(self.apogee_agl),
            format_optional_time(self.apogee_time)
        )?;
        writeln!(f, "Max speed: {:.2} m/s (Mach {:.3})", self.max_speed, self.max_mach)?;
        if let Some(velocity) = self.impact_velocity {
            writeln!(f, "Impact velocity: {:.2} m/s", velocity)?;
        }
        write!(f, "Flight time: {}", format_time(self.t_final))?;
        if self.truncated {
            write!(f, " (truncated at max_time)")?;
        }
        Ok(())
    }
}
