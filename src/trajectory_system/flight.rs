use log::{debug, info, warn};

use crate::constants::{
    DEFAULT_ROOT_MAX_ITERATIONS, MAX_INTEGRATION_STEPS, QUATERNION_DRIFT_TOLERANCE,
};
use crate::control::environment::Environment;
use crate::control::rocket::{DeploymentTrigger, RocketBody};
use crate::control::settings::FlightSettings;
use crate::errors::SimulationError;
use crate::telemetry_system::telemetry::{
    EventRecord, FlightSummary, Telemetry, TrajectorySample,
};
use crate::utils::time_series::TimeSeries;

use super::equations_of_motion::{
    EquationsOfMotion, FlightDiagnostics, RailGeometry, SimulationWarning,
};
use super::events::{locate_first_event, BrentSolver, EventKind, Trigger};
use super::integrator::{DenseSegment, DormandPrince, OdeSystem, Stats, Tolerances};
use super::state::{PhaseKind, PhaseRecord, SimulationMode, StateVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Impact,
    Apogee,
    /// `max_time` was reached before a terminal event; the result is
    /// truncated, not failed.
    MaxTimeExceeded,
}

/// Decides which phase follows an event and which triggers are armed.
struct PhaseMachine<'r> {
    rocket: &'r dyn RocketBody,
    rail: RailGeometry,
    elevation: f64,
    terminate_on_apogee: bool,
    current: PhaseKind,
    deployed: Vec<bool>,
    inflations: Vec<(usize, f64)>,
    termination: Option<TerminationReason>,
}

impl<'r> PhaseMachine<'r> {
    fn new(rocket: &'r dyn RocketBody, rail: RailGeometry, elevation: f64, terminate_on_apogee: bool) -> Self {
        PhaseMachine {
            rocket,
            rail,
            elevation,
            terminate_on_apogee,
            current: PhaseKind::Rail,
            deployed: vec![false; rocket.parachutes().len()],
            inflations: Vec::new(),
            termination: None,
        }
    }

    fn triggers(&self, t: f64) -> Vec<Trigger> {
        let burn_out_time = self.rocket.burn_out_time();
        match self.current {
            PhaseKind::Rail => vec![Trigger::rail_exit(
                self.rail.origin,
                self.rail.direction,
                self.rail.effective_length,
            )],
            PhaseKind::PoweredAscent => {
                let mut triggers = Vec::with_capacity(3);
                if burn_out_time > t {
                    triggers.push(Trigger::burnout(burn_out_time));
                }
                triggers.push(Trigger::apogee());
                triggers.push(Trigger::impact(self.elevation));
                triggers
            }
            PhaseKind::UnpoweredAscent => vec![Trigger::apogee(), Trigger::impact(self.elevation)],
            PhaseKind::ApogeeToEvent | PhaseKind::ParachuteDescent { .. } => {
                let mut triggers: Vec<Trigger> = self
                    .rocket
                    .parachutes()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !self.deployed[*i])
                    .filter_map(|(i, chute)| Trigger::parachute(i, &chute.trigger, self.elevation))
                    .collect();
                triggers.extend(
                    self.inflations
                        .iter()
                        .map(|&(i, time)| Trigger::inflation(i, time)),
                );
                triggers.push(Trigger::impact(self.elevation));
                triggers
            }
            PhaseKind::Terminated => Vec::new(),
        }
    }

    /// Marks a parachute deployed. Returns the descent phase if it opens
    /// immediately, or schedules its inflation otherwise.
    fn deploy(&mut self, index: usize, t: f64) -> Option<PhaseKind> {
        self.deployed[index] = true;
        let lag = self.rocket.parachutes()[index].lag;
        if lag > 0.0 {
            self.inflations.push((index, t + lag));
            None
        } else {
            Some(PhaseKind::ParachuteDescent { parachute: index })
        }
    }

    /// Deploys every parachute whose condition already holds at `state`,
    /// e.g. an altitude deployment set above apogee. Returns the resulting
    /// phase and the deployments made.
    fn deploy_satisfied(
        &mut self,
        t: f64,
        state: &StateVector,
        mut next: PhaseKind,
    ) -> (PhaseKind, Vec<EventKind>) {
        let satisfied: Vec<usize> = self
            .rocket
            .parachutes()
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.deployed[*i])
            .filter_map(|(i, chute)| Trigger::parachute(i, &chute.trigger, self.elevation))
            .filter(|trigger| trigger.value(t, state) <= 0.0)
            .filter_map(|trigger| match trigger.kind {
                EventKind::ParachuteTrigger(index) => Some(index),
                _ => None,
            })
            .collect();

        let mut deployed = Vec::with_capacity(satisfied.len());
        for index in satisfied {
            if let Some(descent) = self.deploy(index, t) {
                next = descent;
            }
            deployed.push(EventKind::ParachuteTrigger(index));
        }
        (next, deployed)
    }

    /// Applies `event` and returns the next phase together with any
    /// parachute deployments that fired on entering it.
    fn handle(
        &mut self,
        event: EventKind,
        t: f64,
        state: &StateVector,
    ) -> (PhaseKind, Vec<EventKind>) {
        let next = match event {
            EventKind::RailExit => {
                if t < self.rocket.burn_out_time() {
                    PhaseKind::PoweredAscent
                } else {
                    PhaseKind::UnpoweredAscent
                }
            }
            EventKind::Burnout => PhaseKind::UnpoweredAscent,
            EventKind::Apogee if self.terminate_on_apogee => {
                self.termination = Some(TerminationReason::Apogee);
                PhaseKind::Terminated
            }
            EventKind::Apogee => {
                let at_apogee: Vec<usize> = self
                    .rocket
                    .parachutes()
                    .iter()
                    .enumerate()
                    .filter(|(i, chute)| {
                        !self.deployed[*i] && chute.trigger == DeploymentTrigger::Apogee
                    })
                    .map(|(i, _)| i)
                    .collect();
                let mut next = PhaseKind::ApogeeToEvent;
                for index in at_apogee {
                    if let Some(descent) = self.deploy(index, t) {
                        next = descent;
                    }
                }
                next
            }
            EventKind::ParachuteTrigger(index) => self.deploy(index, t).unwrap_or(self.current),
            EventKind::ParachuteInflation(index) => {
                self.inflations.retain(|inflation| inflation.0 != index);
                PhaseKind::ParachuteDescent { parachute: index }
            }
            EventKind::Impact => {
                self.termination = Some(TerminationReason::Impact);
                PhaseKind::Terminated
            }
        };
        let (next, deployed) = match next {
            PhaseKind::ApogeeToEvent | PhaseKind::ParachuteDescent { .. } => {
                self.deploy_satisfied(t, state, next)
            }
            _ => (next, Vec::new()),
        };
        self.current = next;
        (next, deployed)
    }
}

/// A single trajectory simulation. Borrows the rocket and environment, so
/// many flights can share them, including across threads.
pub struct Flight<'a> {
    rocket: &'a dyn RocketBody,
    environment: &'a Environment,
    settings: FlightSettings,
    equations: EquationsOfMotion<'a>,
}

impl<'a> Flight<'a> {
    pub fn new(
        rocket: &'a dyn RocketBody,
        environment: &'a Environment,
        settings: FlightSettings,
    ) -> Result<Self, SimulationError> {
        let equations = EquationsOfMotion::new(rocket, environment, &settings)?;
        Ok(Flight {
            rocket,
            environment,
            settings,
            equations,
        })
    }

    pub fn simulation_mode(&self) -> SimulationMode {
        self.equations.mode()
    }

    pub fn weathercock_coeff(&self) -> f64 {
        self.equations.weathercock_coeff()
    }

    pub fn settings(&self) -> &FlightSettings {
        &self.settings
    }

    pub fn warnings(&self) -> &[SimulationWarning] {
        self.equations.warnings()
    }

    pub fn rail(&self) -> &RailGeometry {
        self.equations.rail()
    }

    pub fn initial_state(&self) -> StateVector {
        self.equations.rail().initial_state()
    }

    pub fn derivative(
        &self,
        t: f64,
        state: &StateVector,
        phase: PhaseKind,
    ) -> Result<StateVector, SimulationError> {
        self.equations.derivative(t, state, phase)
    }

    pub fn evaluate(
        &self,
        t: f64,
        state: &StateVector,
        phase: PhaseKind,
    ) -> Result<(StateVector, FlightDiagnostics), SimulationError> {
        self.equations.evaluate(t, state, phase)
    }

    fn record(
        &self,
        telemetry: &mut Telemetry,
        t: f64,
        state: &StateVector,
        phase: PhaseKind,
    ) -> Result<(), SimulationError> {
        let (_, diagnostics) = self.equations.evaluate(t, state, phase)?;
        telemetry.collect_data(TrajectorySample {
            t,
            state: *state,
            phase,
            diagnostics,
        });
        Ok(())
    }

    fn renormalize(state: &mut StateVector, t: f64) -> Result<(), SimulationError> {
        let norm = state.renormalize_attitude()?;
        if (norm - 1.0).abs() > QUATERNION_DRIFT_TOLERANCE {
            return Err(SimulationError::QuaternionDrift { t, norm });
        }
        Ok(())
    }

    pub fn simulate(&self) -> Result<FlightSolution, SimulationError> {
        let settings = &self.settings;
        let mut machine = PhaseMachine::new(
            self.rocket,
            *self.equations.rail(),
            self.environment.elevation,
            settings.terminate_on_apogee,
        );
        let mut telemetry = Telemetry::new();

        let mut t = 0.0;
        let mut state = self.initial_state();
        telemetry.open_phase(machine.current, t, state);
        self.record(&mut telemetry, t, &state, machine.current)?;

        let mut stepper = DormandPrince::new(Tolerances::new(settings.atol, settings.rtol));
        stepper.set_step_limits(settings.min_time_step, settings.max_time_step);
        let solver = BrentSolver::new(settings.root_tolerance, DEFAULT_ROOT_MAX_ITERATIONS);

        let trigger_values = |triggers: &[Trigger], t: f64, state: &StateVector| -> Vec<f64> {
            triggers.iter().map(|trigger| trigger.value(t, state)).collect()
        };

        let mut system = self.equations.system(machine.current);
        let mut f = system.rhs(t, &state.0)?;
        let mut triggers = machine.triggers(t);
        let mut g_prev = trigger_values(&triggers, t, &state);
        let mut h = settings.initial_time_step;
        let mut steps: u64 = 0;

        let termination = loop {
            if let Some(reason) = machine.termination {
                break reason;
            }
            if t >= settings.max_time {
                warn!(
                    "flight truncated at max_time = {} s in phase {}",
                    settings.max_time, machine.current
                );
                break TerminationReason::MaxTimeExceeded;
            }
            steps += 1;
            if steps > MAX_INTEGRATION_STEPS {
                return Err(SimulationError::PhysicsError(format!(
                    "integration exceeded {} steps at t = {} s",
                    MAX_INTEGRATION_STEPS, t
                )));
            }

            let mut h_try = h.min(stepper.h_max);
            let mut landing = None;
            if settings.max_time - t <= h_try {
                h_try = settings.max_time - t;
                landing = Some(settings.max_time);
            }
            if !settings.time_overshoot {
                let boundary = triggers
                    .iter()
                    .filter_map(Trigger::scheduled_time)
                    .filter(|&time| time > t + stepper.h_min)
                    .reduce(f64::min);
                if let Some(boundary) = boundary {
                    if boundary - t <= h_try {
                        h_try = boundary - t;
                        landing = Some(boundary);
                    }
                }
            }

            let result = stepper.step(&system, t, &state.0, &f, h_try)?;
            if !result.accepted {
                if result.h_next <= stepper.h_min {
                    if !result.y.iter().all(|v| v.is_finite()) {
                        return Err(SimulationError::NonFiniteState { t });
                    }
                    return Err(SimulationError::StepSizeTooSmall { t, h: result.h_next });
                }
                h = result.h_next;
                continue;
            }
            h = result.h_next;

            let t_new = match landing {
                Some(boundary) if h_try >= stepper.h_min => boundary,
                _ => result.t,
            };
            let new_state = StateVector(result.y);
            if !new_state.is_finite() {
                return Err(SimulationError::NonFiniteState { t: t_new });
            }
            let g_new = trigger_values(&triggers, t_new, &new_state);
            let segment = DenseSegment {
                t0: t,
                y0: state.0,
                f0: f,
                t1: t_new,
                y1: result.y,
                f1: result.f,
            };

            match locate_first_event(&triggers, &g_prev, &g_new, &segment, &solver)? {
                Some(crossing) => {
                    t = crossing.t;
                    state = crossing.state;
                    Self::renormalize(&mut state, t)?;
                    self.record(&mut telemetry, t, &state, machine.current)?;
                    telemetry.record_event(EventRecord {
                        kind: crossing.kind,
                        t,
                        state,
                    });

                    let previous = machine.current;
                    let (next, deployed) = machine.handle(crossing.kind, t, &state);
                    debug!("{} at t = {:.4} s, z = {:.2} m", crossing.kind, t, state.altitude());
                    for kind in deployed {
                        debug!("{} already satisfied at t = {:.4} s", kind, t);
                        telemetry.record_event(EventRecord { kind, t, state });
                    }
                    if next != previous {
                        debug!("phase {} -> {} at t = {:.4} s", previous, next, t);
                        telemetry.close_phase(t, Some(crossing.kind));
                        telemetry.open_phase(next, t, state);
                    }

                    system = self.equations.system(next);
                    f = system.rhs(t, &state.0)?;
                    triggers = machine.triggers(t);
                    g_prev = trigger_values(&triggers, t, &state);
                }
                None => {
                    t = t_new;
                    state = new_state;
                    Self::renormalize(&mut state, t)?;
                    f = result.f;
                    g_prev = g_new;
                    self.record(&mut telemetry, t, &state, machine.current)?;
                }
            }
        };
        telemetry.close_phase(t, None);

        let solution = FlightSolution {
            telemetry,
            termination,
            mode: self.simulation_mode(),
            warnings: self.warnings().to_vec(),
            stats: stepper.stats,
            elevation: self.environment.elevation,
            burn_out_time: self.rocket.burn_out_time(),
        };
        info!(
            "flight finished ({:?}) at t = {:.3} s, apogee {:.2} m AGL, {} steps",
            termination,
            solution.t_final(),
            solution.apogee_agl(),
            solution.stats.accepted_steps
        );
        Ok(solution)
    }
}

/// Output of [`Flight::simulate`].
#[derive(Debug, Clone)]
pub struct FlightSolution {
    pub telemetry: Telemetry,
    pub termination: TerminationReason,
    pub mode: SimulationMode,
    pub warnings: Vec<SimulationWarning>,
    pub stats: Stats,
    elevation: f64,
    burn_out_time: f64,
}

impl FlightSolution {
    pub fn samples(&self) -> &[TrajectorySample] {
        self.telemetry.samples()
    }

    pub fn events(&self) -> &[EventRecord] {
        self.telemetry.events()
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        self.telemetry.phases()
    }

    pub fn is_truncated(&self) -> bool {
        self.termination == TerminationReason::MaxTimeExceeded
    }

    pub fn t_final(&self) -> f64 {
        self.samples().last().map_or(0.0, |sample| sample.t)
    }

    pub fn final_state(&self) -> Option<StateVector> {
        self.samples().last().map(|sample| sample.state)
    }

    /// Highest altitude above sea level.
    pub fn apogee(&self) -> f64 {
        match self.telemetry.event(EventKind::Apogee) {
            Some(event) => event.state.altitude(),
            None => self.telemetry.max_by(|sample| sample.state.altitude()),
        }
    }

    pub fn apogee_agl(&self) -> f64 {
        self.apogee() - self.elevation
    }

    pub fn apogee_time(&self) -> Option<f64> {
        self.telemetry.event(EventKind::Apogee).map(|event| event.t)
    }

    pub fn out_of_rail_time(&self) -> Option<f64> {
        self.telemetry.event(EventKind::RailExit).map(|event| event.t)
    }

    pub fn out_of_rail_velocity(&self) -> Option<f64> {
        self.telemetry
            .event(EventKind::RailExit)
            .map(|event| event.state.speed())
    }

    pub fn impact_velocity(&self) -> Option<f64> {
        self.telemetry
            .event(EventKind::Impact)
            .map(|event| event.state.vertical_velocity())
    }

    pub fn max_speed(&self) -> f64 {
        self.telemetry.max_by(|sample| sample.state.speed())
    }

    pub fn max_mach(&self) -> f64 {
        self.telemetry.max_by(|sample| sample.diagnostics.mach)
    }

    pub fn altitude(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Altitude (m)", |s| s.state.altitude())
    }

    pub fn vertical_velocity(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Vertical Velocity (m/s)", |s| s.state.vertical_velocity())
    }

    pub fn speed(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Speed (m/s)", |s| s.state.speed())
    }

    pub fn mach_number(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Mach Number", |s| s.diagnostics.mach)
    }

    pub fn reynolds_number(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Reynolds Number", |s| s.diagnostics.reynolds)
    }

    pub fn angle_of_attack(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Angle of Attack (deg)", |s| s.diagnostics.angle_of_attack)
    }

    pub fn drag_coefficient(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Drag Coefficient", |s| s.diagnostics.drag_coefficient)
    }

    pub fn dynamic_pressure(&self) -> Result<TimeSeries, SimulationError> {
        self.telemetry.series("Dynamic Pressure (Pa)", |s| s.diagnostics.dynamic_pressure)
    }

    pub fn summary(&self) -> FlightSummary {
        FlightSummary {
            mode: self.mode,
            apogee: self.apogee(),
            apogee_agl: self.apogee_agl(),
            apogee_time: self.apogee_time(),
            out_of_rail_time: self.out_of_rail_time(),
            out_of_rail_velocity: self.out_of_rail_velocity(),
            burn_out_time: self.burn_out_time,
            max_speed: self.max_speed(),
            max_mach: self.max_mach(),
            impact_velocity: self.impact_velocity(),
            t_final: self.t_final(),
            truncated: self.is_truncated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::propulsion::Motor;
    use crate::control::rocket::{Parachute, PointMassRocket};
    use crate::utils::grid_function::GridFunction;
    use approx::assert_relative_eq;

    fn rocket_with(thrust: f64, parachutes: Vec<Parachute>) -> PointMassRocket {
        let mut rocket =
            PointMassRocket::new(0.05, 2.0, GridFunction::constant(0.5), GridFunction::constant(0.6))
                .unwrap();
        rocket.add_motor(Motor::constant_thrust(thrust, 2.2, 1.0, 0.5).unwrap());
        for parachute in parachutes {
            rocket.add_parachute(parachute);
        }
        rocket
    }

    fn settings() -> FlightSettings {
        FlightSettings::default()
            .with_simulation_mode("3 DOF")
            .unwrap()
            .with_rail(1.0, 85.0, 0.0)
    }

    #[test]
    fn test_phase_sequence_without_parachutes() {
        let rocket = rocket_with(150.0, vec![]);
        let environment = Environment::standard_atmosphere().unwrap();
        let flight = Flight::new(&rocket, &environment, settings()).unwrap();
        let solution = flight.simulate().unwrap();

        let kinds: Vec<PhaseKind> = solution.phases().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PhaseKind::Rail,
                PhaseKind::PoweredAscent,
                PhaseKind::UnpoweredAscent,
                PhaseKind::ApogeeToEvent,
                PhaseKind::Terminated,
            ]
        );
        assert_eq!(solution.termination, TerminationReason::Impact);
        let burnout = solution.telemetry.event(EventKind::Burnout).unwrap();
        assert_relative_eq!(burnout.t, 2.2, epsilon = 1e-6);

        let impact = solution.telemetry.event(EventKind::Impact).unwrap();
        assert!(impact.state.altitude().abs() < 1e-3);
        assert!(solution.impact_velocity().unwrap() < 0.0);
    }

    #[test]
    fn test_phases_are_contiguous() {
        let rocket = rocket_with(150.0, vec![]);
        let environment = Environment::standard_atmosphere().unwrap();
        let solution = Flight::new(&rocket, &environment, settings())
            .unwrap()
            .simulate()
            .unwrap();
        for pair in solution.phases().windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!(pair[0].ended_by.is_some());
        }
        let times: Vec<f64> = solution.samples().iter().map(|s| s.t).collect();
        assert!(times.windows(2).all(|w| w[1] > w[0]));

        let reynolds = solution.reynolds_number().unwrap();
        assert_eq!(reynolds.x_array(), times.as_slice());
        assert!(reynolds.y_array().iter().all(|&re| re >= 0.0));
    }

    #[test]
    fn test_terminate_on_apogee() {
        let rocket = rocket_with(150.0, vec![]);
        let environment = Environment::standard_atmosphere().unwrap();
        let mut settings = settings();
        settings.terminate_on_apogee = true;
        let solution = Flight::new(&rocket, &environment, settings)
            .unwrap()
            .simulate()
            .unwrap();
        assert_eq!(solution.termination, TerminationReason::Apogee);
        assert_relative_eq!(solution.t_final(), solution.apogee_time().unwrap());
        assert!(solution.final_state().unwrap().vertical_velocity().abs() < 1e-3);
        assert!(solution.telemetry.event(EventKind::Impact).is_none());
    }

    #[test]
    fn test_weak_motor_stays_on_rail() {
        let rocket = rocket_with(10.0, vec![]);
        let environment = Environment::standard_atmosphere().unwrap();
        let mut settings = settings();
        settings.max_time = 20.0;
        let flight = Flight::new(&rocket, &environment, settings).unwrap();
        let solution = flight.simulate().unwrap();
        assert!(solution.is_truncated());
        assert_eq!(solution.t_final(), 20.0);
        assert_eq!(solution.phases().len(), 1);
        assert_eq!(solution.phases()[0].kind, PhaseKind::Rail);
        assert!(solution.out_of_rail_time().is_none());
        assert_eq!(solution.final_state().unwrap().position(), flight.rail().origin);
    }

    #[test]
    fn test_lagged_parachute_inflates_after_apogee() {
        let drogue = Parachute::new("drogue", 0.5, DeploymentTrigger::Apogee, 1.5);
        let rocket = rocket_with(150.0, vec![drogue]);
        let environment = Environment::standard_atmosphere().unwrap();
        let solution = Flight::new(&rocket, &environment, settings())
            .unwrap()
            .simulate()
            .unwrap();
        let apogee = solution.apogee_time().unwrap();
        let inflation = solution
            .telemetry
            .event(EventKind::ParachuteInflation(0))
            .unwrap();
        assert_relative_eq!(inflation.t, apogee + 1.5, epsilon = 1e-6);
        assert!(solution
            .phases()
            .iter()
            .any(|p| p.kind == PhaseKind::ParachuteDescent { parachute: 0 }));
    }

    #[test]
    fn test_altitude_deployment_above_apogee_fires_at_apogee() {
        let main = Parachute::new("main", 5.0, DeploymentTrigger::Altitude(2000.0), 1.0);
        let rocket = rocket_with(150.0, vec![main]);
        let environment = Environment::standard_atmosphere().unwrap();
        let solution = Flight::new(&rocket, &environment, settings())
            .unwrap()
            .simulate()
            .unwrap();

        let apogee = solution.apogee_time().unwrap();
        let deployment = solution
            .telemetry
            .event(EventKind::ParachuteTrigger(0))
            .unwrap();
        assert_eq!(deployment.t, apogee);
        let inflation = solution
            .telemetry
            .event(EventKind::ParachuteInflation(0))
            .unwrap();
        assert_relative_eq!(inflation.t, apogee + 1.0, epsilon = 1e-6);
        let kinds: Vec<PhaseKind> = solution.phases().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds[3..],
            [
                PhaseKind::ApogeeToEvent,
                PhaseKind::ParachuteDescent { parachute: 0 },
                PhaseKind::Terminated,
            ]
        );
    }

    #[test]
    fn test_quaternion_drift_beyond_tolerance_is_an_error() {
        let mut state = StateVector::zeros();
        state.set_quaternion(&nalgebra::Quaternion::new(1.01, 0.0, 0.0, 0.0));
        let err = Flight::renormalize(&mut state, 4.0).unwrap_err();
        match err {
            SimulationError::QuaternionDrift { t, norm } => {
                assert_eq!(t, 4.0);
                assert_relative_eq!(norm, 1.01, epsilon = 1e-12);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_small_quaternion_drift_is_renormalized() {
        let mut state = StateVector::zeros();
        state.set_quaternion(&nalgebra::Quaternion::new(0.0, 0.0, 1.0005, 0.0));
        Flight::renormalize(&mut state, 4.0).unwrap();
        assert_relative_eq!(state.quaternion().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(state.0[8], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_time_boundaries_without_overshoot() {
        let rocket = rocket_with(150.0, vec![]);
        let environment = Environment::standard_atmosphere().unwrap();
        let mut settings = settings();
        settings.time_overshoot = false;
        let solution = Flight::new(&rocket, &environment, settings)
            .unwrap()
            .simulate()
            .unwrap();
        let burnout = solution.telemetry.event(EventKind::Burnout).unwrap();
        assert_relative_eq!(burnout.t, 2.2, epsilon = 1e-9);
        assert!(solution.samples().iter().any(|s| (s.t - 2.2).abs() < 1e-9));
    }
}
