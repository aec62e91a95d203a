//! The simulation controller.
//!
//! `init` validates the parameters, builds the population and schedules the
//! first time step as a plan at `t = 1`. Every step plan runs one round of
//! [`crate::time_step`], updates the counters, and either schedules the next
//! step or stops:
//!
//! * nobody alive: `StoppedExtinct`
//! * nobody infected: `StoppedCured`
//! * `max_steps` reached: `StepLimitReached`, with a warning
//!
//! `run` executes the context and returns a [`SimulationSummary`].
use std::fmt::{self, Display};
use std::rc::Rc;

use log::{error, info, trace, warn};
use serde::Serialize;

use crate::context::Context;
use crate::error::HerdError;
use crate::events::TimeStepEvent;
use crate::parameters::{ContextParametersExt, Parameters};
use crate::pathogen::Pathogen;
use crate::people::ContextPeopleExt;
use crate::random::ContextRandomExt;
use crate::time_step::run_time_step;
use crate::{define_data_plugin, define_rng, population_loader};

// Every draw in a run comes from this single stream.
define_rng!(SimulationRng);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SimulationStatus {
    #[default]
    Running,
    /// Everyone died.
    StoppedExtinct,
    /// No infections remain and someone is alive.
    StoppedCured,
    /// `max_steps` ran out while people were still infected.
    StepLimitReached,
}

impl SimulationStatus {
    #[must_use]
    pub fn is_stopped(self) -> bool {
        self != SimulationStatus::Running
    }
}

impl Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self {
            SimulationStatus::Running => "running",
            SimulationStatus::StoppedExtinct => "stopped: population extinct",
            SimulationStatus::StoppedCured => "stopped: no infections remain",
            SimulationStatus::StepLimitReached => "stopped: step limit reached",
        };
        f.write_str(status)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SimulationCounters {
    pub current_infected: usize,
    /// Everyone ever infected, including the initial infections.
    pub total_infected: usize,
    pub total_dead: usize,
    pub time_step_counter: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub time_steps: usize,
    pub total_infected: usize,
    pub total_dead: usize,
    pub alive: usize,
    pub status: SimulationStatus,
}

impl Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "The simulation has ended after {} turns.", self.time_steps)?;
        writeln!(f, "status: {}", self.status)?;
        writeln!(f, "total infected: {}", self.total_infected)?;
        writeln!(f, "total dead: {}", self.total_dead)?;
        write!(f, "still alive: {}", self.alive)
    }
}

#[derive(Default)]
struct SimulationData {
    pathogen: Option<Rc<Pathogen>>,
    counters: SimulationCounters,
    status: SimulationStatus,
    // Set when a step fails; `run` hands it back to the caller.
    error: Option<HerdError>,
}

define_data_plugin!(SimulationPlugin, SimulationData, SimulationData::default());

pub trait ContextSimulationExt {
    fn get_simulation_counters(&self) -> SimulationCounters;

    fn get_simulation_status(&self) -> SimulationStatus;

    /// The pathogen shared by every infection in this run.
    fn get_pathogen(&self) -> Option<Rc<Pathogen>>;
}

impl ContextSimulationExt for Context {
    fn get_simulation_counters(&self) -> SimulationCounters {
        self.get_data(SimulationPlugin)
            .map(|data| data.counters)
            .unwrap_or_default()
    }

    fn get_simulation_status(&self) -> SimulationStatus {
        self.get_data(SimulationPlugin)
            .map(|data| data.status)
            .unwrap_or_default()
    }

    fn get_pathogen(&self) -> Option<Rc<Pathogen>> {
        self.get_data(SimulationPlugin)
            .and_then(|data| data.pathogen.clone())
    }
}

/// The controller's state transition after a step.
#[must_use]
pub fn evaluate_termination(
    alive: usize,
    current_infected: usize,
    time_step_counter: usize,
    max_steps: usize,
) -> SimulationStatus {
    if alive < 1 {
        SimulationStatus::StoppedExtinct
    } else if current_infected == 0 {
        SimulationStatus::StoppedCured
    } else if time_step_counter >= max_steps {
        SimulationStatus::StepLimitReached
    } else {
        SimulationStatus::Running
    }
}

fn execute_step(context: &mut Context) -> Result<(), HerdError> {
    let pathogen = context.get_pathogen().ok_or_else(|| {
        HerdError::InvariantViolation("time step scheduled before initialization".to_string())
    })?;
    let max_steps = context.get_parameters()?.max_steps;
    let time_step = context.get_simulation_counters().time_step_counter + 1;

    let report = run_time_step(context, time_step, &pathogen)?;
    let alive = context.count_alive();
    if report.current_infected > alive {
        return Err(HerdError::InvariantViolation(format!(
            "{} infected but only {alive} alive",
            report.current_infected
        )));
    }

    let data = context.get_data_mut(SimulationPlugin);
    let counters = &mut data.counters;
    counters.time_step_counter = time_step;
    counters.current_infected = report.current_infected;
    counters.total_infected += report.newly_infected;
    counters.total_dead += report.deaths;
    let counters = *counters;
    data.status = evaluate_termination(alive, counters.current_infected, time_step, max_steps);
    let status = data.status;

    context.emit_event(TimeStepEvent {
        time_step,
        current_infected: counters.current_infected,
        total_infected: counters.total_infected,
        total_dead: counters.total_dead,
        alive,
    });

    match status {
        SimulationStatus::Running => {
            let next_time = context.get_current_time() + 1.0;
            context.add_plan(next_time, step_plan);
        }
        SimulationStatus::StepLimitReached => {
            warn!(
                "stopping after {time_step} steps with {} people still infected",
                counters.current_infected
            );
        }
        SimulationStatus::StoppedExtinct | SimulationStatus::StoppedCured => {
            info!("simulation {status} after {time_step} steps");
        }
    }
    Ok(())
}

fn step_plan(context: &mut Context) {
    if let Err(step_error) = execute_step(context) {
        error!("aborting simulation: {step_error}");
        context.get_data_mut(SimulationPlugin).error = Some(step_error);
        context.shutdown();
    }
}

/// Prepares a run: validates and stores `parameters`, builds the population
/// from `SimulationRng` and schedules the first time step. Call
/// `init_random` first.
///
/// # Errors
///
/// Returns `HerdError::ConfigurationError` for invalid parameters; nothing
/// is scheduled in that case.
pub fn init(context: &mut Context, parameters: Parameters) -> Result<(), HerdError> {
    trace!("Initializing simulation");
    context.set_parameters(parameters)?;
    let pathogen = Rc::new(context.get_parameters()?.pathogen()?);
    info!("simulating {pathogen}");

    population_loader::init(context, &pathogen)?;
    let initial_infected = context.count_infected();

    let data = context.get_data_mut(SimulationPlugin);
    data.pathogen = Some(pathogen);
    data.counters = SimulationCounters {
        current_infected: initial_infected,
        total_infected: initial_infected,
        total_dead: 0,
        time_step_counter: 0,
    };
    data.status = SimulationStatus::Running;
    data.error = None;

    context.add_plan(1.0, step_plan);
    Ok(())
}

/// Executes the context until the simulation stops.
///
/// # Errors
///
/// Returns the error that aborted a step, or `HerdError::InvariantViolation`
/// if the context ran out of plans before the simulation stopped.
pub fn run(context: &mut Context) -> Result<SimulationSummary, HerdError> {
    context.execute();

    let alive = context.count_alive();
    let data = context.get_data_mut(SimulationPlugin);
    if let Some(step_error) = data.error.take() {
        return Err(step_error);
    }
    if !data.status.is_stopped() {
        return Err(HerdError::InvariantViolation(
            "simulation ended without reaching a stopping condition".to_string(),
        ));
    }

    Ok(SimulationSummary {
        time_steps: data.counters.time_step_counter,
        total_infected: data.counters.total_infected,
        total_dead: data.counters.total_dead,
        alive,
        status: data.status,
    })
}

/// Runs a complete simulation on a fresh context seeded with `seed`.
///
/// # Errors
///
/// See [`init`] and [`run`].
pub fn run_simulation(parameters: Parameters, seed: u64) -> Result<SimulationSummary, HerdError> {
    let mut context = Context::new();
    context.init_random(seed);
    init(&mut context, parameters)?;
    run(&mut context)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn collect_steps(context: &mut Context) -> Rc<RefCell<Vec<TimeStepEvent>>> {
        let steps = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&steps);
        context.subscribe_to_event(move |_context, event: TimeStepEvent| {
            sink.borrow_mut().push(event);
        });
        steps
    }

    #[test]
    fn termination_rules() {
        assert_eq!(evaluate_termination(0, 0, 1, 10), SimulationStatus::StoppedExtinct);
        assert_eq!(evaluate_termination(5, 0, 1, 10), SimulationStatus::StoppedCured);
        assert_eq!(evaluate_termination(5, 2, 10, 10), SimulationStatus::StepLimitReached);
        assert_eq!(evaluate_termination(5, 2, 3, 10), SimulationStatus::Running);
        assert!(!SimulationStatus::Running.is_stopped());
        assert!(SimulationStatus::StoppedCured.is_stopped());
    }

    #[test]
    fn fully_vaccinated_population_is_cured_in_one_step() {
        let parameters = Parameters::new(10, 1.0, "Measles", 0.3, 0.9);
        let summary = run_simulation(parameters, 42).unwrap();
        assert_eq!(summary.status, SimulationStatus::StoppedCured);
        assert_eq!(summary.time_steps, 1);
        assert_eq!(summary.total_infected, 1);
        assert_eq!(summary.alive + summary.total_dead, 10);
    }

    #[test]
    fn lone_lethal_infection_is_extinct_in_one_step() {
        let parameters = Parameters::new(1, 0.0, "Ebola", 1.0, 0.5);
        let summary = run_simulation(parameters, 42).unwrap();
        assert_eq!(summary.status, SimulationStatus::StoppedExtinct);
        assert_eq!(summary.time_steps, 1);
        assert_eq!(summary.total_dead, 1);
        assert_eq!(summary.alive, 0);
    }

    #[test]
    fn harmless_certain_transmission_reaches_everyone() {
        let parameters = Parameters::new(100, 0.0, "Cold", 0.0, 1.0);
        let summary = run_simulation(parameters, 42).unwrap();
        assert_eq!(summary.status, SimulationStatus::StoppedCured);
        assert_eq!(summary.total_dead, 0);
        assert_eq!(summary.alive, 100);
        assert_eq!(summary.total_infected, 100);
        assert!(summary.time_steps <= 5, "{summary:?}");
    }

    #[test]
    fn no_initial_infections_stops_after_one_step() {
        let parameters = Parameters::new(20, 0.5, "Flu", 0.5, 0.5).with_initial_infected(0);
        let summary = run_simulation(parameters, 1).unwrap();
        assert_eq!(summary.status, SimulationStatus::StoppedCured);
        assert_eq!(summary.time_steps, 1);
        assert_eq!(summary.total_infected, 0);
    }

    #[test]
    fn step_limit_is_a_warning_not_a_failure() {
        let parameters = Parameters::new(1000, 0.0, "Flu", 0.0, 0.5)
            .with_initial_infected(10)
            .with_max_steps(1);
        let summary = run_simulation(parameters, 5).unwrap();
        assert_eq!(summary.status, SimulationStatus::StepLimitReached);
        assert_eq!(summary.time_steps, 1);
    }

    #[test]
    fn same_seed_same_run() {
        let parameters = Parameters::new(500, 0.3, "Flu", 0.2, 0.1).with_initial_infected(5);
        let first = run_simulation(parameters.clone(), 2024).unwrap();
        let second = run_simulation(parameters, 2024).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn counters_are_consistent_every_step() {
        let mut context = Context::new();
        context.init_random(99);
        let parameters = Parameters::new(300, 0.2, "Flu", 0.3, 0.2).with_initial_infected(3);
        init(&mut context, parameters).unwrap();
        let steps = collect_steps(&mut context);
        let summary = run(&mut context).unwrap();

        let steps = steps.borrow();
        assert_eq!(steps.len(), summary.time_steps);
        let mut previous = TimeStepEvent {
            time_step: 0,
            current_infected: 3,
            total_infected: 3,
            total_dead: 0,
            alive: 300,
        };
        for step in steps.iter() {
            assert_eq!(step.time_step, previous.time_step + 1);
            assert!(step.current_infected <= step.alive);
            assert!(step.total_infected >= previous.total_infected);
            assert!(step.total_dead >= previous.total_dead);
            assert_eq!(step.alive + step.total_dead, 300);
            previous = *step;
        }
        assert_eq!(previous.total_dead, summary.total_dead);
        assert_eq!(previous.total_infected, summary.total_infected);
        assert_eq!(context.get_simulation_counters().total_dead, summary.total_dead);
        assert!(context.get_simulation_status().is_stopped());
    }

    #[test]
    fn always_terminates() {
        for (seed, mortality_rate, transmission_rate) in
            [(1, 0.0, 1.0), (2, 0.01, 0.99), (3, 0.9, 0.9), (4, 0.5, 0.05)]
        {
            let parameters = Parameters::new(200, 0.1, "Flu", mortality_rate, transmission_rate)
                .with_initial_infected(2);
            let summary = run_simulation(parameters, seed).unwrap();
            assert!(summary.status.is_stopped());
            assert_ne!(summary.status, SimulationStatus::StepLimitReached);
            // The susceptible pool only shrinks, so a run cannot outlast it.
            assert!(summary.time_steps <= 201);
        }
    }

    #[test]
    fn invalid_parameters_do_not_start() {
        let mut context = Context::new();
        context.init_random(0);
        let parameters = Parameters::new(10, 0.5, "Flu", 0.5, 0.5).with_initial_infected(11);
        assert!(matches!(
            init(&mut context, parameters),
            Err(HerdError::ConfigurationError {
                parameter: "initial_infected",
                ..
            })
        ));
        assert_eq!(context.get_current_population(), 0);
        // Nothing was scheduled, so running reports the missing stop.
        assert!(matches!(
            run(&mut context),
            Err(HerdError::InvariantViolation(_))
        ));
    }

    #[test]
    fn step_errors_abort_the_run() {
        let mut context = Context::new();
        context.init_random(0);
        // A step with no initialized simulation fails.
        context.add_plan(1.0, step_plan);
        assert!(matches!(
            run(&mut context),
            Err(HerdError::InvariantViolation(_))
        ));
    }
}
