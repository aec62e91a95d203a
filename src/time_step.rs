//! One round of the simulation.
//!
//! A time step runs in two phases. First every infected individual (as of the
//! start of the step) interacts with `interactions_per_step` targets drawn
//! uniformly from everyone alive at the start of the step, and then resolves
//! its infection. Only then are the targets that caught the pathogen marked
//! infected, so each step is exactly one generation of infection.
use std::rc::Rc;

use log::{debug, trace};
use serde::Serialize;

use crate::context::Context;
use crate::error::HerdError;
use crate::events::{InfectionOutcomeEvent, InteractionEvent};
use crate::parameters::ContextParametersExt;
use crate::pathogen::Pathogen;
use crate::people::{ContextPeopleExt, InfectionOutcome, Individual, PersonId};
use crate::random::{sample_single_from_known_length, ContextRandomExt};
use crate::simulation::SimulationRng;
use crate::transmission_manager::interact;

/// What happened during one time step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub time_step: usize,
    /// Infected individuals at the start of the step.
    pub sources: usize,
    pub interactions: usize,
    /// Infections applied at the end of the step.
    pub newly_infected: usize,
    pub deaths: usize,
    pub recoveries: usize,
    /// Infected individuals after the step.
    pub current_infected: usize,
}

fn get_person(context: &Context, person_id: PersonId) -> Result<&Individual, HerdError> {
    context
        .get_person(person_id)
        .ok_or_else(|| HerdError::InvariantViolation(format!("unknown person {person_id}")))
}

fn get_person_mut(context: &mut Context, person_id: PersonId) -> Result<&mut Individual, HerdError> {
    context
        .get_person_mut(person_id)
        .ok_or_else(|| HerdError::InvariantViolation(format!("unknown person {person_id}")))
}

/// Every infected source meets `interactions_per_step` targets. Returns the
/// buffered targets to infect at the end of the step, in the order decided.
fn run_interactions(
    context: &mut Context,
    time_step: usize,
    sources: &[PersonId],
    alive: &[PersonId],
    report: &mut StepReport,
) -> Result<Vec<PersonId>, HerdError> {
    let interactions_per_step = context.get_parameters()?.interactions_per_step;
    let mut newly_infected = Vec::new();

    for &source_id in sources {
        for _ in 0..interactions_per_step {
            let (target_id, result) = context.sample(SimulationRng, |rng| {
                let target_id = sample_single_from_known_length(rng, alive.iter().copied())
                    .ok_or_else(|| {
                        HerdError::InvariantViolation("no one is alive to interact with".into())
                    })?;
                let source = get_person(context, source_id)?;
                let target = get_person(context, target_id)?;
                interact(source, target, rng).map(|result| (target_id, result))
            })?;

            if result.infected {
                newly_infected.push(target_id);
            }
            report.interactions += 1;
            context.emit_event(InteractionEvent {
                time_step,
                source_id,
                target_id,
                infected: result.infected,
                target_vaccinated: result.target_vaccinated,
                target_previously_infected: result.target_previously_infected,
            });
        }
    }
    Ok(newly_infected)
}

/// Each source's infection ends in death or recovery, once per step.
fn resolve_infections(
    context: &mut Context,
    time_step: usize,
    sources: &[PersonId],
    report: &mut StepReport,
) -> Result<(), HerdError> {
    for &person_id in sources {
        let outcome = context.sample(SimulationRng, |rng| {
            get_person(context, person_id)?.draw_outcome(rng)
        })?;
        get_person_mut(context, person_id)?.apply_outcome(outcome)?;

        match outcome {
            InfectionOutcome::Died => report.deaths += 1,
            InfectionOutcome::Recovered => report.recoveries += 1,
        }
        context.emit_event(InfectionOutcomeEvent {
            time_step,
            person_id,
            survived: outcome.survived(),
        });
    }
    Ok(())
}

/// Infects every buffered target that is still susceptible. A target exposed
/// more than once in the step is infected once.
fn apply_new_infections(
    context: &mut Context,
    newly_infected: Vec<PersonId>,
    pathogen: &Rc<Pathogen>,
) -> Result<usize, HerdError> {
    let mut applied = 0;
    for person_id in newly_infected {
        let person = get_person_mut(context, person_id)?;
        if person.is_susceptible() {
            person.infect(Rc::clone(pathogen));
            applied += 1;
        } else {
            trace!("skipping infection of {person_id}: no longer susceptible");
        }
    }
    Ok(applied)
}

/// Runs time step number `time_step`.
///
/// # Errors
///
/// Returns `HerdError::InvariantViolation` if the population is in an
/// impossible state, or if parameters were never set.
pub fn run_time_step(
    context: &mut Context,
    time_step: usize,
    pathogen: &Rc<Pathogen>,
) -> Result<StepReport, HerdError> {
    // Snapshot once: people infected during this step are not sources until
    // the next one.
    let sources = context.query_infected();
    let alive = context.query_alive();
    trace!(
        "step {time_step}: {} sources among {} alive",
        sources.len(),
        alive.len()
    );

    let mut report = StepReport {
        time_step,
        sources: sources.len(),
        ..StepReport::default()
    };

    let newly_infected = run_interactions(context, time_step, &sources, &alive, &mut report)?;
    resolve_infections(context, time_step, &sources, &mut report)?;
    report.newly_infected = apply_new_infections(context, newly_infected, pathogen)?;
    report.current_infected = context.count_infected();

    debug!(
        "step {time_step}: {} newly infected, {} died, {} recovered, {} infected",
        report.newly_infected, report.deaths, report.recoveries, report.current_infected
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::parameters::Parameters;
    use crate::population_loader;

    fn setup(parameters: Parameters, seed: u64) -> (Context, Rc<Pathogen>) {
        let mut context = Context::new();
        context.init_random(seed);
        let pathogen = Rc::new(parameters.pathogen().unwrap());
        context.set_parameters(parameters).unwrap();
        population_loader::init(&mut context, &pathogen).unwrap();
        (context, pathogen)
    }

    #[test]
    fn all_vaccinated_means_no_new_infections() {
        let parameters = Parameters::new(10, 1.0, "Test", 0.0, 0.9);
        let (mut context, pathogen) = setup(parameters, 42);
        let report = run_time_step(&mut context, 1, &pathogen).unwrap();
        assert_eq!(report.sources, 1);
        assert_eq!(report.interactions, 100);
        assert_eq!(report.newly_infected, 0);
        assert_eq!(report.recoveries, 1);
        assert_eq!(report.current_infected, 0);
    }

    #[test]
    fn new_infections_wait_for_the_next_step() {
        let parameters = Parameters::new(100, 0.0, "Test", 0.0, 1.0);
        let (mut context, pathogen) = setup(parameters, 42);
        let report = run_time_step(&mut context, 1, &pathogen).unwrap();

        // The seed recovered; everyone it reached is infected and unresolved.
        let seed = context.get_person(PersonId::new(0)).unwrap();
        assert!(seed.is_vaccinated());
        assert!(!seed.is_infected());
        assert_eq!(report.recoveries, 1);
        assert!(report.newly_infected > 0);
        assert_eq!(report.current_infected, report.newly_infected);
        assert_eq!(context.count_infected(), report.newly_infected);
        for person in context.get_people() {
            assert!(!(person.is_infected() && person.is_vaccinated()));
        }
    }

    #[test]
    fn each_source_resolves_exactly_once() {
        let parameters = Parameters::new(50, 0.2, "Test", 0.5, 0.5).with_initial_infected(10);
        let (mut context, pathogen) = setup(parameters, 7);

        let resolved = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&resolved);
        context.subscribe_to_event(move |_context, event: InfectionOutcomeEvent| {
            sink.borrow_mut().push(event.person_id);
        });

        let report = run_time_step(&mut context, 1, &pathogen).unwrap();
        context.execute();

        let expected: Vec<PersonId> = (0..10).map(PersonId::new).collect();
        assert_eq!(*resolved.borrow(), expected);
        assert_eq!(report.deaths + report.recoveries, 10);
        assert_eq!(context.count_dead(), report.deaths);
    }

    #[test]
    fn interaction_events_match_trials() {
        let parameters = Parameters::new(30, 0.3, "Test", 0.2, 0.4)
            .with_initial_infected(3)
            .with_interactions_per_step(25);
        let (mut context, pathogen) = setup(parameters, 11);

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        context.subscribe_to_event(move |_context, event: InteractionEvent| {
            sink.borrow_mut().push(event);
        });

        let report = run_time_step(&mut context, 1, &pathogen).unwrap();
        context.execute();

        let events = events.borrow();
        assert_eq!(events.len(), 75);
        assert_eq!(report.interactions, 75);
        // Sources are visited in id order.
        assert!(events[..25].iter().all(|e| e.source_id == PersonId::new(0)));
        assert!(events[50..].iter().all(|e| e.source_id == PersonId::new(2)));
        for event in events.iter() {
            assert_eq!(event.time_step, 1);
            if event.infected {
                assert!(!event.target_vaccinated && !event.target_previously_infected);
            }
        }
        let infected_events = events.iter().filter(|e| e.infected).count();
        assert!(report.newly_infected <= infected_events);
    }

    #[test]
    fn dead_are_never_sampled() {
        let parameters = Parameters::new(20, 0.0, "Test", 1.0, 1.0).with_initial_infected(10);
        let (mut context, pathogen) = setup(parameters, 3);
        // Everyone infected dies at the end of step 1.
        let first = run_time_step(&mut context, 1, &pathogen).unwrap();
        assert_eq!(first.deaths, 10);

        let targets = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&targets);
        context.subscribe_to_event(move |_context, event: InteractionEvent| {
            sink.borrow_mut().push(event.target_id);
        });
        run_time_step(&mut context, 2, &pathogen).unwrap();
        context.execute();

        for target in targets.borrow().iter() {
            assert!(target.index() >= 10, "dead person {target} was sampled");
        }
    }

    #[test]
    fn no_sources_means_no_draws() {
        let parameters = Parameters::new(5, 0.0, "Test", 0.5, 0.5).with_initial_infected(0);
        let (mut context, pathogen) = setup(parameters, 1);
        let report = run_time_step(&mut context, 1, &pathogen).unwrap();
        assert_eq!(report, StepReport { time_step: 1, ..StepReport::default() });
    }

    #[test]
    fn same_seed_same_step() {
        let run = || {
            let parameters =
                Parameters::new(200, 0.4, "Test", 0.3, 0.3).with_initial_infected(5);
            let (mut context, pathogen) = setup(parameters, 1234);
            let first = run_time_step(&mut context, 1, &pathogen).unwrap();
            let second = run_time_step(&mut context, 2, &pathogen).unwrap();
            (first, second)
        };
        assert_eq!(run(), run());
    }
}
