//! Events emitted by the simulation.
//!
//! These are the hooks for anything that records what happened during a run,
//! such as [`crate::event_report`]. The simulation itself never reads them back.
use serde::Serialize;

use crate::context::SimulationEvent;
use crate::people::PersonId;

/// One interaction trial between an infected source and a sampled target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionEvent {
    pub time_step: usize,
    pub source_id: PersonId,
    pub target_id: PersonId,
    pub infected: bool,
    pub target_vaccinated: bool,
    pub target_previously_infected: bool,
}

impl SimulationEvent for InteractionEvent {}

/// An infection resolved at the end of a time step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InfectionOutcomeEvent {
    pub time_step: usize,
    pub person_id: PersonId,
    pub survived: bool,
}

impl SimulationEvent for InfectionOutcomeEvent {}

/// A time step finished. Counters are the values after the step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimeStepEvent {
    pub time_step: usize,
    pub current_infected: usize,
    pub total_infected: usize,
    pub total_dead: usize,
    pub alive: usize,
}

impl SimulationEvent for TimeStepEvent {}
