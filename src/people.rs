//! Individuals and the population they belong to.
//!
//! The population is a fixed-size `Vec<Individual>` stored on the `Context`
//! and indexed by `PersonId`. Nobody is ever removed: death only clears
//! `is_alive`, so ids and slots stay valid for bookkeeping.
use std::fmt::{self, Display};
use std::rc::Rc;

use log::trace;
use serde::Serialize;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::HerdError;
use crate::pathogen::Pathogen;
use crate::rand::Rng;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(usize);

impl PersonId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        PersonId(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an infection ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum InfectionOutcome {
    Died,
    Recovered,
}

impl InfectionOutcome {
    #[must_use]
    pub fn survived(self) -> bool {
        self == InfectionOutcome::Recovered
    }
}

#[derive(Debug, Clone)]
pub struct Individual {
    id: PersonId,
    is_vaccinated: bool,
    is_alive: bool,
    infection: Option<Rc<Pathogen>>,
}

impl Individual {
    /// Creates a living individual.
    ///
    /// # Panics
    ///
    /// Panics if the individual is both vaccinated and infected.
    #[must_use]
    pub fn new(id: PersonId, is_vaccinated: bool, infection: Option<Rc<Pathogen>>) -> Self {
        assert!(
            !(is_vaccinated && infection.is_some()),
            "person {id} cannot start out both vaccinated and infected"
        );
        Individual {
            id,
            is_vaccinated,
            is_alive: true,
            infection,
        }
    }

    #[must_use]
    pub fn id(&self) -> PersonId {
        self.id
    }

    #[must_use]
    pub fn is_vaccinated(&self) -> bool {
        self.is_vaccinated
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    #[must_use]
    pub fn is_infected(&self) -> bool {
        self.infection.is_some()
    }

    #[must_use]
    pub fn infection(&self) -> Option<&Rc<Pathogen>> {
        self.infection.as_ref()
    }

    /// Alive, unvaccinated and not currently infected.
    #[must_use]
    pub fn is_susceptible(&self) -> bool {
        self.is_alive && !self.is_vaccinated && self.infection.is_none()
    }

    pub(crate) fn infect(&mut self, pathogen: Rc<Pathogen>) {
        debug_assert!(self.is_susceptible());
        self.infection = Some(pathogen);
    }

    // The infection of a living person, or why there is none to resolve.
    fn current_infection(&self) -> Result<&Rc<Pathogen>, HerdError> {
        match (&self.infection, self.is_alive) {
            (Some(pathogen), true) => Ok(pathogen),
            (_, false) => Err(HerdError::InvariantViolation(format!(
                "cannot resolve an infection for dead person {}",
                self.id
            ))),
            (None, true) => Err(HerdError::InvariantViolation(format!(
                "person {} has no infection to resolve",
                self.id
            ))),
        }
    }

    /// Decides how the current infection ends without changing any state.
    ///
    /// Draws one uniform value `r` in `[0, 1)`: `r < mortality_rate` is a
    /// death, anything else (including `r == mortality_rate`) a recovery.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::InvariantViolation`, without drawing, if the
    /// individual is dead or not infected.
    pub fn draw_outcome<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<InfectionOutcome, HerdError> {
        let pathogen = self.current_infection()?;
        let r: f64 = rng.random();
        if r < pathogen.mortality_rate() {
            Ok(InfectionOutcome::Died)
        } else {
            Ok(InfectionOutcome::Recovered)
        }
    }

    /// Applies a decided outcome: death is terminal, recovery vaccinates.
    /// The infection is cleared either way.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::InvariantViolation`, changing nothing, if the
    /// individual is dead or not infected.
    pub fn apply_outcome(&mut self, outcome: InfectionOutcome) -> Result<(), HerdError> {
        self.current_infection()?;
        match outcome {
            InfectionOutcome::Died => {
                self.is_alive = false;
            }
            InfectionOutcome::Recovered => {
                self.is_vaccinated = true;
            }
        }
        self.infection = None;
        Ok(())
    }

    /// Resolves the current infection into death or recovery.
    ///
    /// # Errors
    ///
    /// See [`Individual::draw_outcome`].
    pub fn resolve_infection<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<InfectionOutcome, HerdError> {
        let outcome = self.draw_outcome(rng)?;
        self.apply_outcome(outcome)?;
        Ok(outcome)
    }
}

#[derive(Default)]
struct PeopleData {
    population: Vec<Individual>,
}

define_data_plugin!(PeoplePlugin, PeopleData, PeopleData::default());

pub trait ContextPeopleExt {
    /// Replaces the population. Ids must equal positions.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::InvariantViolation` if an individual's id does not
    /// match its index.
    fn set_population(&mut self, population: Vec<Individual>) -> Result<(), HerdError>;

    /// Number of individuals, living or dead.
    fn get_current_population(&self) -> usize;

    fn get_person(&self, person_id: PersonId) -> Option<&Individual>;

    fn get_person_mut(&mut self, person_id: PersonId) -> Option<&mut Individual>;

    /// Every individual, in id order.
    fn get_people(&self) -> &[Individual];

    fn count_alive(&self) -> usize;

    fn count_infected(&self) -> usize;

    fn count_dead(&self) -> usize;

    /// Ids of the living, in id order.
    fn query_alive(&self) -> Vec<PersonId>;

    /// Ids of the living who are infected, in id order.
    fn query_infected(&self) -> Vec<PersonId>;
}

impl ContextPeopleExt for Context {
    fn set_population(&mut self, population: Vec<Individual>) -> Result<(), HerdError> {
        if let Some((index, person)) = population
            .iter()
            .enumerate()
            .find(|(index, person)| person.id().index() != *index)
        {
            return Err(HerdError::InvariantViolation(format!(
                "person {} stored at position {index}",
                person.id()
            )));
        }
        trace!("installing population of {}", population.len());
        self.get_data_mut(PeoplePlugin).population = population;
        Ok(())
    }

    fn get_current_population(&self) -> usize {
        self.get_people().len()
    }

    fn get_person(&self, person_id: PersonId) -> Option<&Individual> {
        self.get_people().get(person_id.index())
    }

    fn get_person_mut(&mut self, person_id: PersonId) -> Option<&mut Individual> {
        self.get_data_mut(PeoplePlugin)
            .population
            .get_mut(person_id.index())
    }

    fn get_people(&self) -> &[Individual] {
        match self.get_data(PeoplePlugin) {
            Some(people_data) => &people_data.population,
            None => &[],
        }
    }

    fn count_alive(&self) -> usize {
        self.get_people().iter().filter(|p| p.is_alive()).count()
    }

    fn count_infected(&self) -> usize {
        self.get_people()
            .iter()
            .filter(|p| p.is_alive() && p.is_infected())
            .count()
    }

    fn count_dead(&self) -> usize {
        self.get_current_population() - self.count_alive()
    }

    fn query_alive(&self) -> Vec<PersonId> {
        self.get_people()
            .iter()
            .filter(|p| p.is_alive())
            .map(Individual::id)
            .collect()
    }

    fn query_infected(&self) -> Vec<PersonId> {
        self.get_people()
            .iter()
            .filter(|p| p.is_alive() && p.is_infected())
            .map(Individual::id)
            .collect()
    }
}
