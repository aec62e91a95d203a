//! Builds the starting population.
//!
//! The first `initial_infected` ids carry the shared pathogen. Every later
//! individual is healthy and independently vaccinated with probability
//! `vacc_percentage`, consuming exactly one draw each.
use std::rc::Rc;

use log::{debug, trace};

use crate::context::Context;
use crate::error::HerdError;
use crate::parameters::{ContextParametersExt, MAX_POPULATION_SIZE};
use crate::pathogen::Pathogen;
use crate::people::{ContextPeopleExt, Individual, PersonId};
use crate::rand::Rng;
use crate::random::ContextRandomExt;
use crate::simulation::SimulationRng;

/// Creates `population_size` individuals with ids `0..population_size`.
///
/// # Errors
///
/// Returns `HerdError::ConfigurationError` for an empty population or one
/// above [`MAX_POPULATION_SIZE`], a vaccination rate outside `[0, 1]`, or
/// more initial infections than people.
pub fn create_population<R: Rng + ?Sized>(
    population_size: usize,
    vacc_percentage: f64,
    initial_infected: usize,
    pathogen: &Rc<Pathogen>,
    rng: &mut R,
) -> Result<Vec<Individual>, HerdError> {
    if population_size == 0 {
        return Err(HerdError::configuration(
            "population_size",
            "must be a positive integer",
        ));
    }
    if population_size > MAX_POPULATION_SIZE {
        return Err(HerdError::configuration(
            "population_size",
            format!("{population_size} exceeds the maximum of {MAX_POPULATION_SIZE}"),
        ));
    }
    if !(0.0..=1.0).contains(&vacc_percentage) {
        return Err(HerdError::configuration(
            "vacc_percentage",
            format!("must be in [0, 1], got {vacc_percentage}"),
        ));
    }
    if initial_infected > population_size {
        return Err(HerdError::configuration(
            "initial_infected",
            format!("{initial_infected} exceeds population_size {population_size}"),
        ));
    }

    let mut population = Vec::with_capacity(population_size);
    for index in 0..population_size {
        let id = PersonId::new(index);
        let person = if index < initial_infected {
            Individual::new(id, false, Some(Rc::clone(pathogen)))
        } else {
            let r: f64 = rng.random();
            Individual::new(id, r < vacc_percentage, None)
        };
        population.push(person);
    }
    Ok(population)
}

/// Builds the population described by the context's parameters and
/// installs it, drawing from `SimulationRng`.
///
/// # Errors
///
/// Propagates parameter and population errors.
pub fn init(context: &mut Context, pathogen: &Rc<Pathogen>) -> Result<(), HerdError> {
    trace!("Initializing population");
    let parameters = context.get_parameters()?;
    let population = context.sample(SimulationRng, |rng| {
        create_population(
            parameters.population_size,
            parameters.vacc_percentage,
            parameters.initial_infected,
            pathogen,
            rng,
        )
    })?;

    let vaccinated = population.iter().filter(|p| p.is_vaccinated()).count();
    debug!(
        "created {} people: {} infected, {} vaccinated",
        population.len(),
        parameters.initial_infected,
        vaccinated
    );
    context.set_population(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::rngs::SmallRng;
    use approx::assert_abs_diff_eq;
    use crate::rand::SeedableRng;
    use crate::random::testing::ConstantRng;

    fn pathogen() -> Rc<Pathogen> {
        Rc::new(Pathogen::new("Test", 0.5, 0.5).unwrap())
    }

    #[test]
    fn exact_infected_count_and_sequential_ids() {
        let mut rng = SmallRng::seed_from_u64(7);
        for (size, infected) in [(1, 0), (1, 1), (10, 3), (250, 250), (1000, 17)] {
            let population = create_population(size, 0.4, infected, &pathogen(), &mut rng).unwrap();
            assert_eq!(population.len(), size);
            assert_eq!(population.iter().filter(|p| p.is_infected()).count(), infected);
            for (index, person) in population.iter().enumerate() {
                assert_eq!(person.id().index(), index);
                assert!(person.is_alive());
                assert!(!(person.is_infected() && person.is_vaccinated()));
            }
        }
    }

    #[test]
    fn infected_come_first_and_share_the_pathogen() {
        let shared = pathogen();
        let mut rng = SmallRng::seed_from_u64(7);
        let population = create_population(10, 0.0, 3, &shared, &mut rng).unwrap();
        for person in &population[..3] {
            assert!(Rc::ptr_eq(person.infection().unwrap(), &shared));
        }
        assert!(population[3..].iter().all(Individual::is_susceptible));
    }

    #[test]
    fn one_draw_per_healthy_person() {
        let mut rng = ConstantRng::unit(0.25);
        let population = create_population(10, 0.5, 4, &pathogen(), &mut rng).unwrap();
        assert_eq!(rng.draws, 6);
        // Every draw of 0.25 is below 0.5.
        assert!(population[4..].iter().all(Individual::is_vaccinated));
    }

    #[test]
    fn vaccination_extremes() {
        let mut rng = SmallRng::seed_from_u64(1);
        let everyone = create_population(100, 1.0, 0, &pathogen(), &mut rng).unwrap();
        assert!(everyone.iter().all(Individual::is_vaccinated));

        let nobody = create_population(100, 0.0, 0, &pathogen(), &mut rng).unwrap();
        assert!(nobody.iter().all(|p| !p.is_vaccinated()));
    }

    #[test]
    fn vaccinated_fraction_is_approximate() {
        let mut rng = SmallRng::seed_from_u64(2);
        let population = create_population(10_000, 0.3, 0, &pathogen(), &mut rng).unwrap();
        let vaccinated = population.iter().filter(|p| p.is_vaccinated()).count();
        assert_abs_diff_eq!(vaccinated as f64 / 10_000.0, 0.3, epsilon = 0.03);
    }

    #[test]
    fn same_seed_same_population() {
        let build = || {
            let mut rng = SmallRng::seed_from_u64(99);
            create_population(500, 0.5, 5, &pathogen(), &mut rng)
                .unwrap()
                .iter()
                .map(Individual::is_vaccinated)
                .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn configuration_errors() {
        let mut rng = SmallRng::seed_from_u64(0);
        let error = create_population(5, 0.5, 6, &pathogen(), &mut rng).unwrap_err();
        assert!(matches!(
            error,
            HerdError::ConfigurationError {
                parameter: "initial_infected",
                ..
            }
        ));
        let error = create_population(0, 0.5, 0, &pathogen(), &mut rng).unwrap_err();
        assert!(matches!(
            error,
            HerdError::ConfigurationError {
                parameter: "population_size",
                ..
            }
        ));
        let error =
            create_population(usize::MAX, 0.5, 0, &pathogen(), &mut rng).unwrap_err();
        assert!(matches!(
            error,
            HerdError::ConfigurationError {
                parameter: "population_size",
                ..
            }
        ));
        let error = create_population(5, 1.5, 0, &pathogen(), &mut rng).unwrap_err();
        assert!(matches!(
            error,
            HerdError::ConfigurationError {
                parameter: "vacc_percentage",
                ..
            }
        ));
    }
}
