//! The pathogen spreading through the population.
//!
//! A `Pathogen` is created once per run and shared, read-only, by every
//! infected individual through an `Rc<Pathogen>`.
use std::fmt::{self, Display};

use serde::Serialize;

use crate::error::HerdError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pathogen {
    name: String,
    mortality_rate: f64,
    transmission_rate: f64,
}

fn check_probability(parameter: &'static str, value: f64) -> Result<(), HerdError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HerdError::configuration(
            parameter,
            format!("must be a probability in [0, 1], got {value}"),
        ))
    }
}

impl Pathogen {
    /// # Errors
    ///
    /// Returns `HerdError::ConfigurationError` if either rate lies outside `[0, 1]`.
    pub fn new(
        name: impl Into<String>,
        mortality_rate: f64,
        transmission_rate: f64,
    ) -> Result<Pathogen, HerdError> {
        check_probability("mortality_rate", mortality_rate)?;
        check_probability("transmission_rate", transmission_rate)?;
        Ok(Pathogen {
            name: name.into(),
            mortality_rate,
            transmission_rate,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Probability that an infection ends in death.
    #[must_use]
    pub fn mortality_rate(&self) -> f64 {
        self.mortality_rate
    }

    /// Probability that one exposure of a susceptible individual transmits.
    #[must_use]
    pub fn transmission_rate(&self) -> f64 {
        self.transmission_rate
    }
}

impl Display for Pathogen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (mortality rate {}, transmission rate {})",
            self.name, self.mortality_rate, self.transmission_rate
        )
    }
}
