//! Run parameters.
//!
//! `Parameters` can be built in code, from the command line (see
//! [`crate::runner`]), or loaded from a JSON file such as
//!
//! ```json
//! {
//!     "population_size": 1000,
//!     "vacc_percentage": 0.9,
//!     "virus_name": "Ebola",
//!     "mortality_rate": 0.7,
//!     "basic_repro_num": 0.25,
//!     "initial_infected": 10
//! }
//! ```
//!
//! Parameters are validated before a run starts and stored on the `Context`.
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::HerdError;
use crate::pathogen::Pathogen;

pub const DEFAULT_INTERACTIONS_PER_STEP: usize = 100;
pub const DEFAULT_MAX_STEPS: usize = 10_000;
/// Largest population a run accepts. The whole population is allocated up
/// front, so larger values are refused before any memory is reserved.
pub const MAX_POPULATION_SIZE: usize = 10_000_000;

fn default_initial_infected() -> usize {
    1
}

fn default_interactions_per_step() -> usize {
    DEFAULT_INTERACTIONS_PER_STEP
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    pub population_size: usize,
    pub vacc_percentage: f64,
    pub virus_name: String,
    pub mortality_rate: f64,
    /// Per-exposure probability of transmission.
    #[serde(alias = "basic_repro_num")]
    pub transmission_rate: f64,
    #[serde(default = "default_initial_infected")]
    pub initial_infected: usize,
    /// Interaction trials per infected individual per time step.
    #[serde(default = "default_interactions_per_step")]
    pub interactions_per_step: usize,
    /// Safety valve against runaway simulations.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Parameters {
    /// Parameters with the default initial infected count, interactions per
    /// step and step limit.
    #[must_use]
    pub fn new(
        population_size: usize,
        vacc_percentage: f64,
        virus_name: impl Into<String>,
        mortality_rate: f64,
        transmission_rate: f64,
    ) -> Self {
        Parameters {
            population_size,
            vacc_percentage,
            virus_name: virus_name.into(),
            mortality_rate,
            transmission_rate,
            initial_infected: default_initial_infected(),
            interactions_per_step: DEFAULT_INTERACTIONS_PER_STEP,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    #[must_use]
    pub fn with_initial_infected(mut self, initial_infected: usize) -> Self {
        self.initial_infected = initial_infected;
        self
    }

    #[must_use]
    pub fn with_interactions_per_step(mut self, interactions_per_step: usize) -> Self {
        self.interactions_per_step = interactions_per_step;
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Reads parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The values are
    /// not validated here.
    pub fn from_json_file(path: &Path) -> Result<Self, HerdError> {
        trace!("loading parameters from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Checks every parameter, naming the first one out of range.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::ConfigurationError`.
    pub fn validate(&self) -> Result<(), HerdError> {
        if self.population_size == 0 {
            return Err(HerdError::configuration(
                "population_size",
                "must be a positive integer",
            ));
        }
        if self.population_size > MAX_POPULATION_SIZE {
            return Err(HerdError::configuration(
                "population_size",
                format!(
                    "{} exceeds the maximum of {MAX_POPULATION_SIZE}",
                    self.population_size
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.vacc_percentage) {
            return Err(HerdError::configuration(
                "vacc_percentage",
                format!("must be in [0, 1], got {}", self.vacc_percentage),
            ));
        }
        if self.initial_infected > self.population_size {
            return Err(HerdError::configuration(
                "initial_infected",
                format!(
                    "{} exceeds population_size {}",
                    self.initial_infected, self.population_size
                ),
            ));
        }
        if self.max_steps == 0 {
            return Err(HerdError::configuration(
                "max_steps",
                "must allow at least one time step",
            ));
        }
        // Checks both rates.
        self.pathogen()?;
        Ok(())
    }

    /// Builds the pathogen described by these parameters.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::ConfigurationError` if a rate is out of range.
    pub fn pathogen(&self) -> Result<Pathogen, HerdError> {
        Pathogen::new(
            self.virus_name.clone(),
            self.mortality_rate,
            self.transmission_rate,
        )
    }
}

impl Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "population_size: {}", self.population_size)?;
        writeln!(f, "vacc_percentage: {}", self.vacc_percentage)?;
        writeln!(f, "virus_name: {}", self.virus_name)?;
        writeln!(f, "mortality_rate: {}", self.mortality_rate)?;
        writeln!(f, "transmission_rate: {}", self.transmission_rate)?;
        writeln!(f, "initial_infected: {}", self.initial_infected)?;
        writeln!(f, "interactions_per_step: {}", self.interactions_per_step)?;
        write!(f, "max_steps: {}", self.max_steps)
    }
}

define_data_plugin!(ParametersPlugin, Option<Parameters>, None);

pub trait ContextParametersExt {
    /// Validates and stores the run parameters.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::ConfigurationError` if validation fails; nothing is
    /// stored in that case.
    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), HerdError>;

    /// # Errors
    ///
    /// Returns `HerdError::InvariantViolation` if no parameters were set.
    fn get_parameters(&self) -> Result<&Parameters, HerdError>;
}

impl ContextParametersExt for Context {
    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), HerdError> {
        parameters.validate()?;
        *self.get_data_mut(ParametersPlugin) = Some(parameters);
        Ok(())
    }

    fn get_parameters(&self) -> Result<&Parameters, HerdError> {
        self.get_data(ParametersPlugin)
            .and_then(Option::as_ref)
            .ok_or_else(|| HerdError::InvariantViolation("parameters were never set".to_string()))
    }
}
