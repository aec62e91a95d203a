//! A discrete time-step simulation of herd immunity.
//!
//! A fixed population is created with some people vaccinated and a few
//! infected with a single pathogen. Every time step, each infected person
//! meets a number of randomly chosen living people and may pass the
//! infection on to those who are neither vaccinated nor already infected.
//! At the end of the step every infection that was present at its start
//! resolves: the person either dies or recovers with immunity. The run ends
//! when nobody is infected or nobody is alive.
//!
//! All state lives on a [`Context`]. Modules keep their data in data plugins
//! on the context, and the context runs the simulation as a sequence of plans,
//! one per time step:
//! * [`population_loader`] builds the initial population.
//! * [`transmission_manager`] decides whether one exposure transmits.
//! * [`time_step`] runs one round of interactions and outcomes.
//! * [`simulation`] schedules the steps, keeps the counters and decides when
//!   to stop.
//! * [`event_report`] writes the events emitted along the way to CSV files.
//!
//! ```rust
//! use herd_immunity::parameters::Parameters;
//! use herd_immunity::simulation::run_simulation;
//!
//! let parameters = Parameters::new(1000, 0.9, "Ebola", 0.7, 0.25).with_initial_infected(10);
//! let summary = run_simulation(parameters, 42).unwrap();
//! assert!(summary.status.is_stopped());
//! ```
pub mod context;
pub use context::{Context, SimulationEvent};

pub mod error;
pub use error::HerdError;

pub mod event_report;
pub mod events;
pub mod hashing;
pub use hashing::HashMap;

pub mod log;
pub mod parameters;
pub mod pathogen;
pub mod people;
pub mod plan;
pub mod population_loader;
pub mod random;
pub mod report;
pub mod runner;
pub mod simulation;
pub mod time_step;
pub mod transmission_manager;

// Re-exported so that `define_rng!` works in dependent crates.
pub use rand;

pub mod prelude {
    pub use crate::context::Context;
    pub use crate::error::HerdError;
    pub use crate::parameters::{ContextParametersExt, Parameters};
    pub use crate::people::{ContextPeopleExt, PersonId};
    pub use crate::random::ContextRandomExt;
    pub use crate::report::ContextReportExt;
    pub use crate::simulation::{
        run_simulation, ContextSimulationExt, SimulationStatus, SimulationSummary,
    };
    pub use crate::{define_data_plugin, define_report, define_rng};
}
