use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};
use log::{info, LevelFilter};

use crate::context::Context;
use crate::error::HerdError;
use crate::event_report::{self, default_file_prefix};
use crate::log::set_log_level;
use crate::parameters::Parameters;
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::simulation::{self, SimulationSummary};

/// Arguments shared by every run.
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// JSON parameters file, used instead of the positional parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the CSV reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// The simulation parameters and run options.
#[derive(Args, Debug, Default)]
pub struct SimulationArgs {
    /// Number of people in the population
    #[arg(required_unless_present = "config", conflicts_with = "config")]
    pub population_size: Option<usize>,

    /// Probability that a healthy person starts vaccinated
    #[arg(required_unless_present = "config")]
    pub vacc_percentage: Option<f64>,

    /// Name of the virus
    #[arg(required_unless_present = "config")]
    pub virus_name: Option<String>,

    /// Probability that an infection is fatal
    #[arg(required_unless_present = "config")]
    pub mortality_rate: Option<f64>,

    /// Probability that one exposure transmits the virus
    #[arg(required_unless_present = "config")]
    pub basic_repro_num: Option<f64>,

    /// Number of people infected at the start
    pub initial_infected: Option<usize>,

    /// Interaction trials per infected person per step
    #[arg(long)]
    pub interactions_per_step: Option<usize>,

    /// Stop after this many steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Report file name prefix [default: derived from the parameters]
    #[arg(long)]
    pub prefix: Option<String>,

    /// Replace existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Do not write CSV reports
    #[arg(long)]
    pub no_reports: bool,

    /// Enable logging at this level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<LevelFilter>,
}

fn create_cli() -> Command {
    let cli = Command::new("herd_immunity")
        .about("Simulates the spread of a virus through a partly vaccinated population");
    let cli = BaseArgs::augment_args(cli);
    SimulationArgs::augment_args(cli)
}

fn required<T: Clone>(value: Option<&T>, parameter: &'static str) -> Result<T, HerdError> {
    value
        .cloned()
        .ok_or_else(|| HerdError::configuration(parameter, "missing; pass it or use --config"))
}

/// Reads the parameters from `--config` or the positional arguments and
/// applies the option overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or a positional
/// parameter is missing. Values are not validated here.
pub fn parameters_from_args(
    args: &BaseArgs,
    simulation_args: &SimulationArgs,
) -> Result<Parameters, HerdError> {
    let mut parameters = if let Some(config) = &args.config {
        info!("loading parameters from {}", config.display());
        Parameters::from_json_file(config)?
    } else {
        let parameters = Parameters::new(
            required(simulation_args.population_size.as_ref(), "population_size")?,
            required(simulation_args.vacc_percentage.as_ref(), "vacc_percentage")?,
            required(simulation_args.virus_name.as_ref(), "virus_name")?,
            required(simulation_args.mortality_rate.as_ref(), "mortality_rate")?,
            required(simulation_args.basic_repro_num.as_ref(), "transmission_rate")?,
        );
        match simulation_args.initial_infected {
            Some(initial_infected) => parameters.with_initial_infected(initial_infected),
            None => parameters,
        }
    };

    if let Some(interactions_per_step) = simulation_args.interactions_per_step {
        parameters.interactions_per_step = interactions_per_step;
    }
    if let Some(max_steps) = simulation_args.max_steps {
        parameters.max_steps = max_steps;
    }
    Ok(parameters)
}

/// Parses the command line and runs one simulation.
///
/// # Errors
///
/// Returns an error if argument parsing, configuration, reporting or the
/// simulation fails.
pub fn run_with_args() -> Result<SimulationSummary, Box<dyn std::error::Error>> {
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    let simulation_args = SimulationArgs::from_arg_matches(&matches)?;
    Ok(run_with_args_internal(&args, &simulation_args)?)
}

/// Runs one simulation from already parsed arguments.
///
/// # Errors
///
/// See [`run_with_args`].
pub fn run_with_args_internal(
    args: &BaseArgs,
    simulation_args: &SimulationArgs,
) -> Result<SimulationSummary, HerdError> {
    if let Some(level) = simulation_args.log_level {
        set_log_level(level);
    }

    let parameters = parameters_from_args(args, simulation_args)?;
    // Before any report file is created.
    parameters.validate()?;

    let mut context = Context::new();
    context.init_random(args.random_seed);

    let write_reports = !simulation_args.no_reports;
    if write_reports {
        let file_prefix = simulation_args
            .prefix
            .clone()
            .unwrap_or_else(|| default_file_prefix(&parameters));
        let report_options = context.report_options();
        if let Some(output_dir) = &args.output_dir {
            report_options.directory(output_dir);
        }
        report_options
            .file_prefix(file_prefix)
            .overwrite(simulation_args.force_overwrite);
        event_report::init(&mut context)?;
    }

    simulation::init(&mut context, parameters)?;
    let summary = simulation::run(&mut context)?;
    if write_reports {
        event_report::finish(&mut context, summary)?;
    }
    Ok(summary)
}
