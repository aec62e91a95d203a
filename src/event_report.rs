//! Writes simulation events to CSV.
//!
//! `init` opens four reports with the context's report options and
//! subscribes to the simulation events:
//!
//! | report        | one row per                 |
//! |---------------|-----------------------------|
//! | `interactions`| `InteractionEvent`          |
//! | `outcomes`    | `InfectionOutcomeEvent`     |
//! | `time_steps`  | `TimeStepEvent`             |
//! | `summary`     | finished run (see `finish`) |
use log::{error, trace};

use crate::context::Context;
use crate::define_data_plugin;
use crate::define_report;
use crate::error::HerdError;
use crate::events::{InfectionOutcomeEvent, InteractionEvent, TimeStepEvent};
use crate::parameters::Parameters;
use crate::report::ContextReportExt;
use crate::simulation::SimulationSummary;

define_report!(InteractionEvent);
define_report!(InfectionOutcomeEvent);
define_report!(TimeStepEvent);
define_report!(SimulationSummary);

#[derive(Default)]
struct EventReportData {
    // First write failure seen by an event handler.
    first_error: Option<HerdError>,
}

define_data_plugin!(EventReportPlugin, EventReportData, EventReportData::default());

/// File prefix naming a run after its parameters, e.g.
/// `Ebola_simulation_pop_1000_vp_0.9_infected_10_`.
#[must_use]
pub fn default_file_prefix(parameters: &Parameters) -> String {
    format!(
        "{}_simulation_pop_{}_vp_{}_infected_{}_",
        parameters.virus_name,
        parameters.population_size,
        parameters.vacc_percentage,
        parameters.initial_infected
    )
}

fn send_row<T: crate::report::Report>(context: &mut Context, row: T) {
    if let Err(write_error) = context.send_report(row) {
        error!("failed to write report row: {write_error}");
        let data = context.get_data_mut(EventReportPlugin);
        if data.first_error.is_none() {
            data.first_error = Some(write_error);
        }
    }
}

/// Opens the event reports and subscribes to the simulation events.
///
/// # Errors
///
/// Returns an error if a report file cannot be created.
pub fn init(context: &mut Context) -> Result<(), HerdError> {
    trace!("Initializing event_report");
    context.add_report::<InteractionEvent>("interactions")?;
    context.add_report::<InfectionOutcomeEvent>("outcomes")?;
    context.add_report::<TimeStepEvent>("time_steps")?;
    context.add_report::<SimulationSummary>("summary")?;

    context.subscribe_to_event(|context, event: InteractionEvent| send_row(context, event));
    context.subscribe_to_event(|context, event: InfectionOutcomeEvent| send_row(context, event));
    context.subscribe_to_event(|context, event: TimeStepEvent| send_row(context, event));
    Ok(())
}

/// Writes the summary row and flushes every report.
///
/// # Errors
///
/// Returns the first row that failed to write during the run, or any error
/// writing the summary.
pub fn finish(context: &mut Context, summary: SimulationSummary) -> Result<(), HerdError> {
    if let Some(write_error) = context.get_data_mut(EventReportPlugin).first_error.take() {
        return Err(write_error);
    }
    context.send_report(summary)?;
    context.flush_reports()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::random::ContextRandomExt;
    use crate::simulation::{self, SimulationStatus};
    use tempfile::tempdir;

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(Result::unwrap).collect()
    }

    fn headers(path: &Path) -> Vec<String> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.headers().unwrap().iter().map(String::from).collect()
    }

    #[test]
    fn prefix_follows_parameters() {
        let parameters = Parameters::new(1000, 0.9, "Ebola", 0.7, 0.25).with_initial_infected(10);
        assert_eq!(
            default_file_prefix(&parameters),
            "Ebola_simulation_pop_1000_vp_0.9_infected_10_"
        );
    }

    #[test]
    fn run_is_written_to_four_reports() {
        let temp_dir = tempdir().unwrap();
        let parameters = Parameters::new(50, 0.5, "Flu", 0.3, 0.4)
            .with_initial_infected(2)
            .with_interactions_per_step(10);

        let mut context = Context::new();
        context.init_random(8);
        context
            .report_options()
            .directory(temp_dir.path())
            .file_prefix("test_");
        init(&mut context).unwrap();
        simulation::init(&mut context, parameters).unwrap();
        let summary = simulation::run(&mut context).unwrap();
        finish(&mut context, summary).unwrap();

        let dir = temp_dir.path();
        assert_eq!(
            headers(&dir.join("test_interactions.csv")),
            [
                "time_step",
                "source_id",
                "target_id",
                "infected",
                "target_vaccinated",
                "target_previously_infected"
            ]
        );
        assert_eq!(
            headers(&dir.join("test_outcomes.csv")),
            ["time_step", "person_id", "survived"]
        );

        let steps = read_rows(&dir.join("test_time_steps.csv"));
        assert_eq!(steps.len(), summary.time_steps);
        let last = steps.last().unwrap();
        assert_eq!(&last[3], summary.total_dead.to_string());

        let outcomes = read_rows(&dir.join("test_outcomes.csv"));
        let deaths = outcomes.iter().filter(|row| &row[2] == "false").count();
        assert_eq!(deaths, summary.total_dead);

        // Every source makes ten trials.
        let interactions = read_rows(&dir.join("test_interactions.csv"));
        assert_eq!(interactions.len(), outcomes.len() * 10);

        let summary_rows = read_rows(&dir.join("test_summary.csv"));
        assert_eq!(summary_rows.len(), 1);
        assert!(summary.status.is_stopped());
        assert_ne!(summary.status, SimulationStatus::Running);
        assert_eq!(&summary_rows[0][0], summary.time_steps.to_string());
    }

    #[test]
    fn second_run_into_the_same_files_fails() {
        let temp_dir = tempdir().unwrap();
        let mut first = Context::new();
        first.report_options().directory(temp_dir.path());
        init(&mut first).unwrap();

        let mut second = Context::new();
        second.report_options().directory(temp_dir.path());
        assert!(matches!(init(&mut second), Err(HerdError::ReportError(_))));
    }
}
