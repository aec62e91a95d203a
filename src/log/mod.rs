//! Diagnostic logging for the simulation. This is separate from the CSV
//! reports in [`crate::event_report`], which record what happened in a run.
//!
//! Modules log with the `log` macros `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`. Logging is _disabled_ by default. The command line option
//! `--log-level <level>` enables it, or it can be set up from code:
//!
//! ```rust
//! use herd_immunity::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Per-step summaries and above.
//! set_log_level(LevelFilter::Debug);
//! // Every skipped infection in the time step engine.
//! set_module_filter("herd_immunity::time_step", LevelFilter::Trace);
//! ```
//!
//! Messages go to standard error so they never mix with the summary the
//! command line prints.
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;

use crate::HashMap;
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [
    // Silences the event loop's per-loop and shutdown traces.
    ("herd_immunity::context", LevelFilter::Debug),
];

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter for every target under a module path such as
/// `"herd_immunity::people"`.
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// The global level and module filters, plus the handle of the installed
/// logger. There is one instance, behind `LOG_CONFIGURATION`; the public API
/// is the free functions below.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for targets without a module filter. `Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        let module_configurations = DEFAULT_MODULE_FILTERS
            .map(|(module, level)| (module.to_string(), (module, level).into()));
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::from_iter(module_configurations),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration changed.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                let module_config = entry.get_mut();
                if module_config.level == level {
                    return false;
                }
                module_config.level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filter(&mut self, module: &str, level: LevelFilter) {
        if self.insert_module_filter(module, level) {
            self.set_config();
        }
    }

    pub(in crate::log) fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated = false;
        for &(module, level) in module_filters {
            mutated |= self.insert_module_filter(module, level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// Turns on every message. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Turns off every message. Same as `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filter(module_path, level_filter);
}

/// The global level applies to `module_path` again.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// Sets several module filters, rebuilding the logger once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}
