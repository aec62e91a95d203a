use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `HerdError` and maps other errors to
/// convert to a `HerdError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum HerdError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A run parameter is out of range. Detected before the simulation starts.
    ConfigurationError {
        parameter: &'static str,
        message: String,
    },
    /// A programming error, such as resolving an infection on someone who is
    /// not infected. The run is aborted.
    InvariantViolation(String),
    ReportError(String),
}

impl HerdError {
    pub(crate) fn configuration(parameter: &'static str, message: impl Into<String>) -> Self {
        HerdError::ConfigurationError {
            parameter,
            message: message.into(),
        }
    }
}

impl From<io::Error> for HerdError {
    fn from(error: io::Error) -> Self {
        HerdError::IoError(error)
    }
}

impl From<serde_json::Error> for HerdError {
    fn from(error: serde_json::Error) -> Self {
        HerdError::JsonError(error)
    }
}

impl From<csv::Error> for HerdError {
    fn from(error: csv::Error) -> Self {
        HerdError::CsvError(error)
    }
}

impl std::error::Error for HerdError {}

impl Display for HerdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HerdError::ConfigurationError { parameter, message } => {
                write!(f, "invalid value for `{parameter}`: {message}")
            }
            HerdError::InvariantViolation(message) => {
                write!(f, "invariant violated: {message}")
            }
            HerdError::ReportError(message) => write!(f, "report error: {message}"),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
