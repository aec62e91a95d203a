//! CSV reports keyed by row type.
//!
//! A report is any `Serialize` struct registered with [`define_report!`].
//! `add_report::<T>("name")` opens `{directory}/{file_prefix}name.csv` using
//! the context's [`ReportOptions`], and every `send_report(row)` of type `T`
//! appends one row to that file.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::Writer;
use log::trace;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::HerdError;
use crate::HashMap;

pub trait Report: 'static {
    /// Writes this row with the report's writer.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::CsvError` if the row cannot be serialized.
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), HerdError>;
}

/// Makes a `Serialize` struct usable as a report row.
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn serialize(
                &self,
                writer: &mut csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::HerdError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}

/// Where report files go and how they are named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub directory: PathBuf,
    pub file_prefix: String,
    /// Replace existing files instead of failing.
    pub overwrite: bool,
}

impl ReportOptions {
    pub fn directory(&mut self, directory: impl Into<PathBuf>) -> &mut Self {
        self.directory = directory.into();
        self
    }

    pub fn file_prefix(&mut self, file_prefix: impl Into<String>) -> &mut Self {
        self.file_prefix = file_prefix.into();
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn report_path(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

#[derive(Default)]
struct ReportData {
    options: ReportOptions,
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
}

define_data_plugin!(ReportPlugin, ReportData, ReportData::default());

// Creates the parent directories and the file itself.
fn create_report_file(path: &Path, overwrite: bool) -> Result<File, HerdError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file = if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    };
    file.map_err(|error| match error.kind() {
        ErrorKind::AlreadyExists => HerdError::ReportError(format!(
            "{} already exists; enable overwrite to replace it",
            path.display()
        )),
        _ => HerdError::IoError(error),
    })
}

pub trait ContextReportExt {
    /// Options used by later calls to `add_report`.
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Opens the report file for rows of type `T`.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::ReportError` if the file exists and overwriting is
    /// off, or `HerdError::IoError` if it cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), HerdError>;

    /// Appends one row to the report for `T`.
    ///
    /// # Errors
    ///
    /// Returns `HerdError::ReportError` if no report was added for `T`, or the
    /// serialization error.
    fn send_report<T: Report>(&self, report: T) -> Result<(), HerdError>;

    /// Flushes every open report.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error.
    fn flush_reports(&self) -> Result<(), HerdError>;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), HerdError> {
        let data = self.get_data_mut(ReportPlugin);
        let path = data.options.report_path(short_name);
        trace!("adding report {}", path.display());
        let file = create_report_file(&path, data.options.overwrite)?;
        data.file_writers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), HerdError> {
        let missing = || {
            HerdError::ReportError(format!(
                "no report was added for {}",
                std::any::type_name::<T>()
            ))
        };
        let data = self.get_data(ReportPlugin).ok_or_else(missing)?;
        let mut file_writers = data.file_writers.borrow_mut();
        let writer = file_writers
            .get_mut(&TypeId::of::<T>())
            .ok_or_else(missing)?;
        report.serialize(writer)
    }

    fn flush_reports(&self) -> Result<(), HerdError> {
        if let Some(data) = self.get_data(ReportPlugin) {
            for writer in data.file_writers.borrow_mut().values_mut() {
                writer.flush()?;
            }
        }
        Ok(())
    }
}
