//! Rent-roll CSV import and schedule export.
//!
//! Every column the scheduler understands is described once in [`schema`]; the parser and
//! both export shapes read that table instead of hard-coding headers.

mod export;
mod normalizer;
mod parser;
pub mod schema;

pub use export::{events_to_csv, units_to_csv, write_events, write_units};

use crate::workflows::inspections::Unit;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Which snapshot a file represents. Decides the recognized columns and how strict the
/// header check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Base,
    Tenants,
    Schedules,
    LastInspection,
}

impl ImportMode {
    /// Strict modes reject columns outside the schema.
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Schedules | Self::LastInspection)
    }

    pub fn reads_inspections(self) -> bool {
        self.is_strict()
    }
}

#[derive(Debug, Error)]
pub enum RentRollImportError {
    #[error("failed to read rent roll: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rent roll CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column `{column}` is missing")]
    MissingColumn { column: &'static str },
    #[error("unexpected column `{column}`")]
    UnexpectedColumn { column: String },
    #[error("line {line}: `{value}` is not a valid number for `{column}`")]
    InvalidNumber {
        column: String,
        value: String,
        line: u64,
    },
    #[error("line {line}: `{value}` is not a valid MM/DD/YYYY date for `{column}`")]
    InvalidDate {
        column: String,
        value: String,
        line: u64,
    },
    #[error("line {line}: found {found} fields but the header has {expected}")]
    Malformed {
        line: u64,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum RentRollExportError {
    #[error("failed to write schedule export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode schedule export: {0}")]
    Csv(#[from] csv::Error),
    #[error("schedule export is not valid UTF-8")]
    Encoding,
}

pub struct RentRollImporter;

impl RentRollImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        mode: ImportMode,
    ) -> Result<Vec<Unit>, RentRollImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, mode)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        mode: ImportMode,
    ) -> Result<Vec<Unit>, RentRollImportError> {
        parser::parse_units(reader, mode)
    }
}
