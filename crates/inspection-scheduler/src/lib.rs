//! Inspection scheduling for leased residential units.
//!
//! [`workflows::inspections`] computes schedules; [`workflows::rent_roll`] moves units in and
//! out of rent-roll CSV files.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
