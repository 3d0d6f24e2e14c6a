use crate::pipeline::ScheduleInputs;
use chrono::{Local, NaiveDate};
use clap::Args;
use inspection_scheduler::config::AppConfig;
use inspection_scheduler::error::AppError;
use inspection_scheduler::telemetry;
use inspection_scheduler::workflows::inspections::ScheduleOutcome;
use inspection_scheduler::workflows::rent_roll::{write_events, write_units};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct ScheduleArgs {
    /// Base rent roll (CSV)
    #[arg(long)]
    pub(crate) units: PathBuf,
    /// Previously exported schedule whose inspections should be kept
    #[arg(long)]
    pub(crate) prior: Option<PathBuf>,
    /// Tenant directory export (CSV)
    #[arg(long)]
    pub(crate) tenants: Option<PathBuf>,
    /// Last completed inspection per unit (CSV)
    #[arg(long)]
    pub(crate) last_inspection: Option<PathBuf>,
    /// Scheduling date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Write one row per unit with its inspections
    #[arg(long)]
    pub(crate) units_out: Option<PathBuf>,
    /// Write one row per scheduled inspection
    #[arg(long)]
    pub(crate) events_out: Option<PathBuf>,
}

pub(crate) fn run_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let ScheduleArgs {
        units,
        prior,
        tenants,
        last_inspection,
        today,
        units_out,
        events_out,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let policy = config.scheduling.policy(today)?;

    let inputs = ScheduleInputs {
        units: File::open(&units)?,
        prior_schedule: open_optional(prior.as_deref())?,
        last_inspection: open_optional(last_inspection.as_deref())?,
        tenants: open_optional(tenants.as_deref())?,
    };
    let outcome = inputs.run(&policy)?;

    if let Some(path) = &units_out {
        write_units(BufWriter::new(File::create(path)?), &outcome.units)?;
    }
    if let Some(path) = &events_out {
        write_events(BufWriter::new(File::create(path)?), &outcome.units)?;
    }

    render_summary(&outcome, today, policy.earliest_date, policy.horizon_date);
    for (label, path) in [("Units", &units_out), ("Events", &events_out)] {
        if let Some(path) = path {
            println!("{label} export written to {}", path.display());
        }
    }

    Ok(())
}

fn open_optional(path: Option<&Path>) -> Result<Option<File>, std::io::Error> {
    path.map(File::open).transpose()
}

fn render_summary(
    outcome: &ScheduleOutcome,
    today: NaiveDate,
    earliest: NaiveDate,
    horizon: NaiveDate,
) {
    let events: usize = outcome.units.iter().map(|unit| unit.events.len()).sum();
    let historical: usize = outcome
        .units
        .iter()
        .flat_map(|unit| unit.events.iter())
        .filter(|event| event.is_historical)
        .count();

    println!("Inspection schedule as of {today}");
    println!("- Window {earliest} through {horizon}");
    println!(
        "- {} units | {} inspections ({} historical)",
        outcome.units.len(),
        events,
        historical
    );

    let report = &outcome.report;
    println!(
        "- Repair: {} iterations | {} blackout shifts | {} day / {} week capacity shifts | {} dropped past horizon",
        report.iterations,
        report.blackout_shifts,
        report.day_capacity_shifts,
        report.week_capacity_shifts,
        report.horizon_drops
    );

    let mut statuses: BTreeMap<&'static str, usize> = BTreeMap::new();
    for status in outcome.units.iter().filter_map(|unit| unit.status_message) {
        *statuses.entry(status.label()).or_default() += 1;
    }
    if statuses.is_empty() {
        return;
    }
    println!("Units without a regular cadence:");
    for (label, count) in statuses {
        println!("  - {label}: {count}");
    }
}
