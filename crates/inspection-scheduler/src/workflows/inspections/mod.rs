//! Recurring inspection scheduling for leased units.
//!
//! The pipeline runs in four steps: an optional merge of a prior schedule, per-unit
//! candidate generation, a global repair pass over all candidates, and regrouping of the
//! repaired events onto their units.

pub mod constraints;
pub mod domain;
pub mod generator;
pub mod history;
pub mod policy;

pub use constraints::{apply_constraints, RepairReport, ScheduleError, ScheduleOutcome};
pub use domain::{EventKind, ScheduleEvent, ScheduleStatus, TenantRecord, Unit};
pub use generator::{generate_all, generate_candidates};
pub use history::{matches_unit, merge_schedule, merge_tenants, truncate_schedule};
pub use policy::{
    BlackoutCalendar, DateOffset, FnCalendar, OpenCalendar, SchedulingPolicy, WeekdayCalendar,
};

use tracing::info;

/// Computes the full inspection schedule for `units`.
///
/// When a prior schedule is given, its events are merged onto matching units first. The
/// output has exactly one unit per input unit, in input order.
pub fn build_schedule(
    units: Vec<Unit>,
    policy: &SchedulingPolicy,
    prior: Option<&[Unit]>,
) -> Result<ScheduleOutcome, ScheduleError> {
    policy.validate().map_err(ScheduleError::InvalidPolicy)?;

    let base = match prior {
        Some(prior) => merge_schedule(units, prior),
        None => units,
    };

    let candidates = generate_all(base, policy);
    info!(
        units = candidates.len(),
        candidates = candidates.iter().map(|unit| unit.events.len()).sum::<usize>(),
        earliest = %policy.earliest_date,
        horizon = %policy.horizon_date,
        "generated candidate inspections"
    );

    apply_constraints(candidates, policy)
}
