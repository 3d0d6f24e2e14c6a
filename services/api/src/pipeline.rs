use inspection_scheduler::error::AppError;
use inspection_scheduler::workflows::inspections::{
    build_schedule, merge_schedule, merge_tenants, truncate_schedule, ScheduleOutcome,
    SchedulingPolicy,
};
use inspection_scheduler::workflows::rent_roll::{ImportMode, RentRollImporter};
use std::io::Read;
use tracing::info;

/// The rent-roll snapshots feeding one scheduling run.
pub(crate) struct ScheduleInputs<R> {
    pub(crate) units: R,
    pub(crate) prior_schedule: Option<R>,
    pub(crate) last_inspection: Option<R>,
    pub(crate) tenants: Option<R>,
}

impl<R: Read> ScheduleInputs<R> {
    pub(crate) fn new(units: R) -> Self {
        Self {
            units,
            prior_schedule: None,
            last_inspection: None,
            tenants: None,
        }
    }

    /// Imports every snapshot, reconciles history onto the base units and schedules them.
    ///
    /// Reconciliation runs prior schedule first, then last-inspection truncation, then
    /// tenants, so a truncation always applies to the merged history.
    pub(crate) fn run(self, policy: &SchedulingPolicy) -> Result<ScheduleOutcome, AppError> {
        let mut units = RentRollImporter::from_reader(self.units, ImportMode::Base)?;
        info!(units = units.len(), "imported base rent roll");

        if let Some(reader) = self.prior_schedule {
            let prior = RentRollImporter::from_reader(reader, ImportMode::Schedules)?;
            units = merge_schedule(units, &prior);
        }
        if let Some(reader) = self.last_inspection {
            let last = RentRollImporter::from_reader(reader, ImportMode::LastInspection)?;
            units = truncate_schedule(units, &last);
        }
        if let Some(reader) = self.tenants {
            let tenants = RentRollImporter::from_reader(reader, ImportMode::Tenants)?;
            units = merge_tenants(units, &tenants);
        }

        Ok(build_schedule(units, policy, None)?)
    }
}
