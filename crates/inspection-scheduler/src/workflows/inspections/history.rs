//! Reconciles prior snapshots (tenants, schedules, last inspections) into a base unit list.
//!
//! Units are matched on address, city, state and zip code. The unit label only takes part
//! when the base unit carries a non-empty label; an unlabeled base unit matches any label.

use super::domain::{ScheduleEvent, Unit};
use tracing::{debug, warn};

/// Whether `incoming` describes the same unit as `base`.
pub fn matches_unit(base: &Unit, incoming: &Unit) -> bool {
    let label_matches = match base.unit_label.as_deref() {
        Some(label) if !label.is_empty() => incoming.unit_label.as_deref() == Some(label),
        _ => true,
    };

    base.address == incoming.address
        && base.city == incoming.city
        && base.state == incoming.state
        && base.zip_code == incoming.zip_code
        && label_matches
}

fn find_match<'a>(base: &Unit, candidates: &'a [Unit]) -> Option<&'a Unit> {
    candidates.iter().find(|candidate| matches_unit(base, candidate))
}

/// Replaces every base unit's tenant list with the tenants of the matching incoming units.
///
/// Existing tenant lists are cleared first. Tenant records without a name are skipped.
pub fn merge_tenants(mut base: Vec<Unit>, incoming: &[Unit]) -> Vec<Unit> {
    for unit in &mut base {
        unit.tenants.clear();
    }

    for source in incoming.iter().filter(|unit| !unit.tenants.is_empty()) {
        let Some(target) = base.iter_mut().find(|unit| matches_unit(unit, source)) else {
            debug!(unit = %source.describe(), "no base unit for tenant record");
            continue;
        };

        for tenant in &source.tenants {
            if tenant.name.trim().is_empty() {
                warn!(
                    unit = %source.describe(),
                    tenant_id = %tenant.tenant_id,
                    "skipping tenant record with missing name"
                );
                continue;
            }
            target.tenants.push(tenant.clone());
        }
    }

    base
}

/// Adopts the events of a prior schedule for each matching base unit.
///
/// A lease start or end that differs from the prior snapshot invalidates that history and
/// the base unit's events are cleared instead.
pub fn merge_schedule(mut base: Vec<Unit>, prior: &[Unit]) -> Vec<Unit> {
    for unit in &mut base {
        let Some(previous) = find_match(unit, prior) else {
            continue;
        };

        if previous.lease_start != unit.lease_start || previous.lease_end != unit.lease_end {
            debug!(
                unit = %unit.describe(),
                "lease changed since prior schedule, discarding imported events"
            );
            unit.events.clear();
        } else {
            unit.events = previous.events.clone();
        }
    }

    base
}

/// Cuts each base unit's schedule at its last recorded inspection.
///
/// Events on or after the cutoff are removed and a historical event is appended at the
/// cutoff itself. Matches without any event leave the unit untouched.
pub fn truncate_schedule(mut base: Vec<Unit>, last_inspections: &[Unit]) -> Vec<Unit> {
    for unit in &mut base {
        let Some(cutoff) = find_match(unit, last_inspections)
            .and_then(|record| record.events.first())
            .map(|event| event.date)
        else {
            continue;
        };

        let before = unit.events.len();
        unit.events.retain(|event| event.date < cutoff);
        unit.events.push(ScheduleEvent::historical(cutoff));
        debug!(
            unit = %unit.describe(),
            %cutoff,
            removed = before - (unit.events.len() - 1),
            "truncated schedule at last inspection"
        );
    }

    base
}
