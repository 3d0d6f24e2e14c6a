//! Global constraint repair over the flattened schedule.
//!
//! Every candidate event of every unit is flattened into one list ordered by date, zip
//! code, city and address. A scan walks that list and repairs one violation at a time:
//! events past the horizon are dropped, blackout dates are pushed to the next open day,
//! and day or week overflows shift movable events forward by a single day. Any mutation
//! re-sorts the list and restarts the scan from the first position that could be affected,
//! so the loop ends on a fixed point where a second pass finds nothing to change.

use super::domain::{ScheduleEvent, Unit};
use super::policy::{add_days, SchedulingPolicy};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid scheduling policy: {0}")]
    InvalidPolicy(String),
    #[error("blackout calendar is not idempotent: {date} resolved to {resolved}, then to {again}")]
    BlackoutNotIdempotent {
        date: NaiveDate,
        resolved: NaiveDate,
        again: NaiveDate,
    },
    #[error("blackout calendar moved {date} backward to {resolved}")]
    BlackoutMovedBackward {
        date: NaiveDate,
        resolved: NaiveDate,
    },
    #[error("constraint repair did not converge after {iterations} iterations")]
    RepairDidNotConverge { iterations: usize },
}

/// Counters describing what a repair pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub iterations: usize,
    pub blackout_shifts: usize,
    pub day_capacity_shifts: usize,
    pub week_capacity_shifts: usize,
    pub horizon_drops: usize,
}

impl RepairReport {
    pub fn mutations(&self) -> usize {
        self.blackout_shifts + self.day_capacity_shifts + self.week_capacity_shifts + self.horizon_drops
    }
}

/// Units with their repaired schedules, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOutcome {
    pub units: Vec<Unit>,
    pub report: RepairReport,
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    seq: usize,
    owner: usize,
    unit: &'a Unit,
    event: ScheduleEvent,
}

/// Scan state: everything before `confirmed` has been checked against the current list.
#[derive(Debug, Default)]
struct RepairScan {
    confirmed: usize,
    cursor: usize,
}

impl RepairScan {
    fn advance(&mut self) {
        self.cursor += 1;
        self.confirmed = self.cursor;
    }

    fn restart(&mut self, invalidated_from: Option<usize>) {
        if let Some(index) = invalidated_from {
            self.confirmed = self.confirmed.min(index);
        }
        self.cursor = self.confirmed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capacity {
    Day,
    Week,
}

impl Capacity {
    fn label(self) -> &'static str {
        match self {
            Capacity::Day => "day",
            Capacity::Week => "week",
        }
    }

    fn limit(self, policy: &SchedulingPolicy) -> usize {
        match self {
            Capacity::Day => policy.max_per_day,
            Capacity::Week => policy.max_per_week,
        }
    }

    fn shares_slot(self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            Capacity::Day => a == b,
            Capacity::Week => a.iso_week() == b.iso_week(),
        }
    }
}

/// Repairs the schedules of all units against the policy's global constraints.
///
/// Output order matches input order; units whose events were all dropped keep their
/// status message and an empty schedule.
pub fn apply_constraints(
    units: Vec<Unit>,
    policy: &SchedulingPolicy,
) -> Result<ScheduleOutcome, ScheduleError> {
    policy.validate().map_err(ScheduleError::InvalidPolicy)?;

    let mut report = RepairReport::default();
    let repaired: Vec<(usize, ScheduleEvent)> = {
        let mut entries = flatten(&units);
        repair(&mut entries, policy, &mut report)?;
        entries
            .into_iter()
            .map(|entry| (entry.owner, entry.event))
            .collect()
    };

    let units = recombine(units, repaired);
    info!(
        units = units.len(),
        iterations = report.iterations,
        mutations = report.mutations(),
        horizon_drops = report.horizon_drops,
        "schedule constraints applied"
    );

    Ok(ScheduleOutcome { units, report })
}

fn flatten(units: &[Unit]) -> Vec<Entry<'_>> {
    units
        .iter()
        .enumerate()
        .flat_map(|(owner, unit)| unit.events.iter().map(move |event| (owner, unit, *event)))
        .enumerate()
        .map(|(seq, (owner, unit, event))| Entry {
            seq,
            owner,
            unit,
            event,
        })
        .collect()
}

/// Date, then zip code, then city, then address. Missing zips sort as zero.
fn canonical_order(a: &Entry<'_>, b: &Entry<'_>) -> Ordering {
    a.event
        .date
        .cmp(&b.event.date)
        .then_with(|| {
            a.unit
                .zip_code
                .unwrap_or(0)
                .cmp(&b.unit.zip_code.unwrap_or(0))
        })
        .then_with(|| {
            a.unit
                .city
                .as_deref()
                .unwrap_or("")
                .cmp(b.unit.city.as_deref().unwrap_or(""))
        })
        .then_with(|| a.unit.address.cmp(&b.unit.address))
}

fn repair(
    entries: &mut Vec<Entry<'_>>,
    policy: &SchedulingPolicy,
    report: &mut RepairReport,
) -> Result<(), ScheduleError> {
    entries.sort_by(canonical_order);
    let mut scan = RepairScan::default();

    while scan.cursor < entries.len() {
        report.iterations += 1;
        if report.iterations > policy.max_repair_iterations {
            return Err(ScheduleError::RepairDidNotConverge {
                iterations: policy.max_repair_iterations,
            });
        }

        let entry = entries[scan.cursor];
        if entry.event.is_historical {
            scan.advance();
            continue;
        }

        let date = entry.event.date;
        if date > policy.horizon_date {
            debug!(
                unit = %entry.unit.describe(),
                %date,
                horizon = %policy.horizon_date,
                "dropping inspection past the horizon"
            );
            entries.remove(scan.cursor);
            report.horizon_drops += 1;
            scan.restart(None);
            continue;
        }

        let resolved = resolve_blackout(policy, date)?;
        if resolved != date {
            debug!(unit = %entry.unit.describe(), %date, %resolved, "pushed past blackout");
            entries[scan.cursor].event.date = resolved;
            report.blackout_shifts += 1;
            let invalidated = resort(entries, &[entry.seq]);
            scan.restart(invalidated);
            continue;
        }

        if let Some(moved) = enforce_capacity(entries, scan.cursor, Capacity::Day, policy) {
            report.day_capacity_shifts += moved.len();
            let invalidated = resort(entries, &moved);
            scan.restart(invalidated);
            continue;
        }

        if let Some(moved) = enforce_capacity(entries, scan.cursor, Capacity::Week, policy) {
            report.week_capacity_shifts += moved.len();
            let invalidated = resort(entries, &moved);
            scan.restart(invalidated);
            continue;
        }

        scan.advance();
    }

    Ok(())
}

fn resolve_blackout(policy: &SchedulingPolicy, date: NaiveDate) -> Result<NaiveDate, ScheduleError> {
    let resolved = policy.resolve_blackout(date);
    if resolved == date {
        return Ok(date);
    }
    if resolved < date {
        return Err(ScheduleError::BlackoutMovedBackward { date, resolved });
    }
    let again = policy.resolve_blackout(resolved);
    if again != resolved {
        return Err(ScheduleError::BlackoutNotIdempotent {
            date,
            resolved,
            again,
        });
    }
    Ok(resolved)
}

/// Shifts movable events out of an overflowing day or week. Returns the sequence numbers
/// of the shifted entries, or `None` when nothing had to (or could) move.
fn enforce_capacity(
    entries: &mut [Entry<'_>],
    cursor: usize,
    capacity: Capacity,
    policy: &SchedulingPolicy,
) -> Option<Vec<usize>> {
    let date = entries[cursor].event.date;
    let limit = capacity.limit(policy);

    let sharing: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(index, other)| *index != cursor && capacity.shares_slot(other.event.date, date))
        .map(|(index, _)| index)
        .collect();

    if sharing.len() <= limit - 1 {
        return None;
    }

    let (locked, movable): (Vec<usize>, Vec<usize>) = sharing
        .iter()
        .partition(|index| entries[**index].event.is_locked());

    if movable.is_empty() {
        debug!(
            %date,
            slot = capacity.label(),
            locked = locked.len(),
            "capacity exceeded by locked inspections only"
        );
        return None;
    }

    let allowed = (limit - 1).saturating_sub(locked.len());
    let count = movable.len().saturating_sub(allowed);
    let selected = select_for_shift(entries, cursor, &movable, count);

    debug!(
        %date,
        slot = capacity.label(),
        sharing = sharing.len(),
        limit,
        moved = selected.len(),
        "capacity exceeded, shifting inspections one day"
    );

    Some(
        selected
            .into_iter()
            .map(|index| {
                let entry = &mut entries[index];
                entry.event.date = add_days(entry.event.date, 1);
                entry.seq
            })
            .collect(),
    )
}

/// Picks `count` entries to move, preferring whole zip-code groups away from the
/// triggering entry: other zips first (latest group first), then the triggering zip, then
/// the triggering unit's own events. A group larger than what is still needed gives up its
/// tail.
fn select_for_shift(
    entries: &[Entry<'_>],
    trigger: usize,
    movable: &[usize],
    count: usize,
) -> Vec<usize> {
    let trigger = &entries[trigger];
    let mut same_unit = Vec::new();
    let mut same_zip = Vec::new();
    let mut other_zips: Vec<(Option<u32>, Vec<usize>)> = Vec::new();

    for &index in movable {
        let candidate = &entries[index];
        if candidate.owner == trigger.owner {
            same_unit.push(index);
        } else if candidate.unit.zip_code == trigger.unit.zip_code {
            same_zip.push(index);
        } else {
            let zip = candidate.unit.zip_code;
            match other_zips.iter_mut().find(|(group_zip, _)| *group_zip == zip) {
                Some((_, members)) => members.push(index),
                None => other_zips.push((zip, vec![index])),
            }
        }
    }

    let mut remaining = count;
    let mut selected = Vec::with_capacity(count);
    let groups = other_zips
        .iter()
        .rev()
        .map(|(_, members)| members.as_slice())
        .chain([same_zip.as_slice(), same_unit.as_slice()]);

    for group in groups {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(group.len());
        selected.extend_from_slice(&group[group.len() - take..]);
        remaining -= take;
    }

    selected
}

/// Restores canonical order and returns the first index whose checks may have changed:
/// the start of the ISO week of the earliest moved entry.
fn resort(entries: &mut [Entry<'_>], moved: &[usize]) -> Option<usize> {
    entries.sort_by(canonical_order);
    moved
        .iter()
        .filter_map(|seq| entries.iter().find(|entry| entry.seq == *seq))
        .map(|entry| week_start(entry.event.date))
        .min()
        .map(|start| entries.partition_point(|entry| entry.event.date < start))
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn recombine(units: Vec<Unit>, repaired: Vec<(usize, ScheduleEvent)>) -> Vec<Unit> {
    let mut schedules: Vec<Vec<ScheduleEvent>> = vec![Vec::new(); units.len()];
    for (owner, event) in repaired {
        schedules[owner].push(event);
    }

    units
        .into_iter()
        .zip(schedules)
        .map(|(mut unit, mut events)| {
            events.sort_by_key(|event| event.date);
            unit.events = events;
            unit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inspections::policy::{FnCalendar, OpenCalendar, WeekdayCalendar};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn policy() -> SchedulingPolicy {
        SchedulingPolicy::standard(date(2025, 3, 2))
            .with_capacity(5, 100)
            .with_blackout(OpenCalendar)
    }

    fn unit(id: usize, zip: u32, events: Vec<ScheduleEvent>) -> Unit {
        Unit::new(id.to_string(), format!("{id} Oak Ave"))
            .with_location("Ames", "IA", zip)
            .with_events(events)
    }

    fn count_on(units: &[Unit], day: NaiveDate) -> usize {
        units
            .iter()
            .flat_map(|unit| unit.events.iter())
            .filter(|event| event.date == day)
            .count()
    }

    #[test]
    fn scan_restart_never_moves_past_confirmed() {
        let mut scan = RepairScan::default();
        scan.advance();
        scan.advance();
        scan.restart(Some(5));
        assert_eq!((scan.confirmed, scan.cursor), (2, 2));
        scan.restart(Some(1));
        assert_eq!((scan.confirmed, scan.cursor), (1, 1));
    }

    #[test]
    fn day_overflow_shifts_excess_to_the_next_day() {
        let day = date(2025, 3, 3);
        let units: Vec<Unit> = (0..10)
            .map(|id| unit(id, 50010, vec![ScheduleEvent::periodic(day)]))
            .collect();

        let outcome = apply_constraints(units, &policy()).expect("repair succeeds");

        assert_eq!(outcome.units.len(), 10);
        assert_eq!(count_on(&outcome.units, day), 5);
        assert_eq!(count_on(&outcome.units, date(2025, 3, 4)), 5);
        assert_eq!(outcome.report.day_capacity_shifts, 5);
    }

    #[test]
    fn other_zip_groups_move_before_the_triggering_zip() {
        let day = date(2025, 3, 3);
        let mut units: Vec<Unit> = (0..3)
            .map(|id| unit(id, 50010, vec![ScheduleEvent::periodic(day)]))
            .collect();
        units.extend((3..5).map(|id| unit(id, 50014, vec![ScheduleEvent::periodic(day)])));

        let policy = policy().with_capacity(3, 100);
        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        for unit in &outcome.units {
            let expected = if unit.zip_code == Some(50014) {
                date(2025, 3, 4)
            } else {
                day
            };
            assert_eq!(unit.events[0].date, expected, "unit {}", unit.unit_id);
        }
    }

    #[test]
    fn same_zip_neighbours_move_before_the_units_own_events() {
        let day = date(2025, 3, 3);
        let units = vec![
            unit(
                0,
                50010,
                vec![ScheduleEvent::periodic(day), ScheduleEvent::periodic(day)],
            ),
            unit(1, 50010, vec![ScheduleEvent::periodic(day)]),
        ];

        let policy = policy().with_capacity(2, 100);
        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(
            outcome.units[0].events,
            vec![ScheduleEvent::periodic(day), ScheduleEvent::periodic(day)]
        );
        assert_eq!(outcome.units[1].events[0].date, date(2025, 3, 4));
        assert_eq!(outcome.report.day_capacity_shifts, 1);
    }

    #[test]
    fn locked_events_stay_even_when_over_capacity() {
        let day = date(2025, 3, 3);
        let units: Vec<Unit> = (0..4)
            .map(|id| unit(id, 50010, vec![ScheduleEvent::move_out(day)]))
            .collect();

        let policy = policy().with_capacity(2, 100);
        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(count_on(&outcome.units, day), 4);
        assert_eq!(outcome.report.mutations(), 0);
    }

    #[test]
    fn movable_events_yield_to_locked_ones() {
        let day = date(2025, 3, 3);
        let mut units: Vec<Unit> = (0..2)
            .map(|id| unit(id, 50010, vec![ScheduleEvent::move_out(day)]))
            .collect();
        units.push(unit(2, 50010, vec![ScheduleEvent::periodic(day)]));

        let policy = policy().with_capacity(2, 100);
        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(outcome.units[2].events[0].date, date(2025, 3, 4));
        assert!(outcome.units[..2]
            .iter()
            .all(|unit| unit.events[0].date == day));
    }

    #[test]
    fn historical_events_are_never_touched() {
        let past = date(2020, 1, 4);
        let beyond = date(2031, 1, 1);
        let units = vec![unit(
            0,
            50010,
            vec![ScheduleEvent::historical(past), ScheduleEvent::historical(beyond)],
        )];

        let policy = policy().with_blackout(WeekdayCalendar::weekends_closed());
        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(
            outcome.units[0].events,
            vec![ScheduleEvent::historical(past), ScheduleEvent::historical(beyond)]
        );
    }

    #[test]
    fn events_past_the_horizon_are_dropped() {
        let policy = policy();
        let units = vec![
            unit(0, 50010, vec![ScheduleEvent::move_out(add_days(policy.horizon_date, 1))]),
            unit(1, 50010, vec![ScheduleEvent::periodic(policy.horizon_date)]),
        ];

        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert!(outcome.units[0].events.is_empty());
        assert_eq!(outcome.units[1].events.len(), 1);
        assert_eq!(outcome.report.horizon_drops, 1);
    }

    #[test]
    fn blackout_days_are_resolved_forward() {
        // 2025-03-08 is a Saturday
        let units = vec![unit(0, 50010, vec![ScheduleEvent::periodic(date(2025, 3, 8))])];
        let policy = policy().with_blackout(WeekdayCalendar::weekends_closed());

        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(outcome.units[0].events[0].date, date(2025, 3, 10));
        assert_eq!(outcome.report.blackout_shifts, 1);
    }

    #[test]
    fn capacity_shift_onto_a_blackout_day_is_resolved() {
        // Friday overflow spills onto Saturday, which the calendar pushes to Monday
        let friday = date(2025, 3, 7);
        let units: Vec<Unit> = (0..3)
            .map(|id| unit(id, 50010 + id as u32, vec![ScheduleEvent::periodic(friday)]))
            .collect();
        let policy = policy()
            .with_capacity(2, 100)
            .with_blackout(WeekdayCalendar::weekends_closed());

        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        assert_eq!(count_on(&outcome.units, friday), 2);
        assert_eq!(count_on(&outcome.units, date(2025, 3, 10)), 1);
        assert_eq!(count_on(&outcome.units, date(2025, 3, 8)), 0);
    }

    #[test]
    fn week_overflow_spills_into_the_next_week() {
        let monday = date(2025, 3, 3);
        let units: Vec<Unit> = (0..4)
            .map(|id| {
                unit(
                    id,
                    50010,
                    vec![ScheduleEvent::periodic(add_days(monday, id as i64))],
                )
            })
            .collect();
        let policy = policy().with_capacity(5, 3);

        let outcome = apply_constraints(units, &policy).expect("repair succeeds");

        let this_week = outcome
            .units
            .iter()
            .flat_map(|unit| unit.events.iter())
            .filter(|event| event.date.iso_week() == monday.iso_week())
            .count();
        assert_eq!(this_week, 3);
        assert!(outcome.report.week_capacity_shifts >= 1);
    }

    #[test]
    fn repaired_schedule_is_a_fixed_point() {
        let policy = policy()
            .with_capacity(2, 6)
            .with_blackout(WeekdayCalendar::weekends_closed());
        let units: Vec<Unit> = (0..12)
            .map(|id| {
                let events = vec![
                    ScheduleEvent::periodic(date(2025, 3, 5)),
                    ScheduleEvent::periodic(date(2025, 6, 5)),
                ];
                unit(id, 50010 + (id % 3) as u32, events)
            })
            .collect();

        let first = apply_constraints(units, &policy).expect("first pass");
        assert!(first.report.mutations() > 0);

        let second = apply_constraints(first.units.clone(), &policy).expect("second pass");
        assert_eq!(second.report.mutations(), 0);
        assert_eq!(second.units, first.units);
    }

    #[test]
    fn backward_blackout_resolution_is_rejected() {
        let units = vec![unit(0, 50010, vec![ScheduleEvent::periodic(date(2025, 3, 5))])];
        let policy = policy().with_blackout(FnCalendar(|d: NaiveDate| d - Duration::days(1)));

        let err = apply_constraints(units, &policy).expect_err("backward resolver fails");
        assert!(matches!(err, ScheduleError::BlackoutMovedBackward { .. }));
    }

    #[test]
    fn non_idempotent_blackout_is_rejected() {
        let units = vec![unit(0, 50010, vec![ScheduleEvent::periodic(date(2025, 3, 5))])];
        let policy = policy().with_blackout(FnCalendar(|d: NaiveDate| d + Duration::days(1)));

        let err = apply_constraints(units, &policy).expect_err("oscillating resolver fails");
        assert!(matches!(err, ScheduleError::BlackoutNotIdempotent { .. }));
    }

    #[test]
    fn iteration_bound_stops_runaway_repairs() {
        let day = date(2025, 3, 3);
        let units: Vec<Unit> = (0..10)
            .map(|id| unit(id, 50010, vec![ScheduleEvent::periodic(day)]))
            .collect();
        let policy = policy().with_max_repair_iterations(3);

        let err = apply_constraints(units, &policy).expect_err("bound exceeded");
        assert_eq!(err, ScheduleError::RepairDidNotConverge { iterations: 3 });
    }

    #[test]
    fn invalid_policy_is_reported() {
        let err = apply_constraints(Vec::new(), &policy().with_capacity(0, 1))
            .expect_err("zero capacity rejected");
        assert!(matches!(err, ScheduleError::InvalidPolicy(_)));
    }
}
