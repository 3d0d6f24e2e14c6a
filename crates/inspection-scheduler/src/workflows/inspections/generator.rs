use super::domain::{ScheduleEvent, ScheduleStatus, Unit};
use super::policy::{add_days, add_months, SchedulingPolicy, PERIOD_MONTHS};
use chrono::NaiveDate;
use tracing::debug;

/// Mean Gregorian month length in hours (146097 days per 4800 months).
const AVERAGE_MONTH_HOURS: f64 = 146_097.0 / 4_800.0 * 24.0;

/// Gaps wider than one and a half periods get a filler inspection.
fn max_gap_hours() -> f64 {
    f64::from(PERIOD_MONTHS) * 1.5 * AVERAGE_MONTH_HOURS
}

pub fn generate_all(units: Vec<Unit>, policy: &SchedulingPolicy) -> Vec<Unit> {
    units
        .into_iter()
        .map(|unit| generate_candidates(unit, policy))
        .collect()
}

/// Proposes candidate inspection dates for one unit.
///
/// Existing events, historical ones included, are kept and only appended to. The unit's
/// status message is reset and then set when the lease state prevents a regular cadence.
pub fn generate_candidates(mut unit: Unit, policy: &SchedulingPolicy) -> Unit {
    unit.status_message = None;
    let effective_end = unit.effective_end();

    let Some(lease_start) = unit.lease_start else {
        let status = if effective_end.is_none() {
            ScheduleStatus::Unoccupied
        } else {
            ScheduleStatus::MissingLeaseStart
        };
        debug!(unit = %unit.describe(), %status, "skipping unit without lease start");
        unit.status_message = Some(status);
        return unit;
    };

    let mut schedule_start = policy.move_in_buffer(lease_start).max(policy.earliest_date);
    debug!(
        unit = %unit.describe(),
        %lease_start,
        %schedule_start,
        "computed schedule start after move-in buffer"
    );

    let Some(effective_end) = effective_end else {
        if unit.events.is_empty() {
            let dates = periodic_dates(schedule_start, policy.horizon_date);
            debug!(unit = %unit.describe(), count = dates.len(), "open-ended lease, scheduling quarterly");
            unit.events
                .extend(dates.into_iter().map(ScheduleEvent::periodic));
        } else {
            fill_gaps(&mut unit);
        }
        return unit;
    };

    if effective_end < policy.earliest_date {
        unit.status_message = Some(ScheduleStatus::TermEnded);
        push_move_out(&mut unit, add_days(policy.earliest_date, 1));
        return unit;
    }

    let schedule_end = policy.move_out_buffer(effective_end).min(policy.horizon_date);
    let move_out_date = add_days(effective_end, 1);

    if schedule_end < policy.earliest_date {
        unit.status_message = Some(ScheduleStatus::TermEndTooSoon);
        push_move_out(&mut unit, move_out_date);
        return unit;
    }

    if schedule_end < schedule_start {
        debug!(
            unit = %unit.describe(),
            %schedule_start,
            %schedule_end,
            "term is shorter than the buffer window"
        );
        if unit.events.is_empty() {
            unit.events.push(ScheduleEvent::urgent(policy.earliest_date));
        }
        push_move_out(&mut unit, move_out_date);
        return unit;
    }

    if !unit.events.is_empty() {
        fill_gaps(&mut unit);
        if let Some(latest) = unit.events.iter().map(|event| event.date).max() {
            let resumed = add_months(latest, PERIOD_MONTHS);
            if resumed > schedule_start {
                schedule_start = resumed;
            }
        }
    }

    let dates = periodic_dates(schedule_start, schedule_end);
    debug!(
        unit = %unit.describe(),
        count = dates.len(),
        %schedule_start,
        %schedule_end,
        "scheduling quarterly inspections"
    );
    unit.events
        .extend(dates.into_iter().map(ScheduleEvent::periodic));

    if unit.events.is_empty() {
        debug!(unit = %unit.describe(), date = %policy.earliest_date, "forcing single inspection");
        unit.events.push(ScheduleEvent::periodic(policy.earliest_date));
    }

    push_move_out(&mut unit, move_out_date);
    unit
}

/// Quarterly dates in `[start, end)`, each step added to the previous date.
fn periodic_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    std::iter::successors(Some(start), |date| Some(add_months(*date, PERIOD_MONTHS)))
        .take_while(|date| *date < end)
        .collect()
}

/// Inserts one midpoint inspection into every gap wider than the threshold.
fn fill_gaps(unit: &mut Unit) {
    unit.events.sort_by_key(|event| event.date);
    let threshold = max_gap_hours();

    let fillers: Vec<ScheduleEvent> = unit
        .events
        .windows(2)
        .filter_map(|pair| {
            let (before, after) = (pair[0].date, pair[1].date);
            let gap = after - before;
            if gap.num_hours() as f64 > threshold {
                Some(ScheduleEvent::periodic(add_days(before, gap.num_days() / 2)))
            } else {
                None
            }
        })
        .collect();

    for filler in &fillers {
        debug!(unit = %unit.describe(), date = %filler.date, "filled schedule gap");
    }
    unit.events.extend(fillers);
}

fn push_move_out(unit: &mut Unit, date: NaiveDate) {
    if unit.has_move_out_event() {
        return;
    }
    debug!(unit = %unit.describe(), %date, "scheduling move-out inspection");
    unit.events.push(ScheduleEvent::move_out(date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inspections::policy::{DateOffset, OpenCalendar};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn policy() -> SchedulingPolicy {
        SchedulingPolicy::standard(date(2025, 1, 14))
            .with_buffers(DateOffset::Months(3), DateOffset::Months(-1))
            .with_blackout(OpenCalendar)
    }

    fn unit() -> Unit {
        Unit::new("1", "100 Main St").with_location("Des Moines", "IA", 50309)
    }

    #[test]
    fn unit_without_lease_is_unoccupied() {
        let unit = generate_candidates(unit(), &policy());
        assert_eq!(unit.status_message, Some(ScheduleStatus::Unoccupied));
        assert!(unit.events.is_empty());
    }

    #[test]
    fn unit_with_end_but_no_start_is_flagged() {
        let unit = generate_candidates(
            unit().with_lease(None, Some(date(2025, 12, 31))),
            &policy(),
        );
        assert_eq!(unit.status_message, Some(ScheduleStatus::MissingLeaseStart));
        assert!(unit.events.is_empty());
    }

    #[test]
    fn open_ended_lease_runs_quarterly_to_horizon() {
        let policy = policy();
        let unit = generate_candidates(unit().with_lease(Some(date(2024, 1, 14)), None), &policy);

        assert!(unit.status_message.is_none());
        assert_eq!(unit.events.first().map(|e| e.date), Some(policy.earliest_date));
        assert_eq!(unit.events.len(), 12);
        assert!(unit.events.iter().all(|e| e.date < policy.horizon_date));
        assert!(!unit.has_move_out_event());
    }

    #[test]
    fn open_ended_lease_with_history_only_fills_gaps() {
        let history = vec![
            ScheduleEvent::historical(date(2024, 1, 1)),
            ScheduleEvent::historical(date(2024, 9, 1)),
            ScheduleEvent::historical(date(2024, 12, 1)),
        ];
        let unit = generate_candidates(
            unit()
                .with_lease(Some(date(2023, 6, 1)), None)
                .with_events(history),
            &policy(),
        );

        assert_eq!(unit.events.len(), 4);
        let filler = unit.events.last().expect("filler inserted");
        assert!(!filler.is_historical);
        // 244 day gap, midpoint is 122 days after the first inspection
        assert_eq!(filler.date, date(2024, 5, 2));
    }

    #[test]
    fn gaps_at_the_threshold_are_left_alone() {
        let history = vec![
            ScheduleEvent::historical(date(2024, 1, 1)),
            ScheduleEvent::historical(date(2024, 5, 16)),
        ];
        let unit = generate_candidates(
            unit()
                .with_lease(Some(date(2023, 6, 1)), None)
                .with_events(history),
            &policy(),
        );
        assert_eq!(unit.events.len(), 2);
    }

    #[test]
    fn expired_term_gets_move_out_after_earliest_date() {
        let policy = policy();
        let unit = generate_candidates(
            unit().with_lease(Some(date(2024, 1, 1)), Some(date(2025, 1, 13))),
            &policy,
        );
        assert_eq!(unit.status_message, Some(ScheduleStatus::TermEnded));
        assert_eq!(unit.events, vec![ScheduleEvent::move_out(date(2025, 1, 16))]);
    }

    #[test]
    fn expired_term_keeps_existing_move_out() {
        let existing = ScheduleEvent::move_out(date(2025, 1, 20));
        let unit = generate_candidates(
            unit()
                .with_lease(Some(date(2024, 1, 1)), Some(date(2025, 1, 13)))
                .with_events(vec![existing]),
            &policy(),
        );
        assert_eq!(unit.events, vec![existing]);
    }

    #[test]
    fn term_ending_inside_the_buffer_is_too_soon() {
        let unit = generate_candidates(
            unit().with_lease(Some(date(2024, 1, 1)), Some(date(2025, 2, 1))),
            &policy(),
        );
        assert_eq!(unit.status_message, Some(ScheduleStatus::TermEndTooSoon));
        assert_eq!(unit.events, vec![ScheduleEvent::move_out(date(2025, 2, 2))]);
    }

    #[test]
    fn short_term_gets_urgent_and_move_out() {
        let policy = policy();
        let unit = generate_candidates(
            unit().with_lease(Some(date(2025, 1, 15)), Some(date(2025, 3, 15))),
            &policy,
        );
        assert!(unit.status_message.is_none());
        assert_eq!(
            unit.events,
            vec![
                ScheduleEvent::urgent(policy.earliest_date),
                ScheduleEvent::move_out(date(2025, 3, 16)),
            ]
        );
    }

    #[test]
    fn fixed_term_schedules_until_move_out_buffer() {
        let unit = generate_candidates(
            unit().with_lease(Some(date(2024, 10, 1)), Some(date(2025, 12, 31))),
            &policy(),
        );
        let dates: Vec<_> = unit.events.iter().map(|e| e.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 15),
                date(2025, 4, 15),
                date(2025, 7, 15),
                date(2025, 10, 15),
                date(2026, 1, 1),
            ]
        );
        assert!(unit.events.last().is_some_and(|e| e.is_move_out));
    }

    #[test]
    fn move_out_date_overrides_lease_end() {
        let unit = generate_candidates(
            unit()
                .with_lease(Some(date(2024, 10, 1)), Some(date(2026, 12, 31)))
                .with_move_out(date(2025, 6, 30)),
            &policy(),
        );
        let move_out = unit
            .events
            .iter()
            .find(|e| e.is_move_out)
            .expect("move-out scheduled");
        assert_eq!(move_out.date, date(2025, 7, 1));
    }

    #[test]
    fn history_pushes_the_cadence_forward() {
        let unit = generate_candidates(
            unit()
                .with_lease(Some(date(2024, 1, 1)), Some(date(2026, 1, 1)))
                .with_events(vec![ScheduleEvent::historical(date(2025, 3, 1))]),
            &policy(),
        );
        let periodic: Vec<_> = unit
            .events
            .iter()
            .filter(|e| !e.is_historical && !e.is_move_out)
            .map(|e| e.date)
            .collect();
        assert_eq!(
            periodic,
            vec![date(2025, 6, 1), date(2025, 9, 1)]
        );
    }

    #[test]
    fn window_without_room_forces_single_inspection() {
        let policy = policy();
        // schedule start is the earliest date, the buffered end falls on the same day
        let unit = generate_candidates(
            unit().with_lease(Some(date(2024, 1, 1)), Some(date(2025, 2, 15))),
            &policy,
        );
        assert_eq!(
            unit.events,
            vec![
                ScheduleEvent::periodic(policy.earliest_date),
                ScheduleEvent::move_out(date(2025, 2, 16)),
            ]
        );
    }
}
