use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Months between two periodic inspections.
pub const PERIOD_MONTHS: u32 = 3;

/// Search window for the next open day before a calendar gives up.
const MAX_BLACKOUT_SEARCH_DAYS: i64 = 366;

/// Signed calendar offset used for move-in and move-out buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOffset {
    Months(i32),
    Days(i64),
}

impl DateOffset {
    pub fn apply(&self, date: NaiveDate) -> NaiveDate {
        match *self {
            DateOffset::Months(months) if months >= 0 => add_months(date, months.unsigned_abs()),
            DateOffset::Months(months) => date
                .checked_sub_months(Months::new(months.unsigned_abs()))
                .unwrap_or(NaiveDate::MIN),
            DateOffset::Days(days) => date
                .checked_add_signed(Duration::days(days))
                .unwrap_or(if days >= 0 {
                    NaiveDate::MAX
                } else {
                    NaiveDate::MIN
                }),
        }
    }
}

/// Calendar-aware month addition; the day is clamped to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MAX)
}

/// Maps a disallowed date to the next permissible one.
///
/// Implementations must be idempotent and must move dates forward only; the constraint
/// engine reports a `ScheduleError` when either rule is broken.
pub trait BlackoutCalendar: Send + Sync {
    fn resolve(&self, date: NaiveDate) -> NaiveDate;
}

/// Every day is open.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCalendar;

impl BlackoutCalendar for OpenCalendar {
    fn resolve(&self, date: NaiveDate) -> NaiveDate {
        date
    }
}

/// Closes fixed weekdays and an explicit set of holidays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayCalendar {
    closed_weekdays: Vec<Weekday>,
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weekends_closed() -> Self {
        Self::new()
            .with_closed_weekday(Weekday::Sat)
            .with_closed_weekday(Weekday::Sun)
    }

    pub fn with_closed_weekday(mut self, weekday: Weekday) -> Self {
        if !self.closed_weekdays.contains(&weekday) {
            self.closed_weekdays.push(weekday);
        }
        self
    }

    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(mut self, dates: I) -> Self {
        self.holidays.extend(dates);
        self
    }

    pub fn is_open(&self, date: NaiveDate) -> bool {
        !self.closed_weekdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }
}

impl BlackoutCalendar for WeekdayCalendar {
    fn resolve(&self, date: NaiveDate) -> NaiveDate {
        (0..=MAX_BLACKOUT_SEARCH_DAYS)
            .filter_map(|offset| date.checked_add_signed(Duration::days(offset)))
            .find(|candidate| self.is_open(*candidate))
            .unwrap_or(date)
    }
}

/// Adapts a plain function or closure into a calendar.
pub struct FnCalendar<F>(pub F);

impl<F> BlackoutCalendar for FnCalendar<F>
where
    F: Fn(NaiveDate) -> NaiveDate + Send + Sync,
{
    fn resolve(&self, date: NaiveDate) -> NaiveDate {
        (self.0)(date)
    }
}

/// Caller-supplied scheduling configuration. The engine never mutates it.
#[derive(Clone)]
pub struct SchedulingPolicy {
    /// No generated event may fall before this date.
    pub earliest_date: NaiveDate,
    /// Hard upper bound; later events are dropped during repair.
    pub horizon_date: NaiveDate,
    pub move_in_buffer: DateOffset,
    pub move_out_buffer: DateOffset,
    pub max_per_day: usize,
    pub max_per_week: usize,
    pub blackout: Arc<dyn BlackoutCalendar>,
    pub max_repair_iterations: usize,
}

impl SchedulingPolicy {
    pub const DEFAULT_MAX_PER_DAY: usize = 5;
    pub const DEFAULT_MAX_PER_WEEK: usize = 20;
    pub const DEFAULT_HORIZON_YEARS: u32 = 3;
    pub const DEFAULT_MAX_REPAIR_ITERATIONS: usize = 250_000;

    /// Defaults anchored on `today`: scheduling starts tomorrow and runs three years out.
    pub fn standard(today: NaiveDate) -> Self {
        let earliest_date = add_days(today, 1);
        Self {
            earliest_date,
            horizon_date: add_months(earliest_date, 12 * Self::DEFAULT_HORIZON_YEARS),
            move_in_buffer: DateOffset::Months(3),
            move_out_buffer: DateOffset::Months(-1),
            max_per_day: Self::DEFAULT_MAX_PER_DAY,
            max_per_week: Self::DEFAULT_MAX_PER_WEEK,
            blackout: Arc::new(WeekdayCalendar::weekends_closed()),
            max_repair_iterations: Self::DEFAULT_MAX_REPAIR_ITERATIONS,
        }
    }

    pub fn with_earliest_date(mut self, earliest_date: NaiveDate) -> Self {
        self.earliest_date = earliest_date;
        self
    }

    pub fn with_horizon(mut self, horizon_date: NaiveDate) -> Self {
        self.horizon_date = horizon_date;
        self
    }

    pub fn with_buffers(mut self, move_in: DateOffset, move_out: DateOffset) -> Self {
        self.move_in_buffer = move_in;
        self.move_out_buffer = move_out;
        self
    }

    pub fn with_capacity(mut self, max_per_day: usize, max_per_week: usize) -> Self {
        self.max_per_day = max_per_day;
        self.max_per_week = max_per_week;
        self
    }

    pub fn with_blackout<C: BlackoutCalendar + 'static>(mut self, calendar: C) -> Self {
        self.blackout = Arc::new(calendar);
        self
    }

    pub fn with_max_repair_iterations(mut self, iterations: usize) -> Self {
        self.max_repair_iterations = iterations;
        self
    }

    pub fn move_in_buffer(&self, date: NaiveDate) -> NaiveDate {
        self.move_in_buffer.apply(date)
    }

    pub fn move_out_buffer(&self, date: NaiveDate) -> NaiveDate {
        self.move_out_buffer.apply(date)
    }

    pub fn resolve_blackout(&self, date: NaiveDate) -> NaiveDate {
        self.blackout.resolve(date)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_per_day == 0 {
            return Err("max_per_day must be at least 1".to_string());
        }
        if self.max_per_week == 0 {
            return Err("max_per_week must be at least 1".to_string());
        }
        if self.horizon_date < self.earliest_date {
            return Err(format!(
                "horizon {} is before earliest date {}",
                self.horizon_date, self.earliest_date
            ));
        }
        if self.max_repair_iterations == 0 {
            return Err("max_repair_iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingPolicy")
            .field("earliest_date", &self.earliest_date)
            .field("horizon_date", &self.horizon_date)
            .field("move_in_buffer", &self.move_in_buffer)
            .field("move_out_buffer", &self.move_out_buffer)
            .field("max_per_day", &self.max_per_day)
            .field("max_per_week", &self.max_per_week)
            .field("max_repair_iterations", &self.max_repair_iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_offsets_clamp_to_month_end() {
        assert_eq!(DateOffset::Months(1).apply(date(2025, 1, 31)), date(2025, 2, 28));
        assert_eq!(DateOffset::Months(-1).apply(date(2025, 3, 31)), date(2025, 2, 28));
        assert_eq!(DateOffset::Days(-2).apply(date(2025, 3, 1)), date(2025, 2, 27));
    }

    #[test]
    fn weekday_calendar_skips_weekends_and_holidays() {
        // 2025-07-04 is a Friday.
        let calendar = WeekdayCalendar::weekends_closed().with_holiday(date(2025, 7, 4));
        assert_eq!(calendar.resolve(date(2025, 7, 3)), date(2025, 7, 3));
        assert_eq!(calendar.resolve(date(2025, 7, 4)), date(2025, 7, 7));
        assert_eq!(calendar.resolve(date(2025, 7, 5)), date(2025, 7, 7));
        let resolved = calendar.resolve(date(2025, 7, 4));
        assert_eq!(calendar.resolve(resolved), resolved);
    }

    #[test]
    fn standard_policy_runs_three_years_from_tomorrow() {
        let policy = SchedulingPolicy::standard(date(2025, 9, 24));
        assert_eq!(policy.earliest_date, date(2025, 9, 25));
        assert_eq!(policy.horizon_date, date(2028, 9, 25));
        assert_eq!(policy.move_in_buffer(date(2025, 1, 15)), date(2025, 4, 15));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_capacity_and_inverted_horizon() {
        let policy = SchedulingPolicy::standard(date(2025, 9, 24));
        assert!(policy.clone().with_capacity(0, 5).validate().is_err());
        assert!(policy.clone().with_capacity(5, 0).validate().is_err());
        assert!(policy.with_horizon(date(2025, 1, 1)).validate().is_err());
    }

    #[test]
    fn closures_can_act_as_calendars() {
        let calendar = FnCalendar(|d: NaiveDate| {
            if d.day() == 13 {
                d.succ_opt().unwrap_or(d)
            } else {
                d
            }
        });
        assert_eq!(calendar.resolve(date(2025, 6, 13)), date(2025, 6, 14));
    }
}
