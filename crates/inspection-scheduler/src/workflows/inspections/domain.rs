use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of candidate generation for units that could not be given a regular cadence.
/// Serialized as its label so JSON responses and CSV exports agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[serde(rename = "Unoccupied")]
    Unoccupied,
    #[serde(rename = "Missing lease start")]
    MissingLeaseStart,
    #[serde(rename = "Term ended")]
    TermEnded,
    #[serde(rename = "Term end is too soon")]
    TermEndTooSoon,
}

impl ScheduleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unoccupied => "Unoccupied",
            Self::MissingLeaseStart => "Missing lease start",
            Self::TermEnded => "Term ended",
            Self::TermEndTooSoon => "Term end is too soon",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Historical,
    MoveOut,
    Urgent,
    Periodic,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Historical => "Historical",
            Self::MoveOut => "Move-out",
            Self::Urgent => "Urgent",
            Self::Periodic => "Quarterly",
        }
    }
}

/// A single inspection date attached to a unit.
///
/// Historical events are imported ground truth and are never moved or dropped by the
/// constraint engine. Move-out events are never shifted for capacity but can still fall
/// off the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub date: NaiveDate,
    #[serde(default)]
    pub is_historical: bool,
    #[serde(default)]
    pub is_move_out: bool,
    #[serde(default)]
    pub is_urgent: bool,
}

impl ScheduleEvent {
    pub fn periodic(date: NaiveDate) -> Self {
        Self {
            date,
            is_historical: false,
            is_move_out: false,
            is_urgent: false,
        }
    }

    pub fn historical(date: NaiveDate) -> Self {
        Self {
            is_historical: true,
            ..Self::periodic(date)
        }
    }

    pub fn move_out(date: NaiveDate) -> Self {
        Self {
            is_move_out: true,
            ..Self::periodic(date)
        }
    }

    pub fn urgent(date: NaiveDate) -> Self {
        Self {
            is_urgent: true,
            ..Self::periodic(date)
        }
    }

    /// Locked events are excluded from capacity shifting.
    pub fn is_locked(&self) -> bool {
        self.is_move_out || self.is_historical
    }

    pub fn kind(&self) -> EventKind {
        if self.is_historical {
            EventKind::Historical
        } else if self.is_move_out {
            EventKind::MoveOut
        } else if self.is_urgent {
            EventKind::Urgent
        } else {
            EventKind::Periodic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Imported columns the scheduler does not understand, kept in column order for re-export.
pub type PassthroughFields = Vec<(String, String)>;

/// A leased unit whose inspection schedule is being computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<u32>,
    #[serde(default)]
    pub unit_label: Option<String>,
    #[serde(default)]
    pub lease_start: Option<NaiveDate>,
    #[serde(default)]
    pub lease_end: Option<NaiveDate>,
    #[serde(default)]
    pub move_out_date: Option<NaiveDate>,
    #[serde(default)]
    pub status_message: Option<ScheduleStatus>,
    #[serde(default)]
    pub events: Vec<ScheduleEvent>,
    #[serde(default)]
    pub tenants: Vec<TenantRecord>,
    #[serde(default)]
    pub passthrough: PassthroughFields,
}

impl Unit {
    pub fn new(unit_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            address: address.into(),
            city: None,
            state: None,
            zip_code: None,
            unit_label: None,
            lease_start: None,
            lease_end: None,
            move_out_date: None,
            status_message: None,
            events: Vec::new(),
            tenants: Vec::new(),
            passthrough: Vec::new(),
        }
    }

    pub fn with_location(
        mut self,
        city: impl Into<String>,
        state: impl Into<String>,
        zip_code: u32,
    ) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self.zip_code = Some(zip_code);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.unit_label = Some(label.into());
        self
    }

    pub fn with_lease(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.lease_start = start;
        self.lease_end = end;
        self
    }

    pub fn with_move_out(mut self, date: NaiveDate) -> Self {
        self.move_out_date = Some(date);
        self
    }

    pub fn with_events(mut self, events: Vec<ScheduleEvent>) -> Self {
        self.events = events;
        self
    }

    /// The true end of occupancy: the move-out date when known, otherwise the lease end.
    pub fn effective_end(&self) -> Option<NaiveDate> {
        self.move_out_date.or(self.lease_end)
    }

    pub fn has_move_out_event(&self) -> bool {
        self.events.iter().any(|event| event.is_move_out)
    }

    /// Short human-readable identity used in log lines.
    pub fn describe(&self) -> String {
        match self.unit_label.as_deref().filter(|label| !label.is_empty()) {
            Some(label) => format!("[{}] {} #{}", self.unit_id, self.address, label),
            None => format!("[{}] {}", self.unit_id, self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn effective_end_prefers_move_out() {
        let unit = Unit::new("1", "12 Elm St")
            .with_lease(Some(date(2024, 1, 1)), Some(date(2025, 1, 1)))
            .with_move_out(date(2024, 11, 15));
        assert_eq!(unit.effective_end(), Some(date(2024, 11, 15)));

        let unit = Unit::new("2", "14 Elm St").with_lease(None, Some(date(2025, 1, 1)));
        assert_eq!(unit.effective_end(), Some(date(2025, 1, 1)));
    }

    #[test]
    fn event_kind_prioritizes_historical_flag() {
        let mut event = ScheduleEvent::move_out(date(2025, 3, 1));
        assert_eq!(event.kind(), EventKind::MoveOut);
        assert!(event.is_locked());

        event.is_historical = true;
        assert_eq!(event.kind().label(), "Historical");
        assert!(!ScheduleEvent::urgent(date(2025, 3, 1)).is_locked());
    }

    #[test]
    fn status_serializes_as_its_label() {
        for status in [
            ScheduleStatus::Unoccupied,
            ScheduleStatus::MissingLeaseStart,
            ScheduleStatus::TermEnded,
            ScheduleStatus::TermEndTooSoon,
        ] {
            let json = serde_json::to_value(status).expect("status serializes");
            assert_eq!(json, status.label());
            let parsed: ScheduleStatus = serde_json::from_value(json).expect("status parses");
            assert_eq!(parsed, status);
        }
    }
}
