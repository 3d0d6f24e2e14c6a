//! Column schema shared by import and both export shapes.

use super::normalizer::normalize_header;
use crate::workflows::inspections::{TenantRecord, Unit};
use chrono::NaiveDate;

/// Textual date format used on both sides of the file boundary.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Placeholder stored for a blank required text cell.
pub const NO_DATA: &str = "<no data>";

/// Rows whose first column carries this value are report totals, not units.
pub const TOTAL_ROW: &str = "Total";

pub const INSPECTION_PREFIX: &str = "Inspection ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Unit,
    Tenant,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Address,
    City,
    State,
    ZipCode,
    UnitLabel,
    LeaseStart,
    LeaseEnd,
    MoveOut,
    TenantName,
    TenantPhone,
    TenantEmail,
    InspectionDate,
    InspectionNumber,
    InspectionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub header: &'static str,
    pub field: Field,
    pub kind: FieldKind,
    pub optional: bool,
    pub role: FieldRole,
}

const fn column(
    header: &'static str,
    field: Field,
    kind: FieldKind,
    optional: bool,
    role: FieldRole,
) -> FieldDescriptor {
    FieldDescriptor {
        header,
        field,
        kind,
        optional,
        role,
    }
}

pub const UNIT_FIELDS: &[FieldDescriptor] = &[
    column("Property Street Address 1", Field::Address, FieldKind::Text, false, FieldRole::Unit),
    column("Property City", Field::City, FieldKind::Text, false, FieldRole::Unit),
    column("Property State", Field::State, FieldKind::Text, false, FieldRole::Unit),
    column("Property Zip", Field::ZipCode, FieldKind::Number, false, FieldRole::Unit),
    column("Unit", Field::UnitLabel, FieldKind::Text, true, FieldRole::Unit),
    column("Lease From", Field::LeaseStart, FieldKind::Date, true, FieldRole::Unit),
    column("Lease To", Field::LeaseEnd, FieldKind::Date, true, FieldRole::Unit),
    column("Move-out", Field::MoveOut, FieldKind::Date, true, FieldRole::Unit),
];

pub const TENANT_FIELDS: &[FieldDescriptor] = &[
    column("Tenant", Field::TenantName, FieldKind::Text, true, FieldRole::Tenant),
    column("Phone Numbers", Field::TenantPhone, FieldKind::Text, true, FieldRole::Tenant),
    column("Emails", Field::TenantEmail, FieldKind::Text, true, FieldRole::Tenant),
];

pub const EVENT_FIELDS: &[FieldDescriptor] = &[
    column("Inspection Date", Field::InspectionDate, FieldKind::Date, false, FieldRole::Event),
    column("Inspection Number", Field::InspectionNumber, FieldKind::Number, false, FieldRole::Event),
    column("Inspection Type", Field::InspectionType, FieldKind::Text, false, FieldRole::Event),
];

/// Column order of the one-row-per-event export.
pub fn event_export_columns() -> Vec<&'static FieldDescriptor> {
    let (leading, trailing) = EVENT_FIELDS.split_at(2);
    leading
        .iter()
        .chain(UNIT_FIELDS)
        .chain(trailing)
        .chain(TENANT_FIELDS)
        .collect()
}

pub fn find_descriptor<'a>(
    fields: &'a [FieldDescriptor],
    header: &str,
) -> Option<&'a FieldDescriptor> {
    let normalized = normalize_header(header);
    fields
        .iter()
        .find(|descriptor| normalize_header(descriptor.header) == normalized)
}

/// The 1-based number of an `Inspection N` column.
pub fn inspection_number(header: &str) -> Option<usize> {
    let normalized = normalize_header(header);
    let digits = normalized.strip_prefix(&INSPECTION_PREFIX.to_ascii_lowercase())?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn inspection_header(number: usize) -> String {
    format!("{INSPECTION_PREFIX}{number}")
}

/// Whether an imported passthrough column shadows a column this schema writes.
pub fn is_schema_header(header: &str) -> bool {
    [UNIT_FIELDS, TENANT_FIELDS, EVENT_FIELDS]
        .into_iter()
        .any(|fields| find_descriptor(fields, header).is_some())
        || inspection_number(header).is_some()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// A typed cell value after parsing against its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Number(u32),
    Date(NaiveDate),
}

impl CellValue {
    fn into_text(self) -> String {
        match self {
            CellValue::Text(text) => text,
            CellValue::Number(number) => number.to_string(),
            CellValue::Date(date) => format_date(date),
        }
    }
}

impl Field {
    /// Writes an imported value onto the unit. Fields of other roles are ignored.
    pub fn assign_unit(self, unit: &mut Unit, value: CellValue) {
        match (self, value) {
            (Field::Address, value) => unit.address = value.into_text(),
            (Field::City, value) => unit.city = Some(value.into_text()),
            (Field::State, value) => unit.state = Some(value.into_text()),
            (Field::ZipCode, CellValue::Number(zip)) => unit.zip_code = Some(zip),
            (Field::UnitLabel, value) => unit.unit_label = Some(value.into_text()),
            (Field::LeaseStart, CellValue::Date(date)) => unit.lease_start = Some(date),
            (Field::LeaseEnd, CellValue::Date(date)) => unit.lease_end = Some(date),
            (Field::MoveOut, CellValue::Date(date)) => unit.move_out_date = Some(date),
            _ => {}
        }
    }

    pub fn assign_tenant(self, tenant: &mut TenantRecord, value: CellValue) {
        match self {
            Field::TenantName => tenant.name = value.into_text(),
            Field::TenantPhone => tenant.phone = Some(value.into_text()),
            Field::TenantEmail => tenant.email = Some(value.into_text()),
            _ => {}
        }
    }

    /// Reads the exported text of a unit-level field.
    pub fn read_unit(self, unit: &Unit) -> Option<String> {
        match self {
            Field::Address => Some(unit.address.clone()),
            Field::City => unit.city.clone(),
            Field::State => unit.state.clone(),
            Field::ZipCode => unit.zip_code.map(|zip| zip.to_string()),
            Field::UnitLabel => unit.unit_label.clone(),
            Field::LeaseStart => unit.lease_start.map(format_date),
            Field::LeaseEnd => unit.lease_end.map(format_date),
            Field::MoveOut => unit.move_out_date.map(format_date),
            _ => None,
        }
    }

    pub fn read_tenant(self, tenant: &TenantRecord) -> Option<String> {
        match self {
            Field::TenantName => Some(tenant.name.clone()),
            Field::TenantPhone => tenant.phone.clone(),
            Field::TenantEmail => tenant.email.clone(),
            _ => None,
        }
    }
}
