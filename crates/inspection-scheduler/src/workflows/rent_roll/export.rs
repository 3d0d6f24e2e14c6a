use super::schema::{
    event_export_columns, format_date, inspection_header, is_schema_header, FieldRole,
    UNIT_FIELDS,
};
use super::RentRollExportError;
use crate::workflows::inspections::{ScheduleEvent, TenantRecord, Unit};
use std::io::Write;
use tracing::{debug, warn};

/// Writes one row per unit with its schedule spread across `Inspection N` columns.
pub fn write_units<W: Write>(writer: W, units: &[Unit]) -> Result<(), RentRollExportError> {
    let passthrough = passthrough_columns(units);
    let inspections = units.iter().map(|unit| unit.events.len()).max().unwrap_or(0);

    let mut csv_writer = csv::Writer::from_writer(writer);
    let header: Vec<String> = UNIT_FIELDS
        .iter()
        .map(|descriptor| descriptor.header.to_string())
        .chain(passthrough.iter().cloned())
        .chain((1..=inspections).map(inspection_header))
        .collect();
    csv_writer.write_record(&header)?;

    for unit in units {
        let mut row: Vec<String> = UNIT_FIELDS
            .iter()
            .map(|descriptor| descriptor.field.read_unit(unit).unwrap_or_default())
            .collect();
        row.extend(passthrough_values(unit, &passthrough));
        row.extend(
            (0..inspections).map(|index| {
                unit.events.get(index).map(|event| format_date(event.date)).unwrap_or_default()
            }),
        );
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    debug!(units = units.len(), inspections, "wrote unit schedule export");
    Ok(())
}

/// Writes one row per event, ordered by date and then address.
pub fn write_events<W: Write>(writer: W, units: &[Unit]) -> Result<(), RentRollExportError> {
    let passthrough = passthrough_columns(units);
    let columns = event_export_columns();

    let mut rows: Vec<(&Unit, usize, &ScheduleEvent)> = units
        .iter()
        .flat_map(|unit| {
            unit.events
                .iter()
                .enumerate()
                .map(move |(index, event)| (unit, index + 1, event))
        })
        .collect();
    rows.sort_by(|a, b| {
        a.2.date
            .cmp(&b.2.date)
            .then_with(|| a.0.address.cmp(&b.0.address))
    });

    let mut csv_writer = csv::Writer::from_writer(writer);
    let header: Vec<String> = columns
        .iter()
        .map(|descriptor| descriptor.header.to_string())
        .chain(passthrough.iter().cloned())
        .collect();
    csv_writer.write_record(&header)?;

    for (unit, number, event) in &rows {
        let mut row: Vec<String> = columns
            .iter()
            .map(|descriptor| match descriptor.role {
                FieldRole::Unit => descriptor.field.read_unit(unit).unwrap_or_default(),
                FieldRole::Tenant => render_tenants(&unit.tenants, |tenant| {
                    descriptor.field.read_tenant(tenant)
                }),
                FieldRole::Event => event_cell(descriptor.header, *number, event),
            })
            .collect();
        row.extend(passthrough_values(unit, &passthrough));
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    debug!(events = rows.len(), "wrote per-event schedule export");
    Ok(())
}

pub fn units_to_csv(units: &[Unit]) -> Result<String, RentRollExportError> {
    let mut buffer = Vec::new();
    write_units(&mut buffer, units)?;
    String::from_utf8(buffer).map_err(|_| RentRollExportError::Encoding)
}

pub fn events_to_csv(units: &[Unit]) -> Result<String, RentRollExportError> {
    let mut buffer = Vec::new();
    write_events(&mut buffer, units)?;
    String::from_utf8(buffer).map_err(|_| RentRollExportError::Encoding)
}

fn event_cell(header: &str, number: usize, event: &ScheduleEvent) -> String {
    match header {
        "Inspection Date" => format_date(event.date),
        "Inspection Number" => number.to_string(),
        _ => event.kind().label().to_string(),
    }
}

/// Passthrough columns across all units in first-seen order. Columns shadowing a schema
/// column are dropped.
fn passthrough_columns(units: &[Unit]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (column, _) in units.iter().flat_map(|unit| unit.passthrough.iter()) {
        if columns.contains(column) {
            continue;
        }
        if is_schema_header(column) {
            warn!(%column, "passthrough column collides with a schedule column, not exported");
            continue;
        }
        columns.push(column.clone());
    }
    columns
}

fn passthrough_values<'a>(
    unit: &'a Unit,
    columns: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    columns.iter().map(move |column| {
        unit.passthrough
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    })
}

fn render_tenants<F>(tenants: &[TenantRecord], read: F) -> String
where
    F: Fn(&TenantRecord) -> Option<String>,
{
    tenants
        .iter()
        .enumerate()
        .filter_map(|(index, tenant)| {
            read(tenant)
                .filter(|value| !value.is_empty())
                .map(|value| format!("[{}] {}", index + 1, value))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn tenant(id: &str, name: &str, phone: Option<&str>) -> TenantRecord {
        TenantRecord {
            tenant_id: id.to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            email: None,
        }
    }

    fn sample_units() -> Vec<Unit> {
        let mut oak = Unit::new("1", "12 Oak St")
            .with_location("Des Moines", "IA", 50309)
            .with_events(vec![
                ScheduleEvent::historical(date(2025, 1, 6)),
                ScheduleEvent::periodic(date(2025, 4, 7)),
            ]);
        oak.passthrough.push(("Owner".to_string(), "Harper".to_string()));
        oak.tenants.push(tenant("1", "Avery Stone", Some("555-0100")));
        oak.tenants.push(tenant("2", "Jordan Lake", None));

        let mut ash = Unit::new("2", "4 Ash Ave")
            .with_location("Des Moines", "IA", 50310)
            .with_events(vec![ScheduleEvent::move_out(date(2025, 1, 6))]);
        ash.passthrough.push(("Lease To".to_string(), "ignored".to_string()));
        ash.passthrough.push(("Region".to_string(), "North".to_string()));

        vec![oak, ash]
    }

    #[test]
    fn unit_export_spreads_events_across_inspection_columns() {
        let csv = units_to_csv(&sample_units()).expect("unit export");
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Property Street Address 1,Property City,Property State,Property Zip,Unit,Lease From,Lease To,Move-out,Owner,Region,Inspection 1,Inspection 2"
        );
        assert_eq!(lines[1], "12 Oak St,Des Moines,IA,50309,,,,,Harper,,01/06/2025,04/07/2025");
        assert_eq!(lines[2], "4 Ash Ave,Des Moines,IA,50310,,,,,,North,01/06/2025,");
    }

    #[test]
    fn event_export_orders_by_date_then_address() {
        let csv = events_to_csv(&sample_units()).expect("event export");
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("01/06/2025,1,12 Oak St,"));
        assert!(lines[1].contains(",Historical,[1] Avery Stone [2] Jordan Lake,[1] 555-0100,,Harper,"));
        assert!(lines[2].starts_with("01/06/2025,1,4 Ash Ave,"));
        assert!(lines[2].ends_with(",Move-out,,,,,North"));
        assert!(lines[3].starts_with("04/07/2025,2,12 Oak St,"));
        assert!(lines[3].contains(",Quarterly,"));
    }
}
