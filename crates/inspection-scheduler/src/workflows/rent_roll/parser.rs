use super::normalizer::display_header;
use super::schema::{
    find_descriptor, inspection_number, parse_date, CellValue, FieldDescriptor, FieldKind,
    FieldRole, NO_DATA, TENANT_FIELDS, TOTAL_ROW, UNIT_FIELDS,
};
use super::{ImportMode, RentRollImportError};
use crate::workflows::inspections::{ScheduleEvent, TenantRecord, Unit};
use std::io::Read;
use tracing::debug;

#[derive(Debug)]
enum Column {
    Schema(&'static FieldDescriptor),
    Inspection,
    Passthrough(String),
}

pub(crate) fn parse_units<R: Read>(
    reader: R,
    mode: ImportMode,
) -> Result<Vec<Unit>, RentRollImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = classify_columns(headers.iter(), mode)?;

    let mut units = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let line = record.position().map_or(row as u64 + 1, |position| position.line());

        if record.len() > columns.len() {
            return Err(RentRollImportError::Malformed {
                line,
                found: record.len(),
                expected: columns.len(),
            });
        }

        if record.iter().all(|cell| cell.trim().is_empty() || cell == NO_DATA) {
            debug!(line, "skipping empty row");
            continue;
        }

        if record.get(0) == Some(TOTAL_ROW) {
            debug!(line, "skipping totals row");
            continue;
        }

        units.push(parse_row(&record, &columns, row, line, mode)?);
    }

    debug!(count = units.len(), ?mode, "parsed rent roll");
    Ok(units)
}

fn classify_columns<'a, I>(headers: I, mode: ImportMode) -> Result<Vec<Column>, RentRollImportError>
where
    I: Iterator<Item = &'a str>,
{
    let columns = headers
        .map(|header| {
            if let Some(descriptor) = find_descriptor(UNIT_FIELDS, header) {
                return Ok(Column::Schema(descriptor));
            }
            if mode == ImportMode::Tenants {
                if let Some(descriptor) = find_descriptor(TENANT_FIELDS, header) {
                    return Ok(Column::Schema(descriptor));
                }
            }
            if mode.reads_inspections() && inspection_number(header).is_some() {
                return Ok(Column::Inspection);
            }
            if mode.is_strict() {
                return Err(RentRollImportError::UnexpectedColumn {
                    column: header.to_string(),
                });
            }
            Ok(Column::Passthrough(display_header(header)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for required in UNIT_FIELDS.iter().filter(|descriptor| !descriptor.optional) {
        let present = columns
            .iter()
            .any(|column| matches!(column, Column::Schema(d) if d.field == required.field));
        if !present {
            return Err(RentRollImportError::MissingColumn {
                column: required.header,
            });
        }
    }

    Ok(columns)
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &[Column],
    row: usize,
    line: u64,
    mode: ImportMode,
) -> Result<Unit, RentRollImportError> {
    let row_id = row.to_string();
    let mut unit = Unit::new(row_id.clone(), String::new());
    let mut tenant = TenantRecord {
        tenant_id: row_id,
        name: String::new(),
        phone: None,
        email: None,
    };

    for (position, column) in columns.iter().enumerate() {
        let cell = record.get(position).unwrap_or("").trim();
        match column {
            Column::Schema(descriptor) => {
                let Some(value) = parse_cell(descriptor, cell, line)? else {
                    continue;
                };
                match descriptor.role {
                    FieldRole::Unit => descriptor.field.assign_unit(&mut unit, value),
                    FieldRole::Tenant => descriptor.field.assign_tenant(&mut tenant, value),
                    FieldRole::Event => {}
                }
            }
            Column::Inspection => {
                if cell.is_empty() {
                    continue;
                }
                let date = parse_date(cell).ok_or_else(|| RentRollImportError::InvalidDate {
                    column: record_header(columns, position),
                    value: cell.to_string(),
                    line,
                })?;
                unit.events.push(ScheduleEvent::historical(date));
            }
            Column::Passthrough(header) => {
                if !cell.is_empty() {
                    unit.passthrough.push((header.clone(), cell.to_string()));
                }
            }
        }
    }

    if mode == ImportMode::Tenants {
        unit.tenants.push(tenant);
    }
    unit.events.sort_by_key(|event| event.date);
    Ok(unit)
}

/// Converts one cell according to its descriptor. Blank optional cells are `None`; blank
/// required text becomes the no-data marker.
fn parse_cell(
    descriptor: &FieldDescriptor,
    cell: &str,
    line: u64,
) -> Result<Option<CellValue>, RentRollImportError> {
    if cell.is_empty() {
        if descriptor.optional {
            return Ok(None);
        }
        return match descriptor.kind {
            FieldKind::Text => Ok(Some(CellValue::Text(NO_DATA.to_string()))),
            FieldKind::Number => Err(RentRollImportError::InvalidNumber {
                column: descriptor.header.to_string(),
                value: String::new(),
                line,
            }),
            FieldKind::Date => Err(RentRollImportError::InvalidDate {
                column: descriptor.header.to_string(),
                value: String::new(),
                line,
            }),
        };
    }

    let value = match descriptor.kind {
        FieldKind::Text => CellValue::Text(cell.to_string()),
        FieldKind::Number => cell
            .parse::<u32>()
            .map(CellValue::Number)
            .map_err(|_| RentRollImportError::InvalidNumber {
                column: descriptor.header.to_string(),
                value: cell.to_string(),
                line,
            })?,
        FieldKind::Date => parse_date(cell).map(CellValue::Date).ok_or_else(|| {
            RentRollImportError::InvalidDate {
                column: descriptor.header.to_string(),
                value: cell.to_string(),
                line,
            }
        })?,
    };
    Ok(Some(value))
}

fn record_header(columns: &[Column], position: usize) -> String {
    match columns.get(position) {
        Some(Column::Schema(descriptor)) => descriptor.header.to_string(),
        Some(Column::Passthrough(header)) => header.clone(),
        _ => format!("column {}", position + 1),
    }
}
