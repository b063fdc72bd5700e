//! Validation from raw registry rows to [`OperatorSlotRecord`].
//!
//! County and city are stored as published (trimmed); canonical keys are
//! derived by `onjn_core::geography` wherever grouping happens.

use chrono::{DateTime, NaiveDate, Utc};
use onjn_core::{OperatorSlotRecord, RecordError, SlotStatus};

use crate::error::RegistryError;
use crate::types::RawSlotRecord;

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Validates a raw row and stamps it with `scraped_at`.
///
/// # Errors
///
/// - [`RecordError::MissingField`] when the serial number, company or
///   status is blank.
/// - [`RecordError::UnknownStatus`] for an unrecognized status label.
/// - [`RecordError::InvalidDate`] for a present but unparseable date.
pub fn normalize_record(
    raw: RawSlotRecord,
    scraped_at: DateTime<Utc>,
) -> Result<OperatorSlotRecord, RecordError> {
    let serial_number = required(raw.serial_number, "serial_number")?;
    let company_name = required(raw.company_name, "company_name")?;
    let status = required(raw.status, "status")?.parse::<SlotStatus>()?;

    Ok(OperatorSlotRecord {
        serial_number,
        equipment_type: optional(raw.equipment_type).unwrap_or_default(),
        company_name,
        brand_name: optional(raw.brand_name),
        county: optional(raw.county).unwrap_or_default(),
        city: optional(raw.city).unwrap_or_default(),
        slot_address: optional(raw.slot_address),
        license_number: optional(raw.license_number),
        authorization_date: parse_date(raw.authorization_date, "authorization_date")?,
        expiry_date: parse_date(raw.expiry_date, "expiry_date")?,
        status,
        last_scraped_at: scraped_at,
    })
}

/// Decodes one row as delivered by a page or snapshot and validates it.
///
/// A row with the wrong shape (say a numeric serial or a nested object
/// where text is expected) fails on its own; the rows around it are
/// unaffected.
///
/// # Errors
///
/// Returns [`RegistryError::Record`] carrying the row's serial when one
/// can be read, wrapping either [`RecordError::Malformed`] or the
/// [`normalize_record`] failure.
pub fn decode_row(
    row: serde_json::Value,
    scraped_at: DateTime<Utc>,
) -> Result<OperatorSlotRecord, RegistryError> {
    let serial = row_serial(&row);
    let raw = serde_json::from_value::<RawSlotRecord>(row).map_err(|e| RegistryError::Record {
        serial: serial.clone(),
        source: RecordError::Malformed(e.to_string()),
    })?;
    normalize_record(raw, scraped_at).map_err(|source| RegistryError::Record { serial, source })
}

/// Best-effort serial for log lines, whatever its JSON type.
fn row_serial(row: &serde_json::Value) -> Option<String> {
    ["serial_number", "serialNumber", "serie"]
        .iter()
        .find_map(|key| row.get(key))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

/// Trims and collapses whitespace; blank becomes `None`.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RecordError> {
    optional(value).ok_or(RecordError::MissingField(field))
}

fn parse_date(value: Option<String>, field: &'static str) -> Result<Option<NaiveDate>, RecordError> {
    let Some(value) = optional(value) else {
        return Ok(None);
    };
    // Some captures carry a time component ("2024-03-01T00:00:00").
    let date_part = value.split(['T', ' ']).next().unwrap_or(&value);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .map(Some)
        .ok_or(RecordError::InvalidDate { field, value })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
