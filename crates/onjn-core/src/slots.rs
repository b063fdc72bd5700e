//! Registry equipment records.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geography::fold;

/// Licensing state of a piece of equipment as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Active,
    Decommissioned,
    Suspended,
}

impl SlotStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Active => "active",
            SlotStatus::Decommissioned => "decommissioned",
            SlotStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = RecordError;

    /// Accepts the English labels used internally as well as the Romanian
    /// labels the registry publishes, ignoring case and diacritics.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = fold(s.trim());
        match folded.as_str() {
            "active" | "activ" | "activa" | "autorizat" | "in exploatare" => Ok(SlotStatus::Active),
            "decommissioned" | "inactiv" | "inactiva" | "scos din functiune" | "casat"
            | "retras" => Ok(SlotStatus::Decommissioned),
            "suspended" | "suspendat" | "suspendata" => Ok(SlotStatus::Suspended),
            _ => Err(RecordError::UnknownStatus(s.to_string())),
        }
    }
}

/// One registry entry. `serial_number` is the natural key; a re-sync
/// overwrites every other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSlotRecord {
    pub serial_number: String,
    pub equipment_type: String,
    pub company_name: String,
    pub brand_name: Option<String>,
    pub county: String,
    pub city: String,
    pub slot_address: Option<String>,
    pub license_number: Option<String>,
    pub authorization_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: SlotStatus,
    pub last_scraped_at: DateTime<Utc>,
}

impl OperatorSlotRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SlotStatus::Active
    }

    /// `true` when the authorization has an expiry date strictly before `today`.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < today)
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown equipment status \"{0}\"")]
    UnknownStatus(String),
    #[error("unparseable date \"{value}\" in field `{field}`")]
    InvalidDate { field: &'static str, value: String },
    #[error("row does not match the registry shape: {0}")]
    Malformed(String),
}
