//! Persistence seam the sync job writes through.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::geography::{normalize_city, normalize_county};
use crate::slots::{OperatorSlotRecord, SlotStatus};

/// Whether an upsert created a new row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    #[must_use]
    pub fn from_is_new(is_new: bool) -> Self {
        if is_new {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        }
    }
}

/// Record filter for [`RecordStore::query_all`].
///
/// County and city are compared on their normalized keys, so `"Jud. Cluj"`
/// and `"CLUJ"` select the same rows. Company and brand match exactly after
/// trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlotFilter {
    pub county: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub brand: Option<String>,
    pub status: Option<SlotStatus>,
    pub limit: Option<i64>,
}

impl SlotFilter {
    /// Normalized county key to compare against, if any.
    #[must_use]
    pub fn county_key(&self) -> Option<String> {
        non_blank(self.county.as_deref()).map(normalize_county)
    }

    #[must_use]
    pub fn city_key(&self) -> Option<String> {
        non_blank(self.city.as_deref()).map(normalize_city)
    }

    #[must_use]
    pub fn company(&self) -> Option<&str> {
        non_blank(self.company.as_deref())
    }

    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        non_blank(self.brand.as_deref())
    }

    /// In-memory evaluation of the filter; the SQL store applies the same
    /// predicates in its `WHERE` clause.
    #[must_use]
    pub fn matches(&self, record: &OperatorSlotRecord) -> bool {
        if let Some(county) = self.county_key() {
            if normalize_county(&record.county) != county {
                return false;
            }
        }
        if let Some(city) = self.city_key() {
            if normalize_city(&record.city) != city {
                return false;
            }
        }
        if let Some(company) = self.company() {
            if record.company_name.trim() != company {
                return false;
            }
        }
        if let Some(brand) = self.brand() {
            if record.brand_name.as_deref().map(str::trim) != Some(brand) {
                return false;
            }
        }
        self.status.is_none_or(|s| s == record.status)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Idempotent keyed store of registry records.
///
/// `upsert` is keyed on `serial_number`: the first write inserts, every
/// later write with the same serial overwrites the stored fields.
pub trait RecordStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upsert(
        &self,
        record: &OperatorSlotRecord,
    ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send;

    fn query_all(
        &self,
        filter: &SlotFilter,
    ) -> impl Future<Output = Result<Vec<OperatorSlotRecord>, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn record(county: &str, city: &str, brand: Option<&str>) -> OperatorSlotRecord {
        OperatorSlotRecord {
            serial_number: "SN-1".to_string(),
            equipment_type: "slot".to_string(),
            company_name: " Acme Gaming SRL ".to_string(),
            brand_name: brand.map(str::to_string),
            county: county.to_string(),
            city: city.to_string(),
            slot_address: None,
            license_number: None,
            authorization_date: None,
            expiry_date: None,
            status: SlotStatus::Active,
            last_scraped_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SlotFilter::default().matches(&record("", "", None)));
    }

    #[test]
    fn county_filter_compares_normalized_keys() {
        let filter = SlotFilter {
            county: Some("jud. cluj".to_string()),
            ..SlotFilter::default()
        };
        assert!(filter.matches(&record("JUDEȚUL CLUJ", "Dej", None)));
        assert!(!filter.matches(&record("Alba", "Dej", None)));
    }

    #[test]
    fn sector_filter_selects_all_of_bucharest() {
        let filter = SlotFilter {
            city: Some("Bucuresti".to_string()),
            ..SlotFilter::default()
        };
        assert!(filter.matches(&record("Sector 1", "Sector 1", None)));
    }

    #[test]
    fn brand_filter_requires_a_brand() {
        let filter = SlotFilter {
            brand: Some("Lucky Star".to_string()),
            ..SlotFilter::default()
        };
        assert!(filter.matches(&record("Alba", "", Some("Lucky Star "))));
        assert!(!filter.matches(&record("Alba", "", None)));
    }

    #[test]
    fn company_filter_trims_stored_value() {
        let filter = SlotFilter {
            company: Some("Acme Gaming SRL".to_string()),
            status: Some(SlotStatus::Active),
            ..SlotFilter::default()
        };
        assert!(filter.matches(&record("Alba", "", None)));
    }

    #[test]
    fn blank_filter_values_are_ignored() {
        let filter = SlotFilter {
            county: Some("  ".to_string()),
            ..SlotFilter::default()
        };
        assert!(filter.matches(&record("Alba", "", None)));
    }

    #[test]
    fn outcome_from_is_new() {
        assert_eq!(UpsertOutcome::from_is_new(true), UpsertOutcome::Inserted);
        assert_eq!(UpsertOutcome::from_is_new(false), UpsertOutcome::Updated);
    }
}
