//! Wire types for the registry's paged JSON endpoint.
//!
//! ## Observed shape
//!
//! `GET /api/slots?page=N&per_page=M` returns
//! `{"records": [...], "has_more": bool, "total_pages": int | null}`.
//!
//! Rows come from a scrape of the public ONJN tables, so every field is
//! optional and stringly typed. Older captures use camelCase keys
//! (`serialNumber`, `companyName`); both spellings are accepted. Dates
//! appear as `dd.mm.yyyy` or ISO `yyyy-mm-dd`. Status is the Romanian label
//! shown on the site (`"Activ"`, `"Scos din funcțiune"`, ...).

use serde::{Deserialize, Serialize};

/// One page returned by the registry.
///
/// Rows stay as JSON until [`crate::decode_row`] so a single row of the
/// wrong shape cannot reject the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryPage {
    #[serde(default)]
    pub records: Vec<serde_json::Value>,

    /// `false` on the last page. Absent on some captures; treated as `false`.
    #[serde(default)]
    pub has_more: bool,

    /// Total page count estimate; `null` while the registry is still counting.
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// A registry row before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSlotRecord {
    #[serde(default, alias = "serialNumber", alias = "serie")]
    pub serial_number: Option<String>,

    #[serde(default, alias = "equipmentType", alias = "tip")]
    pub equipment_type: Option<String>,

    #[serde(default, alias = "companyName", alias = "operator")]
    pub company_name: Option<String>,

    #[serde(default, alias = "brandName", alias = "brand")]
    pub brand_name: Option<String>,

    #[serde(default, alias = "judet")]
    pub county: Option<String>,

    #[serde(default, alias = "localitate")]
    pub city: Option<String>,

    #[serde(default, alias = "slotAddress", alias = "adresa")]
    pub slot_address: Option<String>,

    #[serde(default, alias = "licenseNumber", alias = "licenta")]
    pub license_number: Option<String>,

    #[serde(default, alias = "authorizationDate")]
    pub authorization_date: Option<String>,

    #[serde(default, alias = "expiryDate")]
    pub expiry_date: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}
