//! Group-by views over registry records.
//!
//! Aggregates are derived on read and never persisted. Every view follows
//! the same rules:
//!
//! - a record lands in at most one bucket per dimension, and records with a
//!   blank key for that dimension land in none (they still count toward
//!   [`AggregateReport::unfiltered_total`]);
//! - `active_count` counts records whose status is active;
//! - `unique_locations` holds normalized slot addresses, so one hall with
//!   twenty machines counts once;
//! - buckets are sorted by `total` descending, then key ascending, and
//!   truncation to the top N happens only after the full sort.
//!
//! The `"București"` bucket additionally carries per-sector sub-aggregates.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geography::{classify_city, classify_county, normalize_address, normalize_county};
use crate::slots::OperatorSlotRecord;

/// Attribute used to group records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Company,
    Brand,
    County,
    City,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Company,
        Dimension::Brand,
        Dimension::County,
        Dimension::City,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Company => "company",
            Dimension::Brand => "brand",
            Dimension::County => "county",
            Dimension::City => "city",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "company" => Ok(Dimension::Company),
            "brand" => Ok(Dimension::Brand),
            "county" => Ok(Dimension::County),
            "city" => Ok(Dimension::City),
            other => Err(format!(
                "unknown dimension \"{other}\"; expected company, brand, county or city"
            )),
        }
    }
}

/// One bucket of a group-by view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeographicAggregate {
    pub key: String,
    pub total: u64,
    pub active_count: u64,
    pub unique_locations: BTreeSet<String>,
    /// Counties for company/brand buckets, cities for county buckets,
    /// sectors for the Bucharest bucket.
    pub unique_sub_regions: BTreeSet<String>,
    /// Per-sector drill-down; only populated on the Bucharest bucket.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<GeographicAggregate>,
}

/// All four views folded in one pass over the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateViews {
    pub unfiltered_total: u64,
    pub by_company: Vec<GeographicAggregate>,
    pub by_brand: Vec<GeographicAggregate>,
    pub by_county: Vec<GeographicAggregate>,
    pub by_city: Vec<GeographicAggregate>,
}

impl AggregateViews {
    #[must_use]
    pub fn view(&self, dimension: Dimension) -> &[GeographicAggregate] {
        match dimension {
            Dimension::Company => &self.by_company,
            Dimension::Brand => &self.by_brand,
            Dimension::County => &self.by_county,
            Dimension::City => &self.by_city,
        }
    }
}

/// A single view plus the context a dashboard needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub dimension: Dimension,
    /// Every record fed in, including those without a key for `dimension`.
    pub unfiltered_total: u64,
    /// Records that landed in some bucket.
    pub bucketed_total: u64,
    /// Number of buckets before truncation.
    pub bucket_count: usize,
    pub buckets: Vec<GeographicAggregate>,
}

/// Group `records` by `dimension`.
pub fn aggregate<'a, I>(records: I, dimension: Dimension) -> Vec<GeographicAggregate>
where
    I: IntoIterator<Item = &'a OperatorSlotRecord>,
{
    let mut fold = DimensionFold::default();
    for record in records {
        fold.add(record, dimension);
    }
    fold.finish()
}

/// Group `records` by every dimension in a single pass.
pub fn aggregate_all<'a, I>(records: I) -> AggregateViews
where
    I: IntoIterator<Item = &'a OperatorSlotRecord>,
{
    let mut company = DimensionFold::default();
    let mut brand = DimensionFold::default();
    let mut county = DimensionFold::default();
    let mut city = DimensionFold::default();
    let mut unfiltered_total = 0u64;

    for record in records {
        unfiltered_total += 1;
        company.add(record, Dimension::Company);
        brand.add(record, Dimension::Brand);
        county.add(record, Dimension::County);
        city.add(record, Dimension::City);
    }

    AggregateViews {
        unfiltered_total,
        by_company: company.finish(),
        by_brand: brand.finish(),
        by_county: county.finish(),
        by_city: city.finish(),
    }
}

/// Group `records` by `dimension` and keep the `top` largest buckets.
pub fn report<'a, I>(records: I, dimension: Dimension, top: Option<usize>) -> AggregateReport
where
    I: IntoIterator<Item = &'a OperatorSlotRecord>,
{
    let mut fold = DimensionFold::default();
    let mut unfiltered_total = 0u64;
    for record in records {
        unfiltered_total += 1;
        fold.add(record, dimension);
    }
    let buckets = fold.finish();
    let bucketed_total = buckets.iter().map(|b| b.total).sum();
    let bucket_count = buckets.len();

    AggregateReport {
        dimension,
        unfiltered_total,
        bucketed_total,
        bucket_count,
        buckets: match top {
            Some(n) => top_n(buckets, n),
            None => buckets,
        },
    }
}

/// Keep the first `n` buckets of an already sorted view.
#[must_use]
pub fn top_n(mut buckets: Vec<GeographicAggregate>, n: usize) -> Vec<GeographicAggregate> {
    buckets.truncate(n);
    buckets
}

// ---------------------------------------------------------------------------
// Folding
// ---------------------------------------------------------------------------

struct Resolved {
    key: String,
    sub_region: Option<String>,
    sector: Option<String>,
}

fn resolve(record: &OperatorSlotRecord, dimension: Dimension) -> Option<Resolved> {
    match dimension {
        Dimension::Company => owner_key(&record.company_name, record),
        Dimension::Brand => record
            .brand_name
            .as_deref()
            .and_then(|brand| owner_key(brand, record)),
        Dimension::County => {
            let county = classify_county(&record.county);
            if county.is_empty() {
                return None;
            }
            if county.is_bucharest() {
                let sector = county
                    .sub_region
                    .or_else(|| classify_city(&record.city).sub_region);
                return Some(Resolved {
                    key: county.key,
                    sub_region: sector.clone(),
                    sector,
                });
            }
            let city = classify_city(&record.city);
            Some(Resolved {
                key: county.key,
                sub_region: (!city.is_empty()).then_some(city.key),
                sector: None,
            })
        }
        Dimension::City => {
            let city = classify_city(&record.city);
            if city.is_empty() {
                return None;
            }
            let sector = if city.is_bucharest() {
                city.sub_region
                    .or_else(|| classify_county(&record.county).sub_region)
            } else {
                None
            };
            Some(Resolved {
                key: city.key,
                sub_region: sector.clone(),
                sector,
            })
        }
    }
}

fn owner_key(raw: &str, record: &OperatorSlotRecord) -> Option<Resolved> {
    let key = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        return None;
    }
    let county = normalize_county(&record.county);
    Some(Resolved {
        key,
        sub_region: (!county.is_empty()).then_some(county),
        sector: None,
    })
}

#[derive(Default)]
struct Bucket {
    total: u64,
    active_count: u64,
    locations: HashSet<String>,
    sub_regions: HashSet<String>,
    sectors: HashMap<String, Bucket>,
}

impl Bucket {
    fn add(&mut self, record: &OperatorSlotRecord, location: Option<&String>) {
        self.total += 1;
        if record.is_active() {
            self.active_count += 1;
        }
        if let Some(location) = location {
            self.locations.insert(location.clone());
        }
    }

    fn finish(self, key: String) -> GeographicAggregate {
        let sectors = sort_buckets(
            self.sectors
                .into_iter()
                .map(|(sector, bucket)| bucket.finish(sector))
                .collect(),
        );
        GeographicAggregate {
            key,
            total: self.total,
            active_count: self.active_count,
            unique_locations: self.locations.into_iter().collect(),
            unique_sub_regions: self.sub_regions.into_iter().collect(),
            sectors,
        }
    }
}

#[derive(Default)]
struct DimensionFold {
    buckets: HashMap<String, Bucket>,
}

impl DimensionFold {
    fn add(&mut self, record: &OperatorSlotRecord, dimension: Dimension) {
        let Some(resolved) = resolve(record, dimension) else {
            return;
        };
        let location = record.slot_address.as_deref().and_then(normalize_address);

        let bucket = self.buckets.entry(resolved.key).or_default();
        bucket.add(record, location.as_ref());
        if let Some(sub_region) = resolved.sub_region {
            bucket.sub_regions.insert(sub_region);
        }
        if let Some(sector) = resolved.sector {
            bucket
                .sectors
                .entry(sector)
                .or_default()
                .add(record, location.as_ref());
        }
    }

    fn finish(self) -> Vec<GeographicAggregate> {
        sort_buckets(
            self.buckets
                .into_iter()
                .map(|(key, bucket)| bucket.finish(key))
                .collect(),
        )
    }
}

fn sort_buckets(mut buckets: Vec<GeographicAggregate>) -> Vec<GeographicAggregate> {
    buckets.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    buckets
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
