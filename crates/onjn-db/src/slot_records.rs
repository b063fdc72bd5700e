//! Database operations for the `slot_records` table.
//!
//! Alongside the published county and city, every row stores the canonical
//! `county_key` / `city_key` and the Bucharest `sector` so filters and SQL
//! group-bys agree with the in-memory aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use onjn_core::{
    classify_city, classify_county, OperatorSlotRecord, SlotFilter, SlotStatus, UpsertOutcome,
};
use sqlx::PgPool;

use crate::DbError;

const SELECT_COLUMNS: &str = "id, serial_number, equipment_type, company_name, brand_name, \
     county, city, county_key, city_key, sector, slot_address, license_number, \
     authorization_date, expiry_date, status, last_scraped_at, created_at, updated_at";

/// A row from the `slot_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SlotRecordRow {
    pub id: i64,
    pub serial_number: String,
    pub equipment_type: String,
    pub company_name: String,
    pub brand_name: Option<String>,
    pub county: String,
    pub city: String,
    pub county_key: String,
    pub city_key: String,
    pub sector: Option<String>,
    pub slot_address: Option<String>,
    pub license_number: Option<String>,
    pub authorization_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: String,
    pub last_scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlotRecordRow {
    /// Converts the row back into the domain record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if the stored status is not one of
    /// the known values (the table's `CHECK` constraint should prevent this).
    pub fn into_record(self) -> Result<OperatorSlotRecord, DbError> {
        let status = self
            .status
            .parse::<SlotStatus>()
            .map_err(|e| DbError::InvalidRow {
                serial_number: self.serial_number.clone(),
                reason: e.to_string(),
            })?;
        Ok(OperatorSlotRecord {
            serial_number: self.serial_number,
            equipment_type: self.equipment_type,
            company_name: self.company_name,
            brand_name: self.brand_name,
            county: self.county,
            city: self.city,
            slot_address: self.slot_address,
            license_number: self.license_number,
            authorization_date: self.authorization_date,
            expiry_date: self.expiry_date,
            status,
            last_scraped_at: self.last_scraped_at,
        })
    }
}

/// Inserts a record or overwrites the existing row with the same
/// `serial_number`.
///
/// Uses `RETURNING (xmax = 0)` to tell inserts from updates in a single
/// round-trip.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_slot_record(
    pool: &PgPool,
    record: &OperatorSlotRecord,
) -> Result<UpsertOutcome, DbError> {
    let county = classify_county(&record.county);
    let city = classify_city(&record.city);
    // Bucharest rows carry their sector in whichever column named it.
    let sector = county.sub_region.clone().or_else(|| city.sub_region.clone());

    let is_new = sqlx::query_scalar::<_, bool>(
        "INSERT INTO slot_records \
             (serial_number, equipment_type, company_name, brand_name, county, city, \
              county_key, city_key, sector, slot_address, license_number, \
              authorization_date, expiry_date, status, last_scraped_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (serial_number) DO UPDATE SET \
             equipment_type     = EXCLUDED.equipment_type, \
             company_name       = EXCLUDED.company_name, \
             brand_name         = EXCLUDED.brand_name, \
             county             = EXCLUDED.county, \
             city               = EXCLUDED.city, \
             county_key         = EXCLUDED.county_key, \
             city_key           = EXCLUDED.city_key, \
             sector             = EXCLUDED.sector, \
             slot_address       = EXCLUDED.slot_address, \
             license_number     = EXCLUDED.license_number, \
             authorization_date = EXCLUDED.authorization_date, \
             expiry_date        = EXCLUDED.expiry_date, \
             status             = EXCLUDED.status, \
             last_scraped_at    = EXCLUDED.last_scraped_at, \
             updated_at         = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(&record.serial_number)
    .bind(&record.equipment_type)
    .bind(&record.company_name)
    .bind(&record.brand_name)
    .bind(&record.county)
    .bind(&record.city)
    .bind(&county.key)
    .bind(&city.key)
    .bind(sector)
    .bind(&record.slot_address)
    .bind(&record.license_number)
    .bind(record.authorization_date)
    .bind(record.expiry_date)
    .bind(record.status.as_str())
    .bind(record.last_scraped_at)
    .fetch_one(pool)
    .await?;

    Ok(UpsertOutcome::from_is_new(is_new))
}

/// Lists records matching `filter`, ordered by `serial_number`.
///
/// County and city filters compare against the stored canonical keys.
/// Without a `limit` every matching row is returned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_slot_records(
    pool: &PgPool,
    filter: &SlotFilter,
) -> Result<Vec<SlotRecordRow>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} \
         FROM slot_records \
         WHERE ($1::text IS NULL OR county_key = $1) \
           AND ($2::text IS NULL OR city_key = $2) \
           AND ($3::text IS NULL OR company_name = $3) \
           AND ($4::text IS NULL OR brand_name = $4) \
           AND ($5::text IS NULL OR status = $5) \
         ORDER BY serial_number \
         LIMIT $6"
    );
    let rows = sqlx::query_as::<_, SlotRecordRow>(&sql)
        .bind(filter.county_key())
        .bind(filter.city_key())
        .bind(filter.company())
        .bind(filter.brand())
        .bind(filter.status.map(SlotStatus::as_str))
        .bind(filter.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches a single record by serial number.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has that serial, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_slot_record(pool: &PgPool, serial_number: &str) -> Result<SlotRecordRow, DbError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM slot_records WHERE serial_number = $1");
    sqlx::query_as::<_, SlotRecordRow>(&sql)
        .bind(serial_number)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Total number of stored records.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_slot_records(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM slot_records")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
