//! Summary counts over `slot_records`, computed in SQL on the stored
//! canonical keys.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// Bucket size of one `GROUP BY` in [`SlotStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct KeyCount {
    pub key: String,
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStats {
    pub total: i64,
    pub active: i64,
    /// Records whose `expiry_date` is strictly before the reference day.
    pub expired: i64,
    pub by_county: Vec<KeyCount>,
    pub by_city: Vec<KeyCount>,
    pub by_brand: Vec<KeyCount>,
}

#[derive(sqlx::FromRow)]
struct Totals {
    total: i64,
    active: i64,
    expired: i64,
}

/// Totals plus the `top` largest counties, cities and brands.
///
/// Groups are ordered by total descending, then key ascending; blank keys
/// are left out of the groups but counted in the totals.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn query_stats(pool: &PgPool, today: NaiveDate, top: i64) -> Result<SlotStats, DbError> {
    let totals = sqlx::query_as::<_, Totals>(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'active') AS active, \
                COUNT(*) FILTER (WHERE expiry_date < $1) AS expired \
         FROM slot_records",
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(SlotStats {
        total: totals.total,
        active: totals.active,
        expired: totals.expired,
        by_county: group_counts(pool, "county_key", top).await?,
        by_city: group_counts(pool, "city_key", top).await?,
        by_brand: group_counts(pool, "brand_name", top).await?,
    })
}

/// `column` is always one of the fixed names above, never user input.
async fn group_counts(pool: &PgPool, column: &str, top: i64) -> Result<Vec<KeyCount>, DbError> {
    let sql = format!(
        "SELECT {column} AS key, \
                COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'active') AS active \
         FROM slot_records \
         WHERE {column} IS NOT NULL AND {column} <> '' \
         GROUP BY {column} \
         ORDER BY total DESC, key ASC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, KeyCount>(&sql)
        .bind(top)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
