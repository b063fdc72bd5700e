//! Read-only report commands.

use onjn_core::{AggregateReport, AppConfig, Dimension, RecordStore, SlotFilter};
use onjn_db::{KeyCount, PgRecordStore};

/// Build the record filter, applying the operator's own footprint when
/// `own` is set.
///
/// # Errors
///
/// Returns an error if `own` is set but neither `ONJN_OWN_COMPANY` nor
/// `ONJN_OWN_BRAND` is configured.
pub(crate) fn build_filter(
    config: &AppConfig,
    county: Option<String>,
    city: Option<String>,
    company: Option<String>,
    brand: Option<String>,
    own: bool,
) -> anyhow::Result<SlotFilter> {
    let mut filter = SlotFilter {
        county,
        city,
        company,
        brand,
        ..SlotFilter::default()
    };
    if own {
        if config.own_company.is_none() && config.own_brand.is_none() {
            anyhow::bail!("--own requires ONJN_OWN_COMPANY or ONJN_OWN_BRAND to be set");
        }
        if config.own_company.is_some() {
            filter.company.clone_from(&config.own_company);
        }
        if config.own_brand.is_some() {
            filter.brand.clone_from(&config.own_brand);
        }
    }
    Ok(filter)
}

/// Group stored records by `dimension` and print the top buckets.
///
/// # Errors
///
/// Returns an error if the records cannot be loaded.
pub(crate) async fn run_report_aggregate(
    pool: &sqlx::PgPool,
    filter: &SlotFilter,
    dimension: Dimension,
    top: usize,
    json: bool,
) -> anyhow::Result<()> {
    let records = PgRecordStore::new(pool.clone()).query_all(filter).await?;
    if records.is_empty() {
        println!("no records match; run `sync registry` first");
        return Ok(());
    }

    let report = onjn_core::report(&records, dimension, Some(top.max(1)));
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Print totals and the largest groups.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_report_stats(pool: &sqlx::PgPool, top: i64) -> anyhow::Result<()> {
    let stats = onjn_db::query_stats(pool, chrono::Utc::now().date_naive(), top.max(1)).await?;
    println!(
        "total {} | active {} | expired {}",
        stats.total, stats.active, stats.expired
    );
    print_key_counts("COUNTY", &stats.by_county);
    print_key_counts("CITY", &stats.by_city);
    print_key_counts("BRAND", &stats.by_brand);
    Ok(())
}

fn print_key_counts(title: &str, rows: &[KeyCount]) {
    println!();
    println!("{title:<28}{:>8}{:>8}", "TOTAL", "ACTIVE");
    for row in rows {
        println!("{:<28}{:>8}{:>8}", truncate(&row.key, 27), row.total, row.active);
    }
}

pub(crate) fn print_report(report: &AggregateReport) {
    for line in render_report(report) {
        println!("{line}");
    }
}

/// Table lines for a report; Bucharest sectors are indented under their bucket.
fn render_report(report: &AggregateReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} records, {} in {} {} buckets (showing {})",
            report.unfiltered_total,
            report.bucketed_total,
            report.bucket_count,
            report.dimension,
            report.buckets.len()
        ),
        format!(
            "{:<32}{:>8}{:>8}{:>11}{:>9}",
            report.dimension.as_str().to_uppercase(),
            "TOTAL",
            "ACTIVE",
            "LOCATIONS",
            "REGIONS"
        ),
    ];
    for bucket in &report.buckets {
        lines.push(format!(
            "{:<32}{:>8}{:>8}{:>11}{:>9}",
            truncate(&bucket.key, 31),
            bucket.total,
            bucket.active_count,
            bucket.unique_locations.len(),
            bucket.unique_sub_regions.len()
        ));
        for sector in &bucket.sectors {
            lines.push(format!(
                "  {:<30}{:>8}{:>8}{:>11}",
                truncate(&sector.key, 29),
                sector.total,
                sector.active_count,
                sector.unique_locations.len()
            ));
        }
    }
    lines
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        let mut short: String = value.chars().take(max_chars.saturating_sub(3)).collect();
        short.push_str("...");
        short
    } else {
        value.to_string()
    }
}
