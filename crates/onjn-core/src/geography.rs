//! Canonical county and city keys for registry records.
//!
//! The registry spells the same place many ways: `"JUDEȚUL CLUJ"`,
//! `"Jud. Cluj"`, `"CLUJ"`, with or without diacritics, with the legacy
//! cedilla `ş`/`ţ` or the correct comma-below `ș`/`ț`. Everything here is a
//! pure function that never fails; input it cannot make sense of comes back
//! trimmed and title-cased.
//!
//! ## Bucharest
//!
//! Bucharest is not part of any county and is split into six sectors. The
//! registry records it either as the city, as the "county", or as a bare
//! `"Sector N"`. Any value that mentions a sector or Bucharest collapses to
//! [`BUCHAREST`] for both dimensions, and the sector is kept separately as
//! the [`GeoKey::sub_region`] so aggregates can drill down without counting
//! a record twice at the top level.

/// Canonical key for Bucharest in both the county and the city dimension.
pub const BUCHAREST: &str = "București";

const COUNTY_PREFIXES: &[&str] = &["county of ", "judetul ", "judet ", "jud. ", "jud."];

const CITY_PREFIXES: &[&str] = &[
    "municipiul ",
    "municipiu ",
    "mun. ",
    "mun.",
    "orasul ",
    "oras ",
    "comuna ",
    "com. ",
    "satul ",
    "sat ",
];

/// A normalized geographic key plus the retained Bucharest sector, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKey {
    /// Canonical key; empty when the raw value was blank.
    pub key: String,
    /// Sector label (e.g. `"Sector 2"`) for Bucharest values that named one.
    pub sub_region: Option<String>,
}

impl GeoKey {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    #[must_use]
    pub fn is_bucharest(&self) -> bool {
        self.key == BUCHAREST
    }
}

/// Canonical county key for a raw registry value.
#[must_use]
pub fn normalize_county(raw: &str) -> String {
    classify_county(raw).key
}

/// Canonical city key for a raw registry value.
#[must_use]
pub fn normalize_city(raw: &str) -> String {
    classify_city(raw).key
}

#[must_use]
pub fn classify_county(raw: &str) -> GeoKey {
    classify(raw, COUNTY_PREFIXES)
}

#[must_use]
pub fn classify_city(raw: &str) -> GeoKey {
    classify(raw, CITY_PREFIXES)
}

/// Key used for the `unique_locations` sets: case, diacritics, punctuation
/// and spacing differences between two spellings of one address vanish.
///
/// Returns `None` for blank addresses.
#[must_use]
pub fn normalize_address(raw: &str) -> Option<String> {
    let spaced: String = raw
        .chars()
        .map(|c| if matches!(c, ',' | '.' | ';') { ' ' } else { c })
        .collect();
    let cleaned = collapse_whitespace(&spaced);
    if cleaned.is_empty() {
        None
    } else {
        Some(fold(&cleaned))
    }
}

/// Lowercases and strips diacritics, one output char per input char.
///
/// Keeping the mapping 1:1 lets callers match a prefix on the folded form
/// and cut the same number of chars from the original.
#[must_use]
pub fn fold(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'ă' | 'Ă' | 'â' | 'Â' | 'á' | 'Á' | 'à' | 'À' | 'ä' | 'Ä' => 'a',
        'î' | 'Î' | 'í' | 'Í' => 'i',
        'ș' | 'Ș' | 'ş' | 'Ş' => 's',
        'ț' | 'Ț' | 'ţ' | 'Ţ' => 't',
        'é' | 'É' | 'è' | 'È' => 'e',
        'ó' | 'Ó' | 'ö' | 'Ö' | 'ő' | 'Ő' => 'o',
        'ú' | 'Ú' | 'ü' | 'Ü' | 'ű' | 'Ű' => 'u',
        _ => c.to_lowercase().next().unwrap_or(c),
    }
}

fn classify(raw: &str, prefixes: &[&str]) -> GeoKey {
    let cleaned = collapse_whitespace(raw);
    if cleaned.is_empty() {
        return GeoKey {
            key: String::new(),
            sub_region: None,
        };
    }

    let folded = fold(&cleaned);
    if is_bucharest(&folded) {
        return GeoKey {
            key: BUCHAREST.to_string(),
            sub_region: sector_label(&cleaned, &folded),
        };
    }

    GeoKey {
        key: title_case(strip_prefixes(&cleaned, prefixes)),
        sub_region: None,
    }
}

fn is_bucharest(folded: &str) -> bool {
    folded.contains("sector") || folded.contains("bucuresti") || folded.contains("bucharest")
}

/// `"Sector N"` when the value names sector 1-6, the cleaned raw value when
/// it mentions a sector without a usable number, `None` otherwise.
fn sector_label(cleaned: &str, folded: &str) -> Option<String> {
    let idx = folded.find("sector")?;
    let after = &folded[idx + "sector".len()..];
    let after = after.strip_prefix("ul").unwrap_or(after);
    let after = after.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ':' | '-' | '#'));
    let after = after.strip_prefix("nr").unwrap_or(after);
    let rest = after.trim_start_matches(|c: char| c.is_whitespace() || c == '.');

    let mut digits = rest.chars().take_while(char::is_ascii_digit);
    match (digits.next(), digits.next()) {
        (Some(d @ '1'..='6'), None) => Some(format!("Sector {d}")),
        _ => Some(cleaned.to_string()),
    }
}

fn strip_prefixes<'a>(cleaned: &'a str, prefixes: &[&str]) -> &'a str {
    let mut rest = cleaned;
    'outer: loop {
        let folded = fold(rest);
        for prefix in prefixes {
            if !folded.starts_with(prefix) {
                continue;
            }
            let cut = rest
                .char_indices()
                .nth(prefix.chars().count())
                .map_or(rest.len(), |(i, _)| i);
            let remainder = rest[cut..].trim_start();
            if remainder.is_empty() {
                break 'outer;
            }
            rest = remainder;
            continue 'outer;
        }
        break;
    }
    rest
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title case with comma-below `ș`/`ț` as the canonical diacritics.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        let c = match c {
            'ş' => 'ș',
            'Ş' => 'Ș',
            'ţ' => 'ț',
            'Ţ' => 'Ț',
            other => other,
        };
        if at_word_start {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => out.push(u),
                _ => out.push(c),
            }
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = matches!(c, ' ' | '-' | '.' | '(' | '/');
    }
    out
}

#[cfg(test)]
#[path = "geography_test.rs"]
mod tests;
