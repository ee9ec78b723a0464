//! Cell coercions shared by every derived metric.
//!
//! Exports are maintained by hand, so readings show up as `"812"`, `812.0`,
//! `"#N/D"`, `""` or free text. These helpers decide, in one place, what
//! counts as a reading, a rate or a coordinate.

use crate::row::{CellValue, Row};

/// Leading integer of `s`, the way spreadsheet-exported text is usually read.
///
/// Leading whitespace and one sign are accepted, then as many digits as are
/// present; anything after them is ignored (`"12.7"` is 12, `"40 meters"` is 40).
/// Returns `None` when no digit follows. A run too long for `i64` saturates.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }

    // over-long digit runs saturate instead of failing
    let magnitude: i64 = rest[..end].parse().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Integer reading of a cell, if it has one.
pub fn reading_value(value: Option<&CellValue>) -> Option<i64> {
    match value? {
        CellValue::Text(s) => parse_leading_int(s),
        CellValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        _ => None,
    }
}

/// Reading with every failure mapped to zero.
pub fn reading_or_zero(value: Option<&CellValue>) -> i64 {
    reading_value(value).unwrap_or(0)
}

/// Whether a meter-count cell means "no meters reported"
///
/// A cell has no reading when it is absent, an empty string, the
/// not-available marker, an integer equal to zero, or not an integer at all.
///
/// # Examples
/// ```
/// use dcu_dashboard::metrics::is_no_reading;
/// use dcu_dashboard::row::CellValue;
///
/// assert!(is_no_reading(None, "#N/D"));
/// assert!(is_no_reading(Some(&CellValue::text("#N/D")), "#N/D"));
/// assert!(is_no_reading(Some(&CellValue::text("abc")), "#N/D"));
/// assert!(!is_no_reading(Some(&CellValue::text("5")), "#N/D"));
/// ```
pub fn is_no_reading(value: Option<&CellValue>, not_available: &str) -> bool {
    match value {
        None => true,
        Some(CellValue::Text(s)) if s.is_empty() || s == not_available => true,
        _ => reading_value(value).is_none_or(|n| n == 0),
    }
}

/// Collection rate as a percentage
///
/// Strips `%`, accepts a decimal comma and surrounding whitespace. Missing
/// cells, the not-available marker, infinities, NaN and anything else
/// unparseable give `None`.
///
/// # Examples
/// ```
/// use dcu_dashboard::metrics::parse_rate;
/// use dcu_dashboard::row::CellValue;
///
/// assert_eq!(parse_rate(Some(&CellValue::text("95%")), "#N/D"), Some(95.0));
/// assert_eq!(parse_rate(Some(&CellValue::text(" 94,5 ")), "#N/D"), Some(94.5));
/// assert_eq!(parse_rate(Some(&CellValue::text("#N/D")), "#N/D"), None);
/// ```
pub fn parse_rate(value: Option<&CellValue>, not_available: &str) -> Option<f64> {
    let rate = match value? {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => {
            if s.is_empty() || s == not_available {
                return None;
            }
            s.replace('%', "").replace(',', ".").trim().parse::<f64>().ok()?
        }
        _ => return None,
    };
    rate.is_finite().then_some(rate)
}

fn parse_coordinate(value: Option<&CellValue>) -> Option<f64> {
    let n = match value? {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Latitude/longitude of a row, when usable on a map
///
/// Both must parse, fall within [-90, 90] and [-180, 180], and neither may be
/// exactly zero: exports use 0 for "not surveyed".
pub fn coordinates(row: &Row, latitude: &str, longitude: &str) -> Option<(f64, f64)> {
    let lat = parse_coordinate(row.get(latitude))?;
    let long = parse_coordinate(row.get(longitude))?;

    let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&long);
    (in_range && lat != 0.0 && long != 0.0).then_some((lat, long))
}

/// Whether a row has no location at all: either coordinate missing, unparseable or zero.
pub fn lacks_location(row: &Row, latitude: &str, longitude: &str) -> bool {
    let lat = parse_coordinate(row.get(latitude));
    let long = parse_coordinate(row.get(longitude));
    !matches!((lat, long), (Some(a), Some(b)) if a != 0.0 && b != 0.0)
}
