use crate::row::{CellValue, Row};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

lazy_static! {
    static ref DATE_TOKEN_REGEX: Regex = Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").unwrap();
    static ref SLASH_DATE_REGEX: Regex = Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap();
}

const DATE_SAMPLE_SIZE: usize = 10;
const STATUS_MAX_UNIQUE: usize = 10;

/// A column named `<label>DD.MM.YYYY`, e.g. `Meters 05.03.2024`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatedColumn {
    pub name: String,
    pub label: String,
    pub token: String,
}

impl DatedColumn {
    /// Calendar date of the token, if it names a real day.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date_token(&self.token)
    }
}

/// Whether `token` is exactly two digits, two digits, four digits, dot separated.
pub fn is_date_token(token: &str) -> bool {
    DATE_TOKEN_REGEX.is_match(token)
}

pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    if !is_date_token(token) {
        return None;
    }
    NaiveDate::parse_from_str(token, "%d.%m.%Y").ok()
}

/// Split `column` into `label` + date token, when it has that shape.
pub fn parse_dated(column: &str, label: &str) -> Option<DatedColumn> {
    let token = column.strip_prefix(label)?;
    if !is_date_token(token) {
        return None;
    }
    Some(DatedColumn {
        name: column.to_string(),
        label: label.to_string(),
        token: token.to_string(),
    })
}

/// All columns of the `label` family, in column order.
pub fn dated_columns<S: AsRef<str>>(columns: &[S], label: &str) -> Vec<DatedColumn> {
    columns
        .iter()
        .filter_map(|c| parse_dated(c.as_ref(), label))
        .collect()
}

/// What a column appears to hold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnKind {
    Location,
    Date,
    Number {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
    },
    Status,
    Text,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub unique_count: usize,
    pub non_null_count: usize,
}

/// Classify every column of the first row in a single pass
///
/// Rules are applied in order and the first match wins:
/// 1. name mentions `lat`, `long` or `coord` - location
/// 2. name mentions `data`/`date`, or a sample of values looks like a date - date
/// 3. every non-null value parses as a number - number, with min/max/mean
/// 4. at most ten distinct values and the name mentions `status` - status
/// 5. anything else - text
///
/// # Arguments
/// * `rows` - Rows to profile; the column set comes from the first row
///
/// # Returns
/// * `Vec<ColumnProfile>` - One profile per column, in column order
pub fn classify(rows: &[Row]) -> Vec<ColumnProfile> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    first
        .keys()
        .map(|name| {
            let values: Vec<&CellValue> = rows
                .iter()
                .filter_map(|row| row.get(name))
                .filter(|v| !matches!(v, CellValue::Null))
                .collect();
            let unique: HashSet<String> = values
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.into_owned()))
                .collect();

            ColumnProfile {
                name: name.to_string(),
                kind: kind_of(name, &values, unique.len()),
                unique_count: unique.len(),
                non_null_count: values.len(),
            }
        })
        .collect()
}

fn kind_of(name: &str, values: &[&CellValue], unique_count: usize) -> ColumnKind {
    let lower = name.to_lowercase();

    if lower.contains("lat") || lower.contains("long") || lower.contains("coord") {
        return ColumnKind::Location;
    }
    if lower.contains("data") || lower.contains("date") || looks_like_dates(values) {
        return ColumnKind::Date;
    }

    let numbers: Option<Vec<f64>> = values.iter().map(|v| numeric(v)).collect();
    if let Some(numbers) = numbers {
        let (min, max, mean) = if numbers.is_empty() {
            (None, None, None)
        } else {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            (Some(min), Some(max), Some(mean))
        };
        return ColumnKind::Number { min, max, mean };
    }

    if unique_count <= STATUS_MAX_UNIQUE && lower.contains("status") {
        return ColumnKind::Status;
    }
    ColumnKind::Text
}

fn looks_like_dates(values: &[&CellValue]) -> bool {
    values.iter().take(DATE_SAMPLE_SIZE).any(|v| match v {
        CellValue::Date(_) => true,
        CellValue::Text(s) => {
            SLASH_DATE_REGEX.is_match(s)
                || is_date_token(s)
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        }
        _ => false,
    })
}

fn numeric(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
            }
        }
        _ => None,
    }
}

/// Rows whose `column` value lies more than two standard deviations from the mean.
///
/// Non-numeric and missing values are ignored, both for the statistics and
/// for the result.
pub fn detect_anomalies<'a>(rows: &'a [Row], column: &str) -> Vec<&'a Row> {
    let values: Vec<(&Row, f64)> = rows
        .iter()
        .filter_map(|row| row.get(column).and_then(numeric).map(|n| (row, n)))
        .collect();
    if values.is_empty() {
        return Vec::new();
    }

    let count = values.len() as f64;
    let mean = values.iter().map(|(_, n)| n).sum::<f64>() / count;
    let variance = values.iter().map(|(_, n)| (n - mean).powi(2)).sum::<f64>() / count;
    let threshold = 2.0 * variance.sqrt();

    values
        .into_iter()
        .filter(|(_, n)| (n - mean).abs() > threshold)
        .map(|(row, _)| row)
        .collect()
}
