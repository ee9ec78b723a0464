use crate::columns::dated_columns;
use crate::config::AnalysisConfig;
use crate::row::{header, CellValue, Row};
use log::info;
use serde::Serialize;

/// Which export layout the column names revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Per-meter `Status <date>` / `DCU <date>` pairs. Reshaped to long form.
    MeterStatusWide,
    /// Per-DCU `Meters <date>` counts. Kept wide for the load analysis.
    DcuLoadWide,
    /// No dated family recognized.
    Flat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reshaped {
    pub layout: Layout,
    pub rows: Vec<Row>,
}

/// Work out the layout from column names alone.
pub fn detect_layout(columns: &[String], config: &AnalysisConfig) -> Layout {
    let states = dated_columns(columns, &config.state_prefix);
    let groups = dated_columns(columns, &config.group_prefix);

    if !states.is_empty() && !groups.is_empty() {
        Layout::MeterStatusWide
    } else if !dated_columns(columns, &config.reading_prefix).is_empty() {
        Layout::DcuLoadWide
    } else {
        Layout::Flat
    }
}

/// Normalize a wide export
///
/// When the first row carries both the state-at-date and group-at-date
/// families, every (row, state date) pair becomes one long-form row with
/// the meter id, coordinates, state, group and the date token. N rows and D
/// state dates give exactly N×D rows, blank states included.
///
/// The meter-count family and unrecognized layouts pass through untouched.
/// Values are never inspected, and nothing here fails.
///
/// # Arguments
/// * `rows` - Rows from the parser or the spreadsheet extractor
/// * `config` - Column names and dated prefixes
///
/// # Returns
/// * `Reshaped` - The layout that was detected and the resulting rows
pub fn reshape(rows: Vec<Row>, config: &AnalysisConfig) -> Reshaped {
    let columns = header(&rows);
    let layout = detect_layout(&columns, config);

    match layout {
        Layout::MeterStatusWide => {
            let states = dated_columns(&columns, &config.state_prefix);
            info!("Detected wide meter layout - reshaping {} dates", states.len());

            let mut long = Vec::with_capacity(rows.len() * states.len());
            for state in &states {
                let group_column = format!("{}{}", config.group_prefix, state.token);
                for row in &rows {
                    long.push(long_row(row, &state.name, &group_column, &state.token, config));
                }
            }

            info!("Reshaped {} rows into {} records", rows.len(), long.len());
            Reshaped { layout, rows: long }
        }
        Layout::DcuLoadWide => {
            info!("Detected wide DCU layout - keeping {} rows wide", rows.len());
            Reshaped { layout, rows }
        }
        Layout::Flat => {
            info!("No dated columns detected - no reshape needed");
            Reshaped { layout, rows }
        }
    }
}

fn long_row(
    row: &Row,
    state_column: &str,
    group_column: &str,
    token: &str,
    config: &AnalysisConfig,
) -> Row {
    let copy = |key: &str| row.get(key).cloned().unwrap_or(CellValue::Null);

    let mut out = Row::with_capacity(6);
    out.insert(config.meter_column.as_str(), copy(&config.meter_column));
    out.insert(config.latitude_column.as_str(), copy(&config.latitude_column));
    out.insert(config.longitude_column.as_str(), copy(&config.longitude_column));
    out.insert(config.state_column.as_str(), copy(state_column));
    out.insert(config.entity_column.as_str(), copy(group_column));
    out.insert(config.date_column.as_str(), CellValue::text(token));
    out
}
