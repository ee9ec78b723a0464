use crate::columns::parse_date_token;
use crate::config::AnalysisConfig;
use crate::metrics::lacks_location;
use crate::row::Row;
use serde::Serialize;

const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub status: String,
    pub change: i64,
}

/// Meter states on the two most recent dates of a long-form export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MeterStatusSummary {
    pub dates: Vec<String>,
    pub latest_date: String,
    pub previous_date: Option<String>,
    pub latest: Vec<StatusCount>,
    pub previous: Vec<StatusCount>,
    pub changes: Vec<StatusChange>,
    pub total_latest: usize,
    pub total_previous: usize,
    /// Latest-date meters with a missing or zero coordinate.
    pub no_location: usize,
}

#[derive(Default)]
struct Tally(Vec<StatusCount>);

impl Tally {
    fn add(&mut self, status: &str) {
        match self.0.iter_mut().find(|c| c.status == status) {
            Some(entry) => entry.count += 1,
            None => self.0.push(StatusCount {
                status: status.to_string(),
                count: 1,
            }),
        }
    }

    fn get(&self, status: &str) -> usize {
        self.0
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count)
    }

    fn total(&self) -> usize {
        self.0.iter().map(|c| c.count).sum()
    }
}

/// Summarize meter states per date
///
/// Expects rows in the long form produced by the reshaper: one row per
/// meter and date, with the date token in the date column. Dates are ordered
/// by calendar date; tokens that are not `DD.MM.YYYY` sort after real dates.
///
/// # Arguments
/// * `rows` - Long-form meter rows
/// * `config` - Column names
///
/// # Returns
/// * `Option<MeterStatusSummary>` - `None` when no row carries a date
pub fn summarize_meter_status(rows: &[Row], config: &AnalysisConfig) -> Option<MeterStatusSummary> {
    let mut dates: Vec<String> = Vec::new();
    for row in rows {
        if let Some(date) = row.get_str(&config.date_column) {
            if !dates.iter().any(|d| *d == *date) {
                dates.push(date.into_owned());
            }
        }
    }
    dates.sort_by_cached_key(|token| {
        let date = parse_date_token(token);
        (date.is_none(), date, token.clone())
    });

    let latest_date = dates.last()?.clone();
    let previous_date = dates.len().checked_sub(2).map(|i| dates[i].clone());

    let mut latest = Tally::default();
    let mut previous = Tally::default();
    let mut no_location = 0;

    for row in rows {
        let Some(date) = row.get_str(&config.date_column) else {
            continue;
        };
        let status = row
            .get_str(&config.state_column)
            .filter(|s| !s.is_empty())
            .map_or_else(|| UNKNOWN_STATUS.to_string(), |s| s.into_owned());

        if *date == *latest_date {
            latest.add(&status);
            if lacks_location(row, &config.latitude_column, &config.longitude_column) {
                no_location += 1;
            }
        } else if previous_date.as_deref() == Some(&*date) {
            previous.add(&status);
        }
    }

    let mut changes: Vec<StatusChange> = Vec::new();
    for status in latest.0.iter().chain(previous.0.iter()).map(|c| &c.status) {
        if changes.iter().any(|c| c.status == *status) {
            continue;
        }
        changes.push(StatusChange {
            status: status.clone(),
            change: latest.get(status) as i64 - previous.get(status) as i64,
        });
    }

    Some(MeterStatusSummary {
        total_latest: latest.total(),
        total_previous: previous.total(),
        latest: latest.0,
        previous: previous.0,
        changes,
        no_location,
        latest_date,
        previous_date,
        dates,
    })
}
