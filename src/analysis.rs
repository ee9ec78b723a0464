use crate::columns::{dated_columns, DatedColumn};
use crate::config::AnalysisConfig;
use crate::metrics::{coordinates, is_no_reading, parse_rate, reading_or_zero, reading_value};
use crate::row::{header, Row};
use log::info;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Indices into the record set of an [`Analysis`], in record order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection(Vec<usize>);

impl Selection {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    fn filter(records: &[Row], mut keep: impl FnMut(&Row) -> bool) -> Self {
        Selection(
            records
                .iter()
                .enumerate()
                .filter(|(_, row)| keep(row))
                .map(|(i, _)| i)
                .collect(),
        )
    }

    fn union(parts: &[&Selection]) -> Self {
        let mut all: Vec<usize> = parts.iter().flat_map(|s| s.0.iter().copied()).collect();
        all.sort_unstable();
        all.dedup();
        Selection(all)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusPartitions {
    pub operational: Selection,
    pub unreachable: Selection,
    pub unregistered: Selection,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoadPartitions {
    pub overloaded: Selection,
    pub underloaded: Selection,
    pub no_reading: Selection,
    pub operational_no_reading: Selection,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RateBands {
    pub with_rate: Selection,
    pub below_low: Selection,
    pub between: Selection,
    pub at_least_high: Selection,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityHistory {
    pub index: usize,
    pub id: Option<String>,
    pub average: f64,
    pub latest: i64,
    pub deviation: f64,
    pub deviation_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    /// One value per entry of `top_deviations`, same order.
    pub values: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnnotationGroup {
    pub name: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetersByStatus {
    pub operational: i64,
    pub unreachable: i64,
    pub unregistered: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AttentionCases {
    pub unreachable: Selection,
    pub unregistered: Selection,
    pub operational_no_reading: Selection,
    pub total: usize,
    /// Attention cases as a percentage of all entities.
    pub share: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionReason {
    Unregistered,
    Offline,
    OnlineWithoutMeters,
    Unidentified,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudyCase {
    pub index: usize,
    pub id: Option<String>,
    pub reason: AttentionReason,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InStudy {
    pub all: Selection,
    pub identified: Vec<StudyCase>,
    pub in_analysis: Vec<StudyCase>,
    pub awaiting_action: Vec<StudyCase>,
    pub solved: Vec<StudyCase>,
    /// In-study cases as a rounded percentage of attention cases.
    pub share: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateEntry {
    pub index: usize,
    pub id: Option<String>,
    pub rate: f64,
    pub meters: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapPoint {
    pub index: usize,
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub state: Option<String>,
}

/// Everything the dashboard shows, derived from one record set.
///
/// Every subset is a [`Selection`] over `records`; nothing is copied. The
/// whole value is rebuilt when the records change.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(serialize_with = "serialize_records")]
    records: Arc<[Row]>,
    pub total: usize,
    pub latest_column: Option<DatedColumn>,
    /// Reading date tokens, sorted.
    pub dates: Vec<String>,
    pub status: StatusPartitions,
    pub load: LoadPartitions,
    /// Present when the collection rate column exists.
    pub collection_rate: Option<RateBands>,
    pub history: Vec<EntityHistory>,
    pub top_deviations: Vec<EntityHistory>,
    pub trend: Vec<TrendPoint>,
    pub trend_average: i64,
    pub annotations: Vec<AnnotationGroup>,
    pub meters_by_status: MetersByStatus,
    pub attention: AttentionCases,
    pub in_study: InStudy,
    pub lowest_rates: Vec<RateEntry>,
    pub load_vs_rate: Vec<RateEntry>,
}

fn serialize_records<S: Serializer>(records: &Arc<[Row]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.iter())
}

/// Names accepted by [`Analysis::selection`].
pub const SUBSET_NAMES: &[&str] = &[
    "all",
    "online",
    "offline",
    "not-registered",
    "overloaded",
    "underloaded",
    "no-meters",
    "online-no-meters",
    "attention",
    "in-study",
    "below-95",
    "between-95-98",
    "above-98",
];

impl Analysis {
    pub fn records(&self) -> &[Row] {
        &self.records
    }

    pub fn rows<'a>(&'a self, selection: &'a Selection) -> impl Iterator<Item = &'a Row> + 'a {
        selection.indices().iter().map(|&i| &self.records[i])
    }

    /// Look a subset up by its dashboard name (see [`SUBSET_NAMES`]).
    pub fn selection(&self, name: &str) -> Option<Selection> {
        let rate = self.collection_rate.as_ref();
        let selection = match name {
            "all" => Selection((0..self.records.len()).collect()),
            "online" => self.status.operational.clone(),
            "offline" => self.status.unreachable.clone(),
            "not-registered" => self.status.unregistered.clone(),
            "overloaded" => self.load.overloaded.clone(),
            "underloaded" => self.load.underloaded.clone(),
            "no-meters" => self.load.no_reading.clone(),
            "online-no-meters" => self.load.operational_no_reading.clone(),
            "attention" => Selection::union(&[
                &self.attention.unreachable,
                &self.attention.unregistered,
                &self.attention.operational_no_reading,
            ]),
            "in-study" => self.in_study.all.clone(),
            "below-95" => rate.map(|r| r.below_low.clone()).unwrap_or_default(),
            "between-95-98" => rate.map(|r| r.between.clone()).unwrap_or_default(),
            "above-98" => rate.map(|r| r.at_least_high.clone()).unwrap_or_default(),
            _ => return None,
        };
        Some(selection)
    }

    /// Located entities for a map, minus the configured denylist.
    pub fn map_points(&self, config: &AnalysisConfig) -> Vec<MapPoint> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let (latitude, longitude) =
                    coordinates(row, &config.latitude_column, &config.longitude_column)?;
                let id = entity_id(row, config);
                if id.as_ref().is_some_and(|id| config.map_denylist.contains(id)) {
                    return None;
                }
                Some(MapPoint {
                    index,
                    id,
                    latitude,
                    longitude,
                    state: row.get_str(&config.state_column).map(|s| s.into_owned()),
                })
            })
            .collect()
    }
}

fn entity_id(row: &Row, config: &AnalysisConfig) -> Option<String> {
    row.get_str(&config.entity_column).map(|s| s.into_owned())
}

fn state_is(row: &Row, config: &AnalysisConfig, label: &str) -> bool {
    row.get_str(&config.state_column)
        .is_some_and(|s| s.to_lowercase() == label.to_lowercase())
}

fn is_in_study(row: &Row, config: &AnalysisConfig) -> bool {
    row.get_str(&config.annotation_column)
        .is_some_and(|c| c.trim().to_lowercase() == config.in_study_label.to_lowercase())
}

/// Derive the dashboard analysis from wide DCU records
///
/// The latest reading column is the `Meters DD.MM.YYYY` column whose token
/// sorts last as a plain string. Readings are then classified against the
/// configured thresholds, states and rate bands, and each entity's latest
/// reading is compared with the mean of all its readings.
///
/// Bad cells never fail the analysis; they count as "no reading" or zero.
///
/// # Arguments
/// * `records` - One row per DCU, wide layout
/// * `config` - Column names, labels and thresholds
///
/// # Returns
/// * `Option<Analysis>` - `None` when there are no records
///
/// # Examples
/// ```
/// use dcu_dashboard::analysis::analyze;
/// use dcu_dashboard::config::AnalysisConfig;
/// use dcu_dashboard::row::Row;
///
/// let a: Row = [("DCU", "A"), ("Status", "Online"), ("Meters 01.01.2024", "900")]
///     .into_iter()
///     .collect();
/// let analysis = analyze(vec![a].into(), &AnalysisConfig::default()).unwrap();
/// assert_eq!(analysis.load.overloaded.len(), 1);
/// ```
pub fn analyze(records: Arc<[Row]>, config: &AnalysisConfig) -> Option<Analysis> {
    if records.is_empty() {
        info!("No records to analyze");
        return None;
    }

    let columns = header(&records);
    let readings = dated_columns(&columns, &config.reading_prefix);
    let mut dates: Vec<String> = readings.iter().map(|c| c.token.clone()).collect();
    dates.sort();
    let latest_column = dates
        .last()
        .and_then(|token| readings.iter().find(|c| &c.token == token))
        .cloned();

    match &latest_column {
        Some(column) => info!("Latest reading column: {}", column.name),
        None => info!("No reading columns found"),
    }

    let latest_name = latest_column.as_ref().map(|c| c.name.as_str());
    let latest = |row: &Row| latest_name.and_then(|name| reading_value(row.get(name)));
    let latest_or_zero = |row: &Row| latest_name.map_or(0, |name| reading_or_zero(row.get(name)));
    let no_reading = |row: &Row| {
        latest_name.is_some_and(|name| is_no_reading(row.get(name), &config.not_available_marker))
    };

    let status = StatusPartitions {
        operational: Selection::filter(&records, |r| state_is(r, config, &config.operational_label)),
        unreachable: Selection::filter(&records, |r| state_is(r, config, &config.unreachable_label)),
        unregistered: Selection::filter(&records, |r| {
            state_is(r, config, &config.unregistered_label)
        }),
    };

    let load = LoadPartitions {
        overloaded: Selection::filter(&records, |r| {
            latest(r).is_some_and(|v| v > config.overload_threshold)
        }),
        underloaded: Selection::filter(&records, |r| {
            latest(r).is_some_and(|v| v > 0 && v < config.underload_threshold)
        }),
        no_reading: Selection::filter(&records, no_reading),
        operational_no_reading: Selection::filter(&records, |r| {
            state_is(r, config, &config.operational_label) && no_reading(r)
        }),
    };

    let rate_of = |row: &Row| parse_rate(row.get(&config.rate_column), &config.not_available_marker);
    let collection_rate = columns.contains(&config.rate_column).then(|| RateBands {
        with_rate: Selection::filter(&records, |r| rate_of(r).is_some()),
        below_low: Selection::filter(&records, |r| {
            rate_of(r).is_some_and(|v| v < config.rate_low_band)
        }),
        between: Selection::filter(&records, |r| {
            rate_of(r).is_some_and(|v| v >= config.rate_low_band && v < config.rate_high_band)
        }),
        at_least_high: Selection::filter(&records, |r| {
            rate_of(r).is_some_and(|v| v >= config.rate_high_band)
        }),
    });

    let history: Vec<EntityHistory> = records
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let values: Vec<i64> = readings.iter().map(|c| reading_or_zero(row.get(&c.name))).collect();
            let average = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<i64>() as f64 / values.len() as f64
            };
            let latest_value = latest_or_zero(row);
            let deviation = (latest_value as f64 - average).abs();
            EntityHistory {
                index,
                id: entity_id(row, config),
                average,
                latest: latest_value,
                deviation,
                deviation_percent: if average > 0.0 { deviation / average * 100.0 } else { 0.0 },
            }
        })
        .collect();

    let mut ranked: Vec<EntityHistory> = history.iter().filter(|h| h.average != 0.0).cloned().collect();
    // stable: ties keep record order
    ranked.sort_by(|a, b| b.deviation.total_cmp(&a.deviation));
    ranked.truncate(config.top_n);
    let top_deviations = ranked;

    let trend = dates
        .iter()
        .map(|token| {
            let column = format!("{}{}", config.reading_prefix, token);
            TrendPoint {
                date: token.clone(),
                values: top_deviations
                    .iter()
                    .map(|h| reading_or_zero(records[h.index].get(&column)))
                    .collect(),
            }
        })
        .collect();
    let trend_average = if top_deviations.is_empty() {
        0
    } else {
        (top_deviations.iter().map(|h| h.average).sum::<f64>() / top_deviations.len() as f64).round()
            as i64
    };

    let annotations = group_annotations(&records, config);

    let sum_latest = |selection: &Selection| -> i64 {
        selection.indices().iter().map(|&i| latest_or_zero(&records[i])).sum()
    };
    let meters_by_status = MetersByStatus {
        operational: sum_latest(&status.operational),
        unreachable: sum_latest(&status.unreachable),
        unregistered: sum_latest(&status.unregistered),
    };

    let attention_total =
        status.unreachable.len() + status.unregistered.len() + load.operational_no_reading.len();
    let attention = AttentionCases {
        unreachable: status.unreachable.clone(),
        unregistered: status.unregistered.clone(),
        operational_no_reading: load.operational_no_reading.clone(),
        total: attention_total,
        share: attention_total as f64 / records.len() as f64 * 100.0,
    };

    let reason = |row: &Row| {
        if state_is(row, config, &config.unregistered_label) {
            AttentionReason::Unregistered
        } else if state_is(row, config, &config.unreachable_label) {
            AttentionReason::Offline
        } else if state_is(row, config, &config.operational_label) && no_reading(row) {
            AttentionReason::OnlineWithoutMeters
        } else {
            AttentionReason::Unidentified
        }
    };
    let in_study_all = Selection::filter(&records, |r| is_in_study(r, config));
    let stage_cases = |label: &str| -> Vec<StudyCase> {
        let label = label.to_lowercase();
        in_study_all
            .indices()
            .iter()
            .map(|&index| (index, &records[index]))
            .filter(|(_, row)| {
                row.get_str(&config.analysis_stage_column)
                    .is_some_and(|s| s.trim().to_lowercase() == label)
            })
            .map(|(index, row)| StudyCase {
                index,
                id: entity_id(row, config),
                reason: reason(row),
            })
            .collect()
    };
    let in_study = InStudy {
        identified: stage_cases(&config.stages.identified),
        in_analysis: stage_cases(&config.stages.in_analysis),
        awaiting_action: stage_cases(&config.stages.awaiting_action),
        solved: stage_cases(&config.stages.solved),
        share: if attention_total > 0 {
            (in_study_all.len() as f64 / attention_total as f64 * 100.0).round() as u32
        } else {
            0
        },
        all: in_study_all,
    };

    let rated: Vec<RateEntry> = records
        .iter()
        .enumerate()
        .filter(|(_, row)| !is_in_study(row, config))
        .filter_map(|(index, row)| {
            Some(RateEntry {
                index,
                id: entity_id(row, config),
                rate: rate_of(row)?,
                meters: latest_or_zero(row),
            })
        })
        .collect();
    let load_vs_rate: Vec<RateEntry> = rated.iter().filter(|e| e.meters > 0).cloned().collect();
    let mut lowest_rates = rated;
    lowest_rates.sort_by(|a, b| a.rate.total_cmp(&b.rate));
    lowest_rates.truncate(config.top_n);

    info!(
        "Analyzed {} records: {} online, {} offline, {} overloaded, {} without meters",
        records.len(),
        status.operational.len(),
        status.unreachable.len(),
        load.overloaded.len(),
        load.no_reading.len()
    );

    Some(Analysis {
        total: records.len(),
        latest_column,
        dates,
        status,
        load,
        collection_rate,
        history,
        top_deviations,
        trend,
        trend_average,
        annotations,
        meters_by_status,
        attention,
        in_study,
        lowest_rates,
        load_vs_rate,
        records,
    })
}

fn group_annotations(records: &[Row], config: &AnalysisConfig) -> Vec<AnnotationGroup> {
    let mut groups: Vec<AnnotationGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in records {
        let Some(comment) = row.get_str(&config.annotation_column) else {
            continue;
        };
        if comment.is_empty()
            || comment == config.null_marker.as_str()
            || comment.starts_with(config.internal_annotation_prefix.as_str())
        {
            continue;
        }

        match positions.get(&*comment) {
            Some(&at) => groups[at].count += 1,
            None => {
                positions.insert(comment.to_string(), groups.len());
                groups.push(AnnotationGroup {
                    name: comment.into_owned(),
                    count: 1,
                });
            }
        }
    }

    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}
