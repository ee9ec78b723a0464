use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column names, labels and thresholds the pipeline keys on.
///
/// The defaults match the DCU load export the dashboard was built around.
/// Other deployments override individual fields from a JSON file; anything
/// left out keeps its default.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub entity_column: String,
    pub state_column: String,
    pub annotation_column: String,
    pub analysis_stage_column: String,
    pub rate_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
    pub meter_column: String,
    pub date_column: String,

    /// Prefix of `<prefix>DD.MM.YYYY` meter count columns.
    pub reading_prefix: String,
    pub state_prefix: String,
    pub group_prefix: String,

    pub operational_label: String,
    pub unreachable_label: String,
    pub unregistered_label: String,

    pub overload_threshold: i64,
    pub underload_threshold: i64,
    pub rate_low_band: f64,
    pub rate_high_band: f64,
    pub top_n: usize,

    pub not_available_marker: String,
    pub null_marker: String,
    pub internal_annotation_prefix: String,
    pub in_study_label: String,
    pub stages: StageLabels,

    /// Entity ids never shown on maps.
    pub map_denylist: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StageLabels {
    pub identified: String,
    pub in_analysis: String,
    pub awaiting_action: String,
    pub solved: String,
}

impl Default for StageLabels {
    fn default() -> Self {
        Self {
            identified: "identificado".to_string(),
            in_analysis: "em análise".to_string(),
            awaiting_action: "aguardando atuação".to_string(),
            solved: "solucionado".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            entity_column: "DCU".to_string(),
            state_column: "Status".to_string(),
            annotation_column: "Comentário".to_string(),
            analysis_stage_column: "Status da Análise".to_string(),
            rate_column: "Taxa de coleta".to_string(),
            latitude_column: "LAT".to_string(),
            longitude_column: "LONG".to_string(),
            meter_column: "Meter Number".to_string(),
            date_column: "Data".to_string(),
            reading_prefix: "Meters ".to_string(),
            state_prefix: "Status ".to_string(),
            group_prefix: "DCU ".to_string(),
            operational_label: "online".to_string(),
            unreachable_label: "offline".to_string(),
            unregistered_label: "não registrado".to_string(),
            overload_threshold: 850,
            underload_threshold: 50,
            rate_low_band: 95.0,
            rate_high_band: 98.0,
            top_n: 10,
            not_available_marker: "#N/D".to_string(),
            null_marker: "null".to_string(),
            internal_annotation_prefix: "Interno".to_string(),
            in_study_label: "em estudo".to_string(),
            stages: StageLabels::default(),
            map_denylist: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load a config from a JSON file, filling unspecified fields with defaults
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file
    ///
    /// # Returns
    /// * `Result<AnalysisConfig, ConfigError>` - The merged config or an error
    ///
    /// # Examples
    /// ```no_run
    /// use dcu_dashboard::config::AnalysisConfig;
    ///
    /// let config = AnalysisConfig::from_file("dashboard.json").unwrap_or_default();
    /// println!("overload above {}", config.overload_threshold);
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
