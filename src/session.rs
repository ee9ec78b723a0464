use crate::analysis::{analyze, Analysis};
use crate::config::AnalysisConfig;
use crate::error::LoadError;
use crate::history::{summarize_meter_status, MeterStatusSummary};
use crate::loader::{load_bytes, load_file};
use crate::reshape::{reshape, Layout};
use crate::row::Row;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// One successfully ingested file.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub layout: Layout,
    pub rows: Arc<[Row]>,
}

/// A dataset with everything derived from it, ready to be swapped in.
#[derive(Clone, Debug)]
pub struct Ingested {
    dataset: Arc<Dataset>,
    derived: Derived,
}

#[derive(Clone, Debug)]
enum Derived {
    Dcus(Option<Arc<Analysis>>),
    Meters(Option<Arc<MeterStatusSummary>>),
}

impl Ingested {
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
}

/// Reshape and derive from freshly loaded rows
///
/// Does all the work of an ingestion without touching any dashboard, so it
/// can run off the thread that owns the state. Empty input is rejected.
///
/// # Arguments
/// * `name` - File name shown for the dataset
/// * `rows` - Rows from the loader
/// * `config` - Column names, labels and thresholds
///
/// # Returns
/// * `Result<Ingested, LoadError>` - The prepared dataset, or `LoadError::Empty`
pub fn prepare(name: String, rows: Vec<Row>, config: &AnalysisConfig) -> Result<Ingested, LoadError> {
    if rows.is_empty() {
        warn!("{} has no usable rows; keeping previous data", name);
        return Err(LoadError::Empty { name });
    }

    let reshaped = reshape(rows, config);
    let dataset = Arc::new(Dataset {
        name,
        uploaded_at: Utc::now(),
        layout: reshaped.layout,
        rows: reshaped.rows.into(),
    });

    let derived = match dataset.layout {
        Layout::MeterStatusWide => {
            Derived::Meters(summarize_meter_status(&dataset.rows, config).map(Arc::new))
        }
        Layout::DcuLoadWide | Layout::Flat => {
            Derived::Dcus(analyze(dataset.rows.clone(), config).map(Arc::new))
        }
    };

    Ok(Ingested { dataset, derived })
}

/// The currently loaded data and everything derived from it
///
/// DCU load exports and meter status exports live side by side; loading one
/// kind replaces only that kind. Each ingestion runs load, reshape and
/// derivation to completion before anything is swapped in, and a failed or
/// empty ingestion leaves the previous state untouched.
#[derive(Debug, Default)]
pub struct Dashboard {
    config: AnalysisConfig,
    dcus: Option<Arc<Dataset>>,
    analysis: Option<Arc<Analysis>>,
    meters: Option<Arc<Dataset>>,
    meter_summary: Option<Arc<MeterStatusSummary>>,
}

impl Dashboard {
    pub fn new(config: AnalysisConfig) -> Self {
        Dashboard {
            config,
            ..Dashboard::default()
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn dcus(&self) -> Option<Arc<Dataset>> {
        self.dcus.clone()
    }

    /// `None` until a DCU export has been ingested.
    pub fn analysis(&self) -> Option<Arc<Analysis>> {
        self.analysis.clone()
    }

    pub fn meters(&self) -> Option<Arc<Dataset>> {
        self.meters.clone()
    }

    pub fn meter_summary(&self) -> Option<Arc<MeterStatusSummary>> {
        self.meter_summary.clone()
    }

    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<Dataset>, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let rows = load_file(path).inspect_err(|e| warn!("Failed to load {}: {}", name, e))?;
        self.publish(name, rows)
    }

    pub fn ingest_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<Arc<Dataset>, LoadError> {
        let rows =
            load_bytes(name, bytes).inspect_err(|e| warn!("Failed to load {}: {}", name, e))?;
        self.publish(name.to_string(), rows)
    }

    /// Fetch a hosted workbook and publish it like an upload.
    #[cfg(feature = "remote")]
    pub async fn ingest_url(&mut self, url: &str) -> Result<Arc<Dataset>, LoadError> {
        let rows = crate::loader::load_url(url)
            .await
            .inspect_err(|e| warn!("Failed to fetch {}: {}", url, e))?;
        self.publish(name_from_url(url), rows)
    }

    /// Swap a prepared dataset in, replacing only its own slot.
    pub fn apply(&mut self, ingested: Ingested) -> Arc<Dataset> {
        let Ingested { dataset, derived } = ingested;
        match derived {
            Derived::Meters(summary) => {
                self.meters = Some(dataset.clone());
                self.meter_summary = summary;
            }
            Derived::Dcus(analysis) => {
                self.dcus = Some(dataset.clone());
                self.analysis = analysis;
            }
        }

        info!("{} records loaded from {}", dataset.rows.len(), dataset.name);
        dataset
    }

    fn publish(&mut self, name: String, rows: Vec<Row>) -> Result<Arc<Dataset>, LoadError> {
        let ingested = prepare(name, rows, &self.config)?;
        Ok(self.apply(ingested))
    }
}

#[cfg(feature = "remote")]
pub(crate) fn name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_string()
}
