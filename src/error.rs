use thiserror::Error;

/// Failures that abort a whole ingestion attempt.
///
/// Individual cells never produce an error: anything unparseable degrades to
/// "no reading" during analysis. Only a workbook that cannot be decoded, a
/// file that yields no rows, or an I/O failure stops the pipeline.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The bytes are not a spreadsheet the extractor understands.
    #[error("invalid spreadsheet: {0}")]
    Format(String),

    /// The file parsed, but produced zero usable rows.
    #[error("{name}: file is empty or has no usable rows")]
    Empty { name: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// The remote dataset could not be fetched (connection, timeout or HTTP status).
    #[cfg(feature = "remote")]
    #[error("failed to fetch dataset: {0}")]
    Fetch(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no rows available to export")]
    Empty,

    #[error("failed to write xlsx: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("unknown subset: {0}")]
    UnknownSubset(String),
}
