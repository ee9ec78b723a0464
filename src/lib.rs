/*!
# DCU Dashboard

Ingestion and analysis core for monitoring an AMI metering network: data
collection units (DCUs) and the meters attached to them.

## Overview

Operators export the network state as spreadsheets or delimited text. This
crate turns those exports into a single immutable analysis that charts, maps
and tables bind to directly, without further derivation.

## Architecture

### Ingestion Layer
- **Delimited parser** - Sniffs tab, semicolon or comma from the header line
  and maps every following line onto the header
- **Spreadsheet extractor** - Reads the first sheet of an XLSX/XLS/ODS
  workbook, keeping native numbers and dates
- **Reshaper** - Detects `Status DD.MM.YYYY` / `DCU DD.MM.YYYY` column pairs
  and turns per-meter wide rows into one row per meter and date; per-DCU
  `Meters DD.MM.YYYY` exports stay wide

### Derivation Layer
- **Analysis** - Latest reading column, status partitions, overload /
  underload / no-meter partitions, collection-rate bands, historical
  deviation ranking, comment groups, attention and in-study cases
- **Meter history** - Status counts on the two most recent dates of a
  long-form meter export
- **Column profiling** - Location, date, number, status or text, per column

### Serving Layer
- **Session** - Holds the current dataset and analysis, replacing them only
  when an ingestion fully succeeds
- **Export** - CSV and XLSX output for any subset
- **Web API** (feature `web`) - Upload, analysis JSON and exports over HTTP

## Modules

- **row**: Row and cell value types (open schema)
- **parser**: Delimiter-sniffing text parser
- **loader**: Spreadsheet extractor and extension dispatch
- **columns**: Dated column detection and column classification
- **reshape**: Wide-to-long reshaping
- **metrics**: Reading, rate and coordinate coercions
- **analysis**: Metric derivation engine
- **history**: Meter status history
- **config**: Column names, labels and thresholds
- **session**: Ingestion state
- **downloader**: CSV/XLSX export
- **app**: HTTP routes (feature `web`)
*/

pub mod analysis;
pub mod columns;
pub mod config;
pub mod downloader;
pub mod error;
pub mod history;
pub mod loader;
pub mod metrics;
pub mod parser;
pub mod reshape;
pub mod row;
pub mod session;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the main entry points to make them easier to use
pub use analysis::{analyze, Analysis, Selection};
pub use config::AnalysisConfig;
pub use error::{ConfigError, ExportError, LoadError};
pub use loader::{load_bytes, load_file};
pub use parser::parse_delimited;
pub use reshape::{reshape, Layout, Reshaped};
pub use row::{CellValue, Row};
pub use session::{Dashboard, Dataset};
