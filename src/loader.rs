use crate::error::LoadError;
use crate::parser::parse_delimited;
use crate::row::{CellValue, Row};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use log::info;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Input formats the loader can dispatch to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Delimited,
}

impl SourceFormat {
    /// Choose a format from a file name. Anything that is not a known
    /// workbook extension is read as delimited text.
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                SourceFormat::Spreadsheet
            }
            _ => SourceFormat::Delimited,
        }
    }
}

/// Read the first sheet of a workbook into rows
///
/// The first row of the sheet names the fields. Empty header cells become
/// `__EMPTY`, `__EMPTY_1`, ... and repeated names get a `_1`, `_2` suffix.
/// Numbers stay numbers and date cells become dates; empty cells are left
/// out of the row, and rows with no cells at all are skipped. Later sheets
/// are ignored.
///
/// # Arguments
/// * `bytes` - Workbook content (XLSX, XLS, XLSB or ODS)
///
/// # Returns
/// * `Result<Vec<Row>, LoadError>` - The rows, or `LoadError::Format` when the
///   bytes are not a readable workbook
///
/// # Examples
/// ```
/// use dcu_dashboard::error::LoadError;
/// use dcu_dashboard::loader::from_excel_bytes;
///
/// let err = from_excel_bytes(b"DCU;Status\nA;Online").unwrap_err();
/// assert!(matches!(err, LoadError::Format(_)));
/// ```
pub fn from_excel_bytes(bytes: &[u8]) -> Result<Vec<Row>, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Format(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Format("No sheets found in workbook".to_string()))?
        .map_err(|e| LoadError::Format(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers = header_names(header_row);

    let rows: Vec<Row> = sheet_rows
        .filter_map(|cells| {
            let mut row = Row::with_capacity(headers.len());
            for (header, cell) in headers.iter().zip(cells) {
                if let Some(value) = convert(cell) {
                    row.insert(header.as_str(), value);
                }
            }
            (!row.is_empty()).then_some(row)
        })
        .collect();

    info!("Excel parsed: {} rows", rows.len());
    Ok(rows)
}

fn header_names(cells: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        let base = convert(cell)
            .and_then(|v| v.as_str().map(|s| s.into_owned()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "__EMPTY".to_string());

        let mut name = base.clone();
        let mut suffix = 0;
        while names.contains(&name) {
            suffix += 1;
            name = format!("{}_{}", base, suffix);
        }
        names.push(name);
    }
    names
}

fn convert(cell: &Data) -> Option<CellValue> {
    let value = match cell {
        Data::Empty => return None,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::Date(datetime),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            Ok(datetime) => CellValue::Date(datetime),
            Err(_) => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    };
    Some(value)
}

/// Parse file content according to its name
///
/// Workbook extensions go to [`from_excel_bytes`]; everything else is decoded
/// as UTF-8 (lossily, with any byte-order mark removed) and handed to the
/// delimited parser.
///
/// # Arguments
/// * `name` - File name, used only for its extension
/// * `bytes` - File content
///
/// # Returns
/// * `Result<Vec<Row>, LoadError>` - Parsed rows; may be empty
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<Vec<Row>, LoadError> {
    info!("Processing file: {} ({} bytes)", name, bytes.len());

    match SourceFormat::from_name(name) {
        SourceFormat::Spreadsheet => from_excel_bytes(bytes),
        SourceFormat::Delimited => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            Ok(parse_delimited(text))
        }
    }
}

/// Load rows from a file on disk
///
/// # Examples
/// ```no_run
/// use dcu_dashboard::loader::load_file;
///
/// match load_file("CARGA-DAS-DCUS.xlsx") {
///     Ok(rows) => println!("Loaded {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_file(filepath: impl AsRef<Path>) -> Result<Vec<Row>, LoadError> {
    let path = filepath.as_ref();
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    load_bytes(name, &bytes)
}

/// Fetch a published workbook over HTTP and read its first sheet
///
/// Used for dashboards that track a spreadsheet export hosted elsewhere
/// instead of an upload. The response body always goes through
/// [`from_excel_bytes`], whatever the URL looks like.
///
/// # Arguments
/// * `url` - Address of the workbook
///
/// # Returns
/// * `Result<Vec<Row>, LoadError>` - The rows, `LoadError::Fetch` when the
///   request fails or returns an error status, or `LoadError::Format` when
///   the body is not a workbook
#[cfg(feature = "remote")]
pub async fn load_url(url: &str) -> Result<Vec<Row>, LoadError> {
    info!("Fetching dataset: {}", url);

    let client = reqwest::Client::new();
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    info!("Fetched {} bytes from {}", bytes.len(), url);
    from_excel_bytes(&bytes)
}
