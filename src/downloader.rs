use crate::error::ExportError;
use crate::row::{CellValue, Row};
use std::collections::HashSet;

/// Convert rows to CSV format
///
/// The header is every column seen across the rows, in first-seen order, so
/// sparse spreadsheet rows still line up. Values containing commas, quotes or
/// newlines are quoted; missing and null cells are left empty.
///
/// # Arguments
/// * `rows` - Rows to export
///
/// # Returns
/// * `Result<String, ExportError>` - CSV content, or `ExportError::Empty`
///
/// # Examples
/// ```
/// use dcu_dashboard::downloader::to_csv;
/// use dcu_dashboard::row::Row;
///
/// let row: Row = [("DCU", "A"), ("Comentário", "Troca, urgente")].into_iter().collect();
/// let csv = to_csv(&[&row]).unwrap();
/// assert_eq!(csv, "DCU,Comentário\nA,\"Troca, urgente\"\n");
/// ```
pub fn to_csv(rows: &[&Row]) -> Result<String, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::Empty);
    }

    let columns = union_columns(rows);
    let mut csv_content = String::new();

    csv_content.push_str(
        &columns
            .iter()
            .map(|c| escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    csv_content.push('\n');

    for row in rows {
        for (c, column) in columns.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if let Some(value) = row.get(column).and_then(CellValue::as_str) {
                csv_content.push_str(&escape(&value));
            }
        }
        csv_content.push('\n');
    }

    Ok(csv_content)
}

/// Convert rows to XLSX format
///
/// Writes a single `Dados` worksheet with a header row. Numbers stay numeric;
/// text and dates are written as strings (dates as `DD.MM.YYYY`).
///
/// # Arguments
/// * `rows` - Rows to export
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
pub fn to_xlsx(rows: &[&Row]) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    if rows.is_empty() {
        return Err(ExportError::Empty);
    }

    let columns = union_columns(rows);
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Dados")?;

    for (c, column) in columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, column.as_str())?;
    }

    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, column) in columns.iter().enumerate() {
            let c = c as u16;
            match row.get(column) {
                Some(CellValue::Number(n)) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Some(value) => {
                    if let Some(text) = value.as_str() {
                        worksheet.write_string(r, c, &*text)?;
                    }
                }
                None => {}
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

fn union_columns(rows: &[&Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
