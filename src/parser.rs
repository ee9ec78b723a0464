use crate::row::{CellValue, Row};
use log::{debug, info};

/// Pick the delimiter for a header line
///
/// Tab wins over semicolon, semicolon over comma. A line with none of them
/// is treated as tab-separated (a single column).
///
/// # Examples
/// ```
/// use dcu_dashboard::parser::sniff_delimiter;
///
/// assert_eq!(sniff_delimiter("DCU\tStatus"), '\t');
/// assert_eq!(sniff_delimiter("DCU;Status,Extra"), ';');
/// assert_eq!(sniff_delimiter("DCU,Status"), ',');
/// assert_eq!(sniff_delimiter("DCU"), '\t');
/// ```
pub fn sniff_delimiter(first_line: &str) -> char {
    if first_line.contains('\t') {
        '\t'
    } else if first_line.contains(';') {
        ';'
    } else if first_line.contains(',') {
        ','
    } else {
        '\t'
    }
}

/// Parse delimited text into rows
///
/// The first non-blank line is the header. Every other line is split on the
/// sniffed delimiter and zipped with the header; cells are trimmed and have
/// their quote characters removed. The split is not quote-aware, so a quoted
/// field containing the delimiter is split like any other.
///
/// Missing trailing cells and empty cells are stored as `CellValue::Null`.
/// Lines whose cells are all empty are dropped. Nothing here fails: a
/// malformed line just yields a sparser row.
///
/// # Arguments
/// * `text` - Raw file contents
///
/// # Returns
/// * `Vec<Row>` - Parsed rows, empty when the text has no non-blank line
///
/// # Examples
/// ```
/// use dcu_dashboard::parser::parse_delimited;
///
/// let rows = parse_delimited("DCU;Status\nA;Online\nB\n");
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1].get_str("DCU").as_deref(), Some("B"));
/// assert!(rows[1].get_str("Status").is_none());
/// ```
pub fn parse_delimited(text: &str) -> Vec<Row> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(first_line) = lines.next() else {
        info!("Delimited input has no content");
        return Vec::new();
    };

    let delimiter = sniff_delimiter(first_line);
    info!("Detected delimiter: {}", describe(delimiter));

    let headers: Vec<String> = first_line.split(delimiter).map(clean_cell).collect();
    debug!("Header columns: {:?}", headers);

    let rows: Vec<Row> = lines
        .map(|line| parse_line(line, delimiter, &headers))
        .filter(|row| !row.is_blank())
        .collect();

    info!("Parsed {} rows", rows.len());
    rows
}

fn parse_line(line: &str, delimiter: char, headers: &[String]) -> Row {
    let values: Vec<String> = line.split(delimiter).map(clean_cell).collect();
    let mut row = Row::with_capacity(headers.len());

    for (index, header) in headers.iter().enumerate() {
        let value = match values.get(index) {
            Some(v) if !v.is_empty() => CellValue::Text(v.clone()),
            _ => CellValue::Null,
        };
        row.insert(header.as_str(), value);
    }

    row
}

fn clean_cell(raw: &str) -> String {
    raw.trim().replace('"', "")
}

fn describe(delimiter: char) -> &'static str {
    match delimiter {
        '\t' => "TAB",
        ';' => ";",
        _ => ",",
    }
}
