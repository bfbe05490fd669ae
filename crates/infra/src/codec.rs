//! CSV encoding of input and output tables.

use scrub_core::InputTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("input has no header row")]
    MissingHeader,
    #[error("malformed csv: {0}")]
    Malformed(String),
    #[error("failed to write csv: {0}")]
    Write(String),
}

impl From<csv::Error> for CodecError {
    fn from(err: csv::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

/// Parse uploaded CSV bytes into a table.
///
/// The first row is the header. Short rows are padded with empty cells and long
/// rows truncated so every row matches the header width.
pub fn read_table(bytes: &[u8]) -> Result<InputTable, CodecError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CodecError::MissingHeader);
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(InputTable::new(headers, rows))
}

/// Serialize a header row and data rows to CSV bytes.
pub fn write_table(headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer
        .write_record(headers)
        .map_err(|e| CodecError::Write(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| CodecError::Write(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| CodecError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_squared_to_header_width() {
        let table = read_table(b"Account Name,Website,ae\nAcme,acme.com\nGlobex,globex.com,Dana,extra\n").unwrap();
        assert_eq!(table.headers, vec!["Account Name", "Website", "ae"]);
        assert_eq!(table.rows[0], vec!["Acme", "acme.com", ""]);
        assert_eq!(table.rows[1], vec!["Globex", "globex.com", "Dana"]);
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let table = read_table(b"\xEF\xBB\xBFAccount Name\nAcme\n").unwrap();
        assert_eq!(table.headers, vec!["Account Name"]);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let table = read_table(b"Account Name,Website\n\"Acme, Inc.\",acme.com\n").unwrap();
        assert_eq!(table.rows[0][0], "Acme, Inc.");
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(read_table(b""), Err(CodecError::MissingHeader)));
    }

    #[test]
    fn header_only_input_has_no_rows() {
        let table = read_table(b"Account Name,Website\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn written_fields_are_quoted_when_needed() {
        let bytes = write_table(
            &["Account Name".to_string(), "scrub_summary".to_string()],
            &[vec!["Acme".to_string(), "Active, hiring".to_string()]],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Account Name,scrub_summary\nAcme,\"Active, hiring\"\n"
        );
    }
}
