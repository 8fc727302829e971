//! Tab-delimited record table codec.
//!
//! The envelope plaintext is one header line (column names) followed by one
//! line per record, all tab-separated and `\n`-terminated. Values are stored
//! verbatim — they can contain neither tab nor newline, which makes parsing
//! unambiguous. Errors carry the 1-based line number.

use crate::error::StoreError;
use crate::record::{validate_field, Record};

/// Encode the active header and records into table text.
///
/// Every record contributes exactly the active columns, in order; missing
/// values encode as empty strings.
///
/// # Errors
///
/// Returns [`StoreError::TableSyntax`] if any value contains a delimiter
/// character, naming the offending line.
pub fn format_table<'a, I>(columns: &[String], records: I) -> Result<String, StoreError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut out = String::new();
    out.push_str(&columns.join("\t"));
    out.push('\n');

    for (index, record) in records.into_iter().enumerate() {
        let line_no = index.saturating_add(2);
        let mut first = true;
        for column in columns {
            let value = record.get(column);
            validate_field(column, value).map_err(|_| StoreError::TableSyntax {
                place: format!("line {line_no}"),
                reason: format!("value of column {column:?} contains a delimiter"),
            })?;
            if !first {
                out.push('\t');
            }
            out.push_str(value);
            first = false;
        }
        out.push('\n');
    }
    Ok(out)
}

/// Decode table text into the header and records.
///
/// # Errors
///
/// Returns [`StoreError::TableSyntax`] for a missing or duplicate-column
/// header and for record lines whose field count does not match the header.
pub fn parse_table(text: &str) -> Result<(Vec<String>, Vec<Record>), StoreError> {
    let mut lines = text.split('\n');

    let header_line = lines.next().filter(|l| !l.is_empty()).ok_or_else(|| {
        StoreError::TableSyntax {
            place: "line 1".into(),
            reason: "missing header line".into(),
        }
    })?;

    let columns: Vec<String> = header_line.split('\t').map(str::to_string).collect();
    for (index, column) in columns.iter().enumerate() {
        if column.is_empty() {
            return Err(StoreError::TableSyntax {
                place: "line 1".into(),
                reason: "empty column name in header".into(),
            });
        }
        if columns[..index].contains(column) {
            return Err(StoreError::TableSyntax {
                place: "line 1".into(),
                reason: format!("duplicate column {column:?} in header"),
            });
        }
    }

    let mut records = Vec::new();
    for (index, line) in lines.enumerate() {
        // The final newline terminates the last record; ignore the empty
        // remainder after it.
        if line.is_empty() {
            continue;
        }
        let line_no = index.saturating_add(2);
        let values: Vec<&str> = line.split('\t').collect();
        if values.len() != columns.len() {
            return Err(StoreError::TableSyntax {
                place: format!("line {line_no}"),
                reason: format!(
                    "expected {} fields, found {}",
                    columns.len(),
                    values.len()
                ),
            });
        }
        records.push(
            columns
                .iter()
                .cloned()
                .zip(values.into_iter().map(str::to_string))
                .collect(),
        );
    }
    Ok((columns, records))
}
