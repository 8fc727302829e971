//! The record type — an open, ordered mapping from column name to value.
//!
//! Records deliberately are *not* a fixed struct: a file written by a newer
//! version may carry columns this version does not know, and those values
//! must survive a round-trip untouched. Missing columns read as the empty
//! string.

use crate::error::StoreError;

/// Default column set, in persisted order. Used for new keybox files only —
/// an opened file's header takes precedence.
pub const DEFAULT_COLUMNS: [&str; 7] = ["site", "user", "url", "tags", "mtime", "note", "password"];

/// The automatically-maintained modification timestamp column.
pub const MTIME: &str = "mtime";

/// The inner-encrypted password column.
pub const PASSWORD: &str = "password";

/// One row of the record table.
///
/// Column order is preserved as first-set order; equality of contents is
/// deliberately not exposed — record identity lives in the store.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Empty record with no columns.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Value of `column`, or `""` when the record does not carry it.
    #[must_use]
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map_or("", |(_, value)| value.as_str())
    }

    /// Set `column` to `value`, appending the column if new.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    /// Column names in this record's order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// `true` when `column` holds a non-empty value.
    #[must_use]
    pub fn has_value(&self, column: &str) -> bool {
        !self.get(column).is_empty()
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.set(&column, value);
        }
        record
    }
}

/// Check that a value is storable in the tab-delimited table.
///
/// # Errors
///
/// Returns [`StoreError::TableSyntax`] if the value contains a tab or a
/// line break — those characters are the table's delimiters and cannot be
/// escaped in the internal format.
pub fn validate_field(column: &str, value: &str) -> Result<(), StoreError> {
    let offender = if value.contains('\t') {
        Some("tab")
    } else if value.contains('\n') || value.contains('\r') {
        Some("line break")
    } else {
        None
    };
    match offender {
        Some(what) => Err(StoreError::TableSyntax {
            place: format!("column {column:?}"),
            reason: format!("value contains a {what}"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_reads_as_empty() {
        let record = Record::new();
        assert_eq!(record.get("site"), "");
        assert!(!record.has_value("site"));
    }

    #[test]
    fn set_then_get() {
        let mut record = Record::new();
        record.set("site", "Example");
        record.set("user", "johny");
        assert_eq!(record.get("site"), "Example");
        assert_eq!(record.get("user"), "johny");
        assert!(record.has_value("site"));
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut record = Record::new();
        record.set("site", "old");
        record.set("user", "johny");
        record.set("site", "new");
        assert_eq!(record.get("site"), "new");
        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, ["site", "user"]);
    }

    #[test]
    fn unknown_columns_are_kept_in_order() {
        let record: Record = [
            ("site".to_string(), "a".to_string()),
            ("x-custom".to_string(), "kept".to_string()),
        ]
        .into_iter()
        .collect();
        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, ["site", "x-custom"]);
        assert_eq!(record.get("x-custom"), "kept");
    }

    #[test]
    fn validate_field_rejects_delimiters() {
        assert!(validate_field("site", "with\ttab").is_err());
        assert!(validate_field("note", "with\nnewline").is_err());
        assert!(validate_field("note", "with\rreturn").is_err());
        assert!(validate_field("site", "plain value").is_ok());
    }

    #[test]
    fn default_columns_are_the_documented_set() {
        assert_eq!(
            DEFAULT_COLUMNS,
            ["site", "user", "url", "tags", "mtime", "note", "password"]
        );
    }
}
