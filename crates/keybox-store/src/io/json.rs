//! JSON import/export.
//!
//! The interchange form is a top-level array with one object per record;
//! keys are column names, values are strings, passwords are plaintext. On
//! export, keys follow the active header order; on import, key order within
//! an object is irrelevant.

use std::io::Write;

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::io::ImportReport;
use crate::keybox::Keybox;
use crate::record::{Record, PASSWORD};

/// Write all records as a JSON array. Passwords are decrypted.
///
/// # Errors
///
/// Decryption failures, serialization errors, or sink I/O errors.
pub fn export_json(keybox: &Keybox, sink: &mut dyn Write) -> Result<usize, StoreError> {
    let columns = keybox.store().columns();

    let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(keybox.store().len());
    for (id, record) in keybox.store().iter() {
        let mut object = Map::new();
        for column in columns {
            let value = if column == PASSWORD {
                keybox.password(id)?
            } else {
                record.get(column).to_string()
            };
            object.insert(column.clone(), Value::String(value));
        }
        objects.push(object);
    }

    serde_json::to_writer_pretty(&mut *sink, &objects)
        .map_err(|e| StoreError::Export(format!("JSON serialization failed: {e}")))?;
    sink.write_all(b"\n")?;
    Ok(objects.len())
}

/// Import a JSON array produced by [`export_json`] (or by hand).
///
/// Every value must be a string. Passwords are re-encrypted under the
/// current envelope; a present `mtime` is kept, a missing one stamped now.
///
/// # Errors
///
/// [`StoreError::Import`] for anything that is not an array of
/// string-valued objects, then the usual insert validation.
pub fn import_json(keybox: &mut Keybox, text: &str) -> Result<ImportReport, StoreError> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::Import(format!("invalid JSON: {e}")))?;
    let Value::Array(items) = parsed else {
        return Err(StoreError::Import("expected a top-level JSON array".into()));
    };

    let mut imported = 0usize;
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            return Err(StoreError::Import(format!(
                "element {index} is not an object"
            )));
        };
        let mut record = Record::new();
        for (column, value) in object {
            let Value::String(value) = value else {
                return Err(StoreError::Import(format!(
                    "element {index}, key {column:?}: value is not a string"
                )));
            };
            record.set(&column, value);
        }
        keybox.import_record(record)?;
        imported = imported.saturating_add(1);
    }
    Ok(ImportReport { imported })
}
