//! Plain-text import/export.
//!
//! Same layout as the internal table — header line, tab-separated values —
//! but the password column carries the *plaintext* with C-style escapes so
//! it stays tab- and newline-free: `\\` for backslash, `\n` for newline,
//! `\t` for tab. All other fields are verbatim and must already obey the
//! no-delimiter rule.

use std::io::Write;

use crate::error::StoreError;
use crate::io::ImportReport;
use crate::keybox::Keybox;
use crate::record::{validate_field, PASSWORD};
use crate::table::parse_table;

/// Escape a password for the plain format.
#[must_use]
pub fn escape_password(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_password`].
///
/// # Errors
///
/// Returns [`StoreError::Import`] for an unknown escape or a dangling
/// trailing backslash — silently passing those through would corrupt the
/// password.
pub fn unescape_password(escaped: &str) -> Result<String, StoreError> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                return Err(StoreError::Import(format!(
                    "unknown escape \\{other} in password"
                )));
            }
            None => {
                return Err(StoreError::Import(
                    "dangling backslash in password".into(),
                ));
            }
        }
    }
    Ok(out)
}

/// Write all records as plain text. Passwords are decrypted and escaped.
///
/// # Errors
///
/// Decryption failures, delimiter violations in non-password fields, or
/// sink I/O errors.
pub fn export_plain(keybox: &Keybox, sink: &mut dyn Write) -> Result<usize, StoreError> {
    let columns = keybox.store().columns();
    let mut line = columns.join("\t");
    line.push('\n');
    sink.write_all(line.as_bytes())?;

    let mut exported = 0usize;
    for (id, record) in keybox.store().iter() {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            if column == PASSWORD {
                values.push(escape_password(&keybox.password(id)?));
            } else {
                let value = record.get(column);
                validate_field(column, value)?;
                values.push(value.to_string());
            }
        }
        let mut line = values.join("\t");
        line.push('\n');
        sink.write_all(line.as_bytes())?;
        exported = exported.saturating_add(1);
    }
    Ok(exported)
}

/// Import plain text produced by [`export_plain`] (or by hand).
///
/// Passwords are unescaped and re-encrypted under the current envelope; a
/// present `mtime` is kept, a missing one is stamped now.
///
/// # Errors
///
/// Table syntax errors with line numbers, bad escapes, or encryption
/// failures.
pub fn import_plain(keybox: &mut Keybox, text: &str) -> Result<ImportReport, StoreError> {
    let (_, records) = parse_table(text)?;

    let mut imported = 0usize;
    for mut record in records {
        let escaped = record.get(PASSWORD).to_string();
        record.set(PASSWORD, unescape_password(&escaped)?);
        keybox.import_record(record)?;
        imported = imported.saturating_add(1);
    }
    Ok(ImportReport { imported })
}
