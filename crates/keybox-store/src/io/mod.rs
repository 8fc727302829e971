//! Import and export in three formats.
//!
//! Each format module implements a pair of functions over an open
//! [`Keybox`]; shared types and the format dispatchers live here.
//!
//! - **plain** — the tab-delimited table with plaintext, C-escaped passwords
//! - **json** — an array of string-valued objects, passwords plaintext
//! - **keybox** — another encrypted keybox file (import only)
//!
//! Exports decrypt every password and stream to a caller-provided sink; the
//! destination (file, stdout, pipe) is the caller's business. Imports append
//! every record — duplicate detection is a UI concern, not done here.

pub mod json;
pub mod plain;

use std::io::Write;

use crate::error::StoreError;
use crate::keybox::{decrypt_foreign, Keybox};
use crate::record::PASSWORD;

/// Source format selector for [`import`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    /// Another encrypted keybox file (needs its own passphrase).
    Keybox,
    /// Tab-delimited plain text with C-escaped passwords.
    Plain,
    /// JSON array of objects.
    Json,
}

/// Target format selector for [`export`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Tab-delimited plain text with C-escaped passwords.
    Plain,
    /// JSON array of objects.
    Json,
}

/// What an import did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportReport {
    /// Records appended to the store.
    pub imported: usize,
}

/// Import `data` in the given format.
///
/// `passphrase` is required for [`ImportFormat::Keybox`] and ignored
/// otherwise.
///
/// # Errors
///
/// [`StoreError::Import`] for undecodable input; crypto errors for a wrong
/// keybox passphrase.
pub fn import(
    keybox: &mut Keybox,
    format: ImportFormat,
    data: &[u8],
    passphrase: Option<&str>,
) -> Result<ImportReport, StoreError> {
    match format {
        ImportFormat::Keybox => {
            let passphrase = passphrase
                .ok_or_else(|| StoreError::Import("keybox import needs a passphrase".into()))?;
            import_keybox(keybox, data, passphrase)
        }
        ImportFormat::Plain => {
            let text = std::str::from_utf8(data)
                .map_err(|_| StoreError::Import("plain input is not valid UTF-8".into()))?;
            plain::import_plain(keybox, text)
        }
        ImportFormat::Json => {
            let text = std::str::from_utf8(data)
                .map_err(|_| StoreError::Import("JSON input is not valid UTF-8".into()))?;
            json::import_json(keybox, text)
        }
    }
}

/// Export every record to `sink` in the given format. Returns the number of
/// records written.
///
/// # Errors
///
/// Decryption failures, or I/O errors from the sink.
pub fn export(
    keybox: &Keybox,
    format: ExportFormat,
    sink: &mut dyn Write,
) -> Result<usize, StoreError> {
    match format {
        ExportFormat::Plain => plain::export_plain(keybox, sink),
        ExportFormat::Json => json::export_json(keybox, sink),
    }
}

/// Import the records of another encrypted keybox file.
///
/// The foreign file's passwords are decrypted with *its* envelope and
/// re-encrypted under the current one; mtimes are carried over.
///
/// # Errors
///
/// Envelope errors for the foreign file (wrong passphrase is
/// `AuthFailure`), then the usual insert validation.
pub fn import_keybox(
    keybox: &mut Keybox,
    data: &[u8],
    passphrase: &str,
) -> Result<ImportReport, StoreError> {
    let (foreign_envelope, _, records) = decrypt_foreign(data, passphrase)?;

    let mut imported = 0usize;
    for mut record in records {
        let cryptogram = record.get(PASSWORD).to_string();
        let plaintext = if cryptogram.is_empty() {
            String::new()
        } else {
            keybox_crypto_core::decrypt_password(&foreign_envelope, &cryptogram)?
        };
        record.set(PASSWORD, plaintext);
        keybox.import_record(record)?;
        imported = imported.saturating_add(1);
    }
    Ok(ImportReport { imported })
}
