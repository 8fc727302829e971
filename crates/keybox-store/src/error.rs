//! Store-level error types for `keybox-store`.

use keybox_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by record handling, file lifecycle and import/export.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Envelope or cipher failure (delegated from `keybox-crypto-core`).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The record table is malformed: missing header, wrong field count,
    /// or a tab/newline inside a field value.
    #[error("table syntax error at {place}: {reason}")]
    TableSyntax {
        /// Where the problem is — `line N` for parse errors, `column "x"`
        /// for rejected field values.
        place: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A header change would drop a column that still holds data.
    #[error("column {column:?} is not empty in {records} record(s); use force to drop it")]
    UnknownColumn {
        /// The column that would lose data.
        column: String,
        /// How many records still populate it.
        records: usize,
    },

    /// `mtime` is maintained by the store and cannot be set directly.
    #[error("mtime is updated automatically and cannot be set directly")]
    MtimeReadOnly,

    /// The record handle does not resolve (already deleted, or from
    /// another store).
    #[error("no such record")]
    NoSuchRecord,

    /// Refusing to create over an existing keybox file.
    #[error("keybox already exists: {0}")]
    KeyboxExists(String),

    /// The keybox file to open does not exist.
    #[error("keybox not found: {0}")]
    KeyboxNotFound(String),

    /// Passphrase confirmation did not match at creation.
    #[error("passphrases do not match")]
    PassphraseMismatch,

    /// Import source could not be understood.
    #[error("import error: {0}")]
    Import(String),

    /// Export failed before reaching the sink.
    #[error("export error: {0}")]
    Export(String),

    /// Underlying filesystem or I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
