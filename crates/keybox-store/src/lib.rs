//! `keybox-store` — records, file lifecycle and import/export for keybox.
//!
//! This crate layers the domain model over `keybox-crypto-core`: the
//! tab-delimited record table, the in-memory store with identity-addressed
//! records and automatic mtime maintenance, the open/create/save facade
//! with atomic file replacement, and plain/JSON/keybox import and export.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::arithmetic_side_effects
    )
)]

pub mod error;
pub mod io;
pub mod keybox;
pub mod record;
mod storage;
pub mod store;
pub mod table;
pub mod timeutil;

pub use error::StoreError;
pub use io::{export, import, ExportFormat, ImportFormat, ImportReport};
pub use keybox::{Keybox, PassphraseProvider};
pub use record::{Record, DEFAULT_COLUMNS};
pub use store::{RecordId, RecordStore};
pub use timeutil::{Clock, FixedClock, SystemClock};
