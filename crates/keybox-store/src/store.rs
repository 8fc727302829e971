//! The in-memory record store.
//!
//! Holds the active column order and the records, maintains `mtime` on every
//! mutation, and tracks whether anything changed since the last save.
//! Records are addressed by [`RecordId`] — an arena index that stays valid
//! across other mutations and is never reused, so identity comparisons are
//! exact even for records with identical contents.

use crate::error::StoreError;
use crate::record::{validate_field, Record, DEFAULT_COLUMNS, MTIME};
use crate::timeutil::{Clock, SystemClock};

/// Columns searched by a plain (non-prefixed) query.
const SEARCH_COLUMNS: [&str; 5] = ["site", "user", "url", "tags", "note"];

/// Opaque record handle. Equality is identity: two records with identical
/// field values have distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Ordered column list + records + clock.
pub struct RecordStore {
    columns: Vec<String>,
    slots: Vec<Option<Record>>,
    order: Vec<RecordId>,
    clock: Box<dyn Clock>,
    modified: bool,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("columns", &self.columns)
            .field("records", &self.order.len())
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    /// Empty store with the default header and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Empty store with an injected clock (deterministic tests).
    #[must_use]
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            columns: DEFAULT_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            slots: Vec::new(),
            order: Vec::new(),
            clock,
            modified: false,
        }
    }

    /// Build a store from a parsed table (open path). Not marked modified.
    #[must_use]
    pub fn from_parts(columns: Vec<String>, records: Vec<Record>) -> Self {
        let mut store = Self::new();
        store.columns = columns;
        for record in records {
            let id = RecordId(store.slots.len());
            store.slots.push(Some(record));
            store.order.push(id);
        }
        store
    }

    /// Replace the clock (tests).
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    /// The active column order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` when the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `true` when anything changed since the last load/save.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Reset the modified flag after a successful save.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Resolve a handle.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Live records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.order
            .iter()
            .filter_map(|id| self.get(*id).map(|record| (*id, record)))
    }

    /// Create a record from `fields`, stamp `mtime`, append it.
    ///
    /// New column names extend the active header at the end.
    ///
    /// # Errors
    ///
    /// [`StoreError::MtimeReadOnly`] if `fields` names `mtime`;
    /// [`StoreError::TableSyntax`] if a value contains a delimiter.
    pub fn add(&mut self, fields: &[(&str, &str)]) -> Result<RecordId, StoreError> {
        let mut record = Record::new();
        for column in &self.columns {
            record.set(column, "");
        }
        for (column, value) in fields {
            if *column == MTIME {
                return Err(StoreError::MtimeReadOnly);
            }
            validate_field(column, value)?;
            self.ensure_column(column);
            record.set(column, *value);
        }
        record.set(MTIME, self.clock.timestamp());

        let id = RecordId(self.slots.len());
        self.slots.push(Some(record));
        self.order.push(id);
        self.modified = true;
        Ok(id)
    }

    /// Append an externally-built record verbatim (open/import path).
    ///
    /// Unknown columns extend the active header; an empty `mtime` is
    /// stamped with the current time, a present one is kept.
    ///
    /// # Errors
    ///
    /// [`StoreError::TableSyntax`] if a value contains a delimiter.
    pub fn insert(&mut self, record: Record) -> Result<RecordId, StoreError> {
        for column in record.columns() {
            validate_field(column, record.get(column))?;
        }
        let new_columns: Vec<String> = record
            .columns()
            .filter(|c| !self.columns.iter().any(|known| known == c))
            .map(str::to_string)
            .collect();
        for column in new_columns {
            self.columns.push(column);
        }

        let mut record = record;
        if record.get(MTIME).is_empty() {
            record.set(MTIME, self.clock.timestamp());
        }

        let id = RecordId(self.slots.len());
        self.slots.push(Some(record));
        self.order.push(id);
        self.modified = true;
        Ok(id)
    }

    /// Update the named fields of an existing record and refresh its mtime.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchRecord`] for a dead handle, plus the same
    /// validation errors as [`RecordStore::add`].
    pub fn modify(&mut self, id: RecordId, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        if self.get(id).is_none() {
            return Err(StoreError::NoSuchRecord);
        }
        for (column, value) in fields {
            if *column == MTIME {
                return Err(StoreError::MtimeReadOnly);
            }
            validate_field(column, value)?;
        }
        for (column, _) in fields {
            self.ensure_column(column);
        }
        let stamp = self.clock.timestamp();
        let record = self
            .slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(StoreError::NoSuchRecord)?;
        for (column, value) in fields {
            record.set(column, *value);
        }
        record.set(MTIME, stamp);
        self.modified = true;
        Ok(())
    }

    /// Overwrite one field without touching `mtime` or validating columns
    /// against the header. Used by passphrase changes, which rewrite every
    /// password cryptogram without logically modifying the records.
    pub(crate) fn set_field_raw(
        &mut self,
        id: RecordId,
        column: &str,
        value: String,
    ) -> Result<(), StoreError> {
        let record = self
            .slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(StoreError::NoSuchRecord)?;
        record.set(column, value);
        self.modified = true;
        Ok(())
    }

    /// Remove a record by identity.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchRecord`] if the handle is already dead.
    pub fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        let slot = self.slots.get_mut(id.0).ok_or(StoreError::NoSuchRecord)?;
        if slot.take().is_none() {
            return Err(StoreError::NoSuchRecord);
        }
        self.order.retain(|o| *o != id);
        self.modified = true;
        Ok(())
    }

    /// Substring search, insertion-ordered.
    ///
    /// An empty query matches everything. `column:value` restricts matching
    /// to `column` (when it is an active column); otherwise the query is
    /// matched case-insensitively against site, user, url, tags and note.
    #[must_use]
    pub fn find(&self, query: &str) -> Vec<RecordId> {
        if query.is_empty() {
            return self.order.clone();
        }

        let restricted = query.split_once(':').and_then(|(column, needle)| {
            self.columns
                .iter()
                .any(|c| c == column)
                .then(|| (column.to_string(), needle.to_lowercase()))
        });

        let matches = |record: &Record| -> bool {
            match &restricted {
                Some((column, needle)) => record.get(column).to_lowercase().contains(needle),
                None => {
                    let needle = query.to_lowercase();
                    SEARCH_COLUMNS
                        .iter()
                        .any(|column| record.get(column).to_lowercase().contains(&needle))
                }
            }
        };

        self.iter()
            .filter(|(_, record)| matches(record))
            .map(|(id, _)| id)
            .collect()
    }

    /// Redefine the active column order.
    ///
    /// Existing records keep their values; columns removed from the header
    /// are refused while any record still populates them, unless `force`.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownColumn`] naming the first populated column that
    /// would be dropped.
    pub fn set_header(&mut self, columns: &[String], force: bool) -> Result<(), StoreError> {
        if !force {
            for dropped in self.columns.iter().filter(|c| !columns.contains(*c)) {
                let populated = self
                    .iter()
                    .filter(|(_, record)| record.has_value(dropped))
                    .count();
                if populated > 0 {
                    return Err(StoreError::UnknownColumn {
                        column: dropped.clone(),
                        records: populated,
                    });
                }
            }
        }
        self.columns = columns.to_vec();
        self.modified = true;
        Ok(())
    }

    fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
            self.modified = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeutil::FixedClock;

    fn fixed_store() -> RecordStore {
        RecordStore::with_clock(Box::new(FixedClock::new("2024-05-01 10:20:30")))
    }

    #[test]
    fn new_store_has_default_header() {
        let store = RecordStore::new();
        assert_eq!(store.columns(), DEFAULT_COLUMNS);
        assert!(store.is_empty());
        assert!(!store.is_modified());
    }

    #[test]
    fn add_stamps_mtime_and_marks_modified() {
        let mut store = fixed_store();
        let id = store.add(&[("site", "Example"), ("user", "johny")]).unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.get("site"), "Example");
        assert_eq!(record.get("mtime"), "2024-05-01 10:20:30");
        assert!(store.is_modified());
    }

    #[test]
    fn add_rejects_explicit_mtime() {
        let mut store = fixed_store();
        assert!(matches!(
            store.add(&[("mtime", "2000-01-01 00:00:00")]),
            Err(StoreError::MtimeReadOnly)
        ));
    }

    #[test]
    fn add_rejects_tab_in_value() {
        let mut store = fixed_store();
        assert!(matches!(
            store.add(&[("site", "has\ttab")]),
            Err(StoreError::TableSyntax { .. })
        ));
    }

    #[test]
    fn modify_refreshes_mtime_and_keeps_position() {
        let mut store = RecordStore::with_clock(Box::new(FixedClock::new("2024-01-01 00:00:00")));
        let first = store.add(&[("site", "a")]).unwrap();
        let second = store.add(&[("site", "b")]).unwrap();

        store.set_clock(Box::new(FixedClock::new("2024-06-01 12:00:00")));
        store.modify(first, &[("user", "johny")]).unwrap();

        let order: Vec<_> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(order, [first, second]);
        assert_eq!(store.get(first).unwrap().get("mtime"), "2024-06-01 12:00:00");
        assert_eq!(store.get(second).unwrap().get("mtime"), "2024-01-01 00:00:00");
    }

    #[test]
    fn delete_invalidates_the_handle() {
        let mut store = fixed_store();
        let id = store.add(&[("site", "a")]).unwrap();
        store.delete(id).unwrap();
        assert!(store.get(id).is_none());
        assert!(matches!(store.delete(id), Err(StoreError::NoSuchRecord)));
        assert!(store.is_empty());
    }

    #[test]
    fn identical_records_are_distinct() {
        let mut store = fixed_store();
        let a = store.add(&[("site", "Example"), ("user", "johny")]).unwrap();
        let b = store.add(&[("site", "Example"), ("user", "johny")]).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.find("Example"), [a, b]);
    }

    #[test]
    fn find_is_case_insensitive_and_ordered() {
        let mut store = fixed_store();
        let a = store.add(&[("site", "Example Site")]).unwrap();
        let _ = store.add(&[("site", "Other")]).unwrap();
        let c = store.add(&[("note", "see example.com")]).unwrap();
        assert_eq!(store.find("EXAMPLE"), [a, c]);
    }

    #[test]
    fn find_empty_query_matches_all() {
        let mut store = fixed_store();
        let a = store.add(&[("site", "a")]).unwrap();
        let b = store.add(&[("site", "b")]).unwrap();
        assert_eq!(store.find(""), [a, b]);
    }

    #[test]
    fn find_column_prefix_restricts() {
        let mut store = fixed_store();
        let a = store.add(&[("site", "github"), ("note", "code")]).unwrap();
        let b = store.add(&[("site", "forge"), ("note", "github backup")]).unwrap();
        assert_eq!(store.find("site:github"), [a]);
        assert_eq!(store.find("note:github"), [b]);
        // Not an active column — falls back to full-text.
        assert_eq!(store.find("nosuch:github"), Vec::<RecordId>::new());
    }

    #[test]
    fn find_does_not_search_password() {
        let mut store = fixed_store();
        let _ = store.add(&[("password", "c2VjcmV0")]).unwrap();
        assert!(store.find("c2VjcmV0").is_empty());
    }

    #[test]
    fn set_header_refuses_data_loss_without_force() {
        let mut store = fixed_store();
        store.add(&[("site", "a"), ("note", "keep me")]).unwrap();
        let narrow: Vec<String> = ["site", "user", "url", "tags", "mtime", "password"]
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        match store.set_header(&narrow, false) {
            Err(StoreError::UnknownColumn { column, records }) => {
                assert_eq!(column, "note");
                assert_eq!(records, 1);
            }
            other => panic!("expected UnknownColumn, got {other:?}"),
        }
        store.set_header(&narrow, true).unwrap();
        assert_eq!(store.columns(), narrow);
    }

    #[test]
    fn set_header_allows_dropping_empty_columns() {
        let mut store = fixed_store();
        store.add(&[("site", "a")]).unwrap();
        let narrow: Vec<String> = ["site", "mtime", "password"]
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        store.set_header(&narrow, false).unwrap();
        assert_eq!(store.columns(), narrow);
    }

    #[test]
    fn insert_keeps_existing_mtime() {
        let mut store = fixed_store();
        let mut record = Record::new();
        record.set("site", "imported");
        record.set("mtime", "2019-12-31 23:59:59");
        let id = store.insert(record).unwrap();
        assert_eq!(store.get(id).unwrap().get("mtime"), "2019-12-31 23:59:59");
    }

    #[test]
    fn insert_stamps_missing_mtime_and_extends_header() {
        let mut store = fixed_store();
        let mut record = Record::new();
        record.set("site", "imported");
        record.set("x-custom", "value");
        let id = store.insert(record).unwrap();
        assert_eq!(store.get(id).unwrap().get("mtime"), "2024-05-01 10:20:30");
        assert!(store.columns().iter().any(|c| c == "x-custom"));
    }

    #[test]
    fn from_parts_is_clean() {
        let mut record = Record::new();
        record.set("site", "a");
        let store = RecordStore::from_parts(vec!["site".into()], vec![record]);
        assert_eq!(store.len(), 1);
        assert!(!store.is_modified());
    }
}
