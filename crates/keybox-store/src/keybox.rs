//! The keybox facade — open, create, save, passphrase change.
//!
//! Orchestrates the envelope and the record store, keeps record passwords
//! inner-encrypted while they sit in memory, and replaces the on-disk file
//! atomically on save. Key material lives inside the envelope and is wiped
//! when the `Keybox` drops.
//!
//! State machine:
//!
//! ```text
//! NEW --create--> OPEN(dirty) --save--> OPEN(clean)
//! EXISTING --open(pwd)--> OPEN(clean) | AuthFailure
//! OPEN(*) --mutate--> OPEN(dirty)
//! OPEN(dirty) --save--> OPEN(clean)
//! OPEN(*) --drop--> key material zeroized
//! ```

use std::path::{Path, PathBuf};

use keybox_crypto_core::{decrypt_password, encrypt_password, Argon2Params, CryptoError, Envelope};
use zeroize::Zeroizing;

use crate::error::StoreError;
use crate::record::{Record, PASSWORD};
use crate::store::{RecordId, RecordStore};
use crate::storage;
use crate::table::{format_table, parse_table};
use crate::timeutil::Clock;

/// Source of passphrases for interactive flows.
///
/// `prompt` asks for the passphrase of an existing file; `confirm` asks for
/// re-entry when a new passphrase is being established.
pub trait PassphraseProvider {
    /// Ask the user for a passphrase.
    ///
    /// # Errors
    ///
    /// Implementations surface their own I/O failures.
    fn prompt(&mut self) -> Result<String, StoreError>;

    /// Ask the user to confirm `passphrase`; `true` when the re-entry
    /// matches.
    ///
    /// # Errors
    ///
    /// Implementations surface their own I/O failures.
    fn confirm(&mut self, passphrase: &str) -> Result<bool, StoreError>;
}

/// An open keybox file: record store + envelope + path.
pub struct Keybox {
    store: RecordStore,
    envelope: Envelope,
    path: PathBuf,
    rekeyed: bool,
}

impl std::fmt::Debug for Keybox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keybox")
            .field("path", &self.path)
            .field("records", &self.store.len())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl Keybox {
    /// Create a new empty keybox at `path` and write it immediately.
    ///
    /// The header starts as the default column list. `kdf_params` overrides
    /// the Argon2id tuning stored in the file.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyboxExists`] if `path` already exists; otherwise
    /// derivation, encoding or I/O errors.
    pub fn create(
        path: &Path,
        passphrase: &str,
        kdf_params: Option<Argon2Params>,
    ) -> Result<Self, StoreError> {
        if path.exists() {
            return Err(StoreError::KeyboxExists(path.display().to_string()));
        }

        let mut envelope = match kdf_params {
            Some(params) => Envelope::with_kdf_params(params),
            None => Envelope::new(),
        };
        envelope.set_passphrase(passphrase.as_bytes())?;

        let mut keybox = Self {
            store: RecordStore::new(),
            envelope,
            path: path.to_path_buf(),
            rekeyed: false,
        };
        keybox.save()?;
        Ok(keybox)
    }

    /// Create with an interactive prompt + confirmation.
    ///
    /// # Errors
    ///
    /// [`StoreError::PassphraseMismatch`] when the confirmation differs,
    /// plus everything [`Keybox::create`] can return.
    pub fn create_with_provider(
        path: &Path,
        provider: &mut dyn PassphraseProvider,
        kdf_params: Option<Argon2Params>,
    ) -> Result<Self, StoreError> {
        let passphrase = provider.prompt()?;
        if !provider.confirm(&passphrase)? {
            return Err(StoreError::PassphraseMismatch);
        }
        Self::create(path, &passphrase, kdf_params)
    }

    /// Open an existing keybox, asking `provider` for the passphrase.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyboxNotFound`] when the file is missing; a wrong
    /// passphrase surfaces as [`CryptoError::AuthFailure`] through the
    /// `Crypto` variant and no keybox is returned.
    ///
    /// [`CryptoError::AuthFailure`]: keybox_crypto_core::CryptoError::AuthFailure
    pub fn open(path: &Path, provider: &mut dyn PassphraseProvider) -> Result<Self, StoreError> {
        let passphrase = provider.prompt()?;
        Self::open_with_passphrase(path, &passphrase)
    }

    /// Open an existing keybox with a passphrase already in hand.
    ///
    /// # Errors
    ///
    /// See [`Keybox::open`].
    pub fn open_with_passphrase(path: &Path, passphrase: &str) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::KeyboxNotFound(path.display().to_string()));
        }
        let data = std::fs::read(path)?;
        let (envelope, columns, records) = decrypt_foreign(&data, passphrase)?;
        Ok(Self {
            store: RecordStore::from_parts(columns, records),
            envelope,
            path: path.to_path_buf(),
            rekeyed: false,
        })
    }

    /// The file this keybox reads from and saves to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` when there are unwritten changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.rekeyed || self.store.is_modified()
    }

    /// Read access to the record store.
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Replace the store's clock (deterministic tests).
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.store.set_clock(clock);
    }

    /// Add a record. A `password` field is inner-encrypted before it enters
    /// the store; everything else is stored verbatim.
    ///
    /// # Errors
    ///
    /// Validation errors from the store, or encryption errors.
    pub fn add_record(&mut self, fields: &[(&str, &str)]) -> Result<RecordId, StoreError> {
        let encrypted = self.encrypt_password_field(fields)?;
        let borrowed: Vec<(&str, &str)> = encrypted
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
            .collect();
        self.store.add(&borrowed)
    }

    /// Modify fields of an existing record (refreshes its mtime).
    ///
    /// # Errors
    ///
    /// Same as [`Keybox::add_record`], plus [`StoreError::NoSuchRecord`].
    pub fn modify_record(
        &mut self,
        id: RecordId,
        fields: &[(&str, &str)],
    ) -> Result<(), StoreError> {
        let encrypted = self.encrypt_password_field(fields)?;
        let borrowed: Vec<(&str, &str)> = encrypted
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
            .collect();
        self.store.modify(id, &borrowed)
    }

    /// Delete a record by identity.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchRecord`] for a dead handle.
    pub fn delete_record(&mut self, id: RecordId) -> Result<(), StoreError> {
        self.store.delete(id)
    }

    /// Decrypt and return the password of a record. Empty stays empty.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoSuchRecord`], or decryption failures.
    pub fn password(&self, id: RecordId) -> Result<String, StoreError> {
        let record = self.store.get(id).ok_or(StoreError::NoSuchRecord)?;
        let cryptogram = record.get(PASSWORD);
        if cryptogram.is_empty() {
            return Ok(String::new());
        }
        Ok(decrypt_password(&self.envelope, cryptogram)?)
    }

    /// Substring search (see [`RecordStore::find`]).
    #[must_use]
    pub fn find(&self, query: &str) -> Vec<RecordId> {
        self.store.find(query)
    }

    /// Redefine the active column order (see [`RecordStore::set_header`]).
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownColumn`] on data loss without `force`.
    pub fn set_header(&mut self, columns: &[String], force: bool) -> Result<(), StoreError> {
        self.store.set_header(columns, force)
    }

    /// Encode, encrypt and atomically replace the file.
    ///
    /// A fresh nonce is chosen by the envelope; the active header is
    /// rewritten in its current order. On success the keybox is clean.
    ///
    /// # Errors
    ///
    /// Encoding, encryption or I/O errors; the existing file is untouched
    /// on failure.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let text = format_table(self.store.columns(), self.store.iter().map(|(_, r)| r))?;
        let sealed = self.envelope.seal(text.as_bytes())?;
        storage::atomic_write(&self.path, &sealed)?;
        self.store.mark_saved();
        self.rekeyed = false;
        Ok(())
    }

    /// Check a candidate against the passphrase this keybox is keyed with.
    ///
    /// Callers re-prompting the user (passphrase change, re-auth before a
    /// sensitive operation) verify through this instead of holding the
    /// passphrase themselves.
    ///
    /// # Errors
    ///
    /// Derivation errors only — a mismatch is `Ok(false)`.
    pub fn check_passphrase(&self, passphrase: &str) -> Result<bool, StoreError> {
        Ok(self.envelope.check_passphrase(passphrase.as_bytes())?)
    }

    /// Re-key the keybox to a new passphrase.
    ///
    /// The current passphrase must verify first; then the key is re-derived
    /// with the same KDF parameters and a fresh salt, every stored password
    /// is re-encrypted under it, and the keybox is marked dirty — the
    /// envelope itself is rewritten on the next [`Keybox::save`]. The old
    /// key is overwritten by the re-derivation.
    ///
    /// # Errors
    ///
    /// `AuthFailure` (through the `Crypto` variant) when `current` does not
    /// verify, leaving the keybox on the old key, as do decryption errors.
    /// A derivation failure after the salt has been replaced leaves the
    /// keybox without a key; discard the instance in that case.
    pub fn change_passphrase(
        &mut self,
        current: &str,
        new_passphrase: &str,
    ) -> Result<(), StoreError> {
        if !self.envelope.check_passphrase(current.as_bytes())? {
            return Err(StoreError::Crypto(CryptoError::AuthFailure));
        }

        // Unwrap every password while the old key is still in place; a
        // failure here leaves the keybox untouched. The plaintexts are
        // wiped when they drop, error paths included.
        let mut plaintexts: Vec<(RecordId, Zeroizing<String>)> = Vec::new();
        for (id, record) in self.store.iter() {
            let cryptogram = record.get(PASSWORD);
            if cryptogram.is_empty() {
                continue;
            }
            plaintexts.push((
                id,
                Zeroizing::new(decrypt_password(&self.envelope, cryptogram)?),
            ));
        }

        self.envelope.refresh_salt();
        self.envelope.set_passphrase(new_passphrase.as_bytes())?;

        for (id, plaintext) in &plaintexts {
            let cryptogram = encrypt_password(&self.envelope, plaintext)?;
            self.store.set_field_raw(*id, PASSWORD, cryptogram)?;
        }

        self.rekeyed = true;
        Ok(())
    }

    /// Inner-encrypt the `password` entry of a field list, leaving the rest
    /// untouched.
    fn encrypt_password_field(
        &self,
        fields: &[(&str, &str)],
    ) -> Result<Vec<(String, String)>, StoreError> {
        fields
            .iter()
            .map(|(column, value)| {
                let value = if *column == PASSWORD && !value.is_empty() {
                    encrypt_password(&self.envelope, value)?
                } else {
                    (*value).to_string()
                };
                Ok(((*column).to_string(), value))
            })
            .collect()
    }

    /// Import one externally-parsed record whose password is plaintext.
    /// Used by the plain/JSON/keybox importers.
    pub(crate) fn import_record(&mut self, mut record: Record) -> Result<RecordId, StoreError> {
        let plaintext = record.get(PASSWORD).to_string();
        if plaintext.is_empty() {
            record.set(PASSWORD, "");
        } else {
            record.set(PASSWORD, encrypt_password(&self.envelope, &plaintext)?);
        }
        self.store.insert(record)
    }
}

/// Decrypt raw keybox file bytes into envelope + header + records.
/// Shared between [`Keybox::open_with_passphrase`] and the keybox-format
/// importer, which reads a foreign file with its own passphrase.
pub(crate) fn decrypt_foreign(
    data: &[u8],
    passphrase: &str,
) -> Result<(Envelope, Vec<String>, Vec<Record>), StoreError> {
    let (envelope, plaintext) = Envelope::open(data, passphrase.as_bytes())?;
    let text = std::str::from_utf8(plaintext.expose()).map_err(|_| StoreError::TableSyntax {
        place: "line 1".into(),
        reason: "decrypted table is not valid UTF-8".into(),
    })?;
    let (columns, records) = parse_table(text)?;
    Ok((envelope, columns, records))
}
