//! The `[K]\0` binary envelope — header chunks, compression, encryption,
//! integrity check.
//!
//! This module provides:
//! - [`Envelope`] — envelope parameters + derived key, [`Envelope::seal`] /
//!   [`Envelope::open`] for the complete write/read paths
//! - chunk tag constants and the [`Cipher`] / [`Compression`] selectors
//!
//! # File Layout
//!
//! ```text
//! MAGIC (4 B) "[K]\0" | META_SIZE (u32 LE) | META_DATA | DATA
//! ```
//!
//! `META_DATA` is a sequence of TLV chunks: 1-byte tag, 1-byte size, then
//! the value. Integer chunks are little-endian and accept sizes {1,2,4,8};
//! byte-string chunks accept any size 0..=255. The chunk list ends at an
//! END chunk (`00 00`) or at the end of the meta region.
//!
//! | tag | name        | value                                          |
//! |-----|-------------|------------------------------------------------|
//! | 0   | END         | size must be 0                                 |
//! | 1   | DATA_SIZE   | uint — length of the data region               |
//! | 2   | PLAIN_SIZE  | uint — length of the uncompressed plaintext    |
//! | 3   | COMPRESSION | u8 — 0 none, 1 raw deflate (default)           |
//! | 4   | CIPHER      | u8 — 1 xsalsa20poly1305 (default, only known)  |
//! | 5   | KDF         | u8 — 0 raw key, 1 argon2id (default)           |
//! | 6   | KDF_PARAMS  | argon2id: {version, mem_log2, time, lanes}     |
//! | 7   | SALT        | KDF salt (16 bytes by default)                 |
//! | 8   | CRC32       | u32 — checksum of the uncompressed plaintext   |
//!
//! Unknown tags are skipped with a warning — never fatal. Unknown CIPHER,
//! KDF or COMPRESSION *values* are fatal. The data region is
//! `nonce (24) ‖ secretbox output`; bytes past the declared DATA_SIZE are
//! dropped with a warning.
//!
//! The CRC32 is redundant with the Poly1305 MAC; it exists for recovery
//! diagnostics and is always emitted and verified.

use crate::error::CryptoError;
use crate::kdf::{self, Argon2Params, KdfKind};
use crate::memory::{SecretBuffer, SecretBytes};
use crate::secretbox::{self, KEY_LEN, NONCE_LEN, TAG_LEN};
use std::io::{Read, Write};
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes — the NUL marks the file as binary independent of content.
pub const MAGIC: &[u8; 4] = b"[K]\0";

/// Length of the META_SIZE field.
const META_SIZE_LEN: usize = 4;

/// Offset of the meta region (magic + META_SIZE).
const META_OFFSET: usize = 4 + META_SIZE_LEN;

/// Header chunk tags.
pub mod tag {
    /// Terminates the chunk list; size must be 0.
    pub const END: u8 = 0;
    /// Byte length of the data region.
    pub const DATA_SIZE: u8 = 1;
    /// Byte length of the uncompressed plaintext.
    pub const PLAIN_SIZE: u8 = 2;
    /// Compression selector.
    pub const COMPRESSION: u8 = 3;
    /// Cipher selector.
    pub const CIPHER: u8 = 4;
    /// KDF selector.
    pub const KDF: u8 = 5;
    /// KDF parameters; must follow the KDF chunk.
    pub const KDF_PARAMS: u8 = 6;
    /// KDF salt.
    pub const SALT: u8 = 7;
    /// CRC32 of the uncompressed plaintext.
    pub const CRC32: u8 = 8;
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Symmetric cipher selector, as stored in the CIPHER chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cipher {
    /// XSalsa20 + Poly1305 (NaCl secretbox) — the default and only value.
    XSalsa20Poly1305,
}

impl Cipher {
    fn from_value(value: u64) -> Result<Self, CryptoError> {
        match value {
            1 => Ok(Self::XSalsa20Poly1305),
            other => Err(CryptoError::UnknownCipher(other)),
        }
    }

    const fn wire_value(self) -> u8 {
        match self {
            Self::XSalsa20Poly1305 => 1,
        }
    }
}

/// Compression selector, as stored in the COMPRESSION chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Store the plaintext as-is.
    None,
    /// Raw deflate, window bits −15 (no zlib wrapper). The default.
    Deflate,
}

impl Compression {
    fn from_value(value: u64) -> Result<Self, CryptoError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            other => Err(CryptoError::UnknownCompression(other)),
        }
    }

    const fn wire_value(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Deflate => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Envelope parameters plus the derived master key.
///
/// A fresh envelope starts with default parameters and a random salt; an
/// opened envelope carries whatever the file header declared. The key is
/// absent until [`Envelope::set_passphrase`] derives it and is wiped when
/// the envelope drops.
pub struct Envelope {
    kdf: KdfKind,
    kdf_params: Argon2Params,
    cipher: Cipher,
    compression: Compression,
    salt: Vec<u8>,
    key: Option<SecretBytes<KEY_LEN>>,
    warnings: Vec<String>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("kdf", &self.kdf)
            .field("kdf_params", &self.kdf_params)
            .field("cipher", &self.cipher)
            .field("compression", &self.compression)
            .field("key", &self.key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Fresh envelope with default parameters and a random salt.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kdf: KdfKind::Argon2id,
            kdf_params: Argon2Params::default(),
            cipher: Cipher::XSalsa20Poly1305,
            compression: Compression::Deflate,
            salt: secretbox::generate_salt().to_vec(),
            key: None,
            warnings: Vec::new(),
        }
    }

    /// Fresh envelope with explicit Argon2id parameters.
    #[must_use]
    pub fn with_kdf_params(params: Argon2Params) -> Self {
        let mut envelope = Self::new();
        envelope.kdf_params = params;
        envelope
    }

    /// The KDF parameters this envelope derives its key with.
    #[must_use]
    pub const fn kdf_params(&self) -> &Argon2Params {
        &self.kdf_params
    }

    /// Non-fatal diagnostics collected while reading a header
    /// (unknown chunks skipped, trailing bytes dropped).
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Replace the salt with fresh random bytes, invalidating the current
    /// key. A passphrase change re-salts through this before re-deriving.
    pub fn refresh_salt(&mut self) {
        self.salt = secretbox::generate_salt().to_vec();
        self.key = None;
    }

    /// Derive and hold the master key for `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if derivation fails.
    pub fn set_passphrase(&mut self, passphrase: &[u8]) -> Result<(), CryptoError> {
        let key = match self.kdf {
            KdfKind::Raw => kdf::derive_raw(passphrase)?,
            KdfKind::Argon2id => kdf::derive(passphrase, &self.salt, &self.kdf_params)?,
        };
        self.key = Some(key);
        Ok(())
    }

    /// Re-derive from `passphrase` and compare with the held key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if no key is held, or a
    /// derivation error.
    pub fn check_passphrase(&self, passphrase: &[u8]) -> Result<bool, CryptoError> {
        let held = self.require_key()?;
        let candidate = match self.kdf {
            KdfKind::Raw => kdf::derive_raw(passphrase)?,
            KdfKind::Argon2id => kdf::derive(passphrase, &self.salt, &self.kdf_params)?,
        };
        Ok(held.expose() == candidate.expose())
    }

    /// Complete write path: compress, encrypt, emit `magic ‖ header ‖ data`.
    ///
    /// A fresh nonce is chosen on every call; the salt is whatever the
    /// envelope currently holds (callers refresh it per save).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if no passphrase was set or the
    /// plaintext exceeds the u32 size chunks.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.require_key()?;

        let checksum = crc32fast::hash(plaintext);
        let plain_size = chunk_u32(plaintext.len(), "plaintext")?;

        let mut compressed = match self.compression {
            Compression::None => plaintext.to_vec(),
            Compression::Deflate => deflate(plaintext)?,
        };

        let nonce = secretbox::generate_nonce();
        let sealed = secretbox::seal(key, &nonce, &compressed)?;
        compressed.zeroize();

        let data_len = NONCE_LEN.saturating_add(sealed.len());
        let data_size = chunk_u32(data_len, "data region")?;

        let mut meta = Vec::with_capacity(64);
        push_chunk(&mut meta, tag::DATA_SIZE, &data_size.to_le_bytes())?;
        push_chunk(&mut meta, tag::PLAIN_SIZE, &plain_size.to_le_bytes())?;
        push_chunk(&mut meta, tag::COMPRESSION, &[self.compression.wire_value()])?;
        push_chunk(&mut meta, tag::CIPHER, &[self.cipher.wire_value()])?;
        push_chunk(&mut meta, tag::KDF, &[self.kdf.wire_value()])?;
        push_chunk(&mut meta, tag::KDF_PARAMS, &self.kdf_params.encode())?;
        push_chunk(&mut meta, tag::SALT, &self.salt)?;
        push_chunk(&mut meta, tag::CRC32, &checksum.to_le_bytes())?;
        push_chunk(&mut meta, tag::END, &[])?;

        let meta_size = chunk_u32(meta.len(), "header")?;

        let total = META_OFFSET
            .saturating_add(meta.len())
            .saturating_add(data_len);
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&meta_size.to_le_bytes());
        out.extend_from_slice(&meta);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Complete read path: parse the header, derive the key from
    /// `passphrase`, decrypt, decompress, verify size and checksum.
    ///
    /// Returns the populated envelope (parameters as found in the file,
    /// key held, warnings recorded) and the plaintext.
    ///
    /// # Errors
    ///
    /// Each failure mode has its own [`CryptoError`] kind — see the module
    /// docs. A wrong passphrase surfaces as [`CryptoError::AuthFailure`].
    pub fn open(data: &[u8], passphrase: &[u8]) -> Result<(Self, SecretBuffer), CryptoError> {
        let mut envelope = Self::new();
        let header = envelope.read_header(data)?;

        let body = &data[header.data_offset..];
        let declared = match header.data_size {
            Some(size) => {
                let size = usize::try_from(size).map_err(|_| CryptoError::TruncatedData {
                    expected: usize::MAX,
                    actual: body.len(),
                })?;
                if size > body.len() {
                    return Err(CryptoError::TruncatedData {
                        expected: size,
                        actual: body.len(),
                    });
                }
                size
            }
            // DATA_SIZE is optional; without it the data region runs to EOF.
            None => body.len(),
        };
        if declared < body.len() {
            envelope.warn(format!(
                "{} trailing byte(s) after the data region were ignored",
                body.len().saturating_sub(declared)
            ));
        }
        let region = &body[..declared];

        envelope.set_passphrase(passphrase)?;
        let plaintext = envelope.unseal_region(region, header.plain_size, header.checksum)?;
        Ok((envelope, plaintext))
    }

    // -- internals ----------------------------------------------------------

    pub(crate) fn require_key(&self) -> Result<&SecretBytes<KEY_LEN>, CryptoError> {
        self.key
            .as_ref()
            .ok_or_else(|| CryptoError::Encryption("no key: set a passphrase first".into()))
    }

    /// Parse the magic, META_SIZE and all chunks, updating the envelope's
    /// parameters in place. Returns the sizes needed to locate and verify
    /// the data region.
    fn read_header(&mut self, data: &[u8]) -> Result<ParsedHeader, CryptoError> {
        if data.len() < META_OFFSET {
            return Err(CryptoError::TruncatedHeader { offset: data.len() });
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::BadMagic);
        }

        let meta_size_bytes: [u8; META_SIZE_LEN] = data[MAGIC.len()..META_OFFSET]
            .try_into()
            .map_err(|_| CryptoError::TruncatedHeader { offset: data.len() })?;
        let meta_size = u32::from_le_bytes(meta_size_bytes) as usize;
        let meta_end = META_OFFSET
            .checked_add(meta_size)
            .ok_or(CryptoError::TruncatedHeader { offset: data.len() })?;
        if meta_end > data.len() {
            return Err(CryptoError::TruncatedHeader { offset: data.len() });
        }
        let meta = &data[META_OFFSET..meta_end];

        let mut parsed = ParsedHeader {
            data_offset: meta_end,
            data_size: None,
            plain_size: None,
            checksum: None,
        };

        let mut cursor = 0usize;
        loop {
            // Implicit end — no terminator chunk, meta region exhausted.
            if cursor == meta.len() {
                break;
            }
            let value_start = cursor.checked_add(2).ok_or(CryptoError::MalformedHeader(
                "chunk offset overflow".into(),
            ))?;
            if value_start > meta.len() {
                return Err(CryptoError::MalformedHeader(format!(
                    "dangling chunk byte at meta offset {cursor}"
                )));
            }
            let chunk_tag = meta[cursor];
            let size = usize::from(meta[cursor.saturating_add(1)]);

            if chunk_tag == tag::END {
                if size != 0 {
                    return Err(CryptoError::MalformedHeader(format!(
                        "END chunk with nonzero size {size}"
                    )));
                }
                break;
            }

            let value_end =
                value_start
                    .checked_add(size)
                    .ok_or(CryptoError::MalformedHeader(
                        "chunk offset overflow".into(),
                    ))?;
            if value_end > meta.len() {
                return Err(CryptoError::TruncatedHeader {
                    offset: META_OFFSET.saturating_add(meta.len()),
                });
            }
            let value = &meta[value_start..value_end];
            cursor = value_end;

            match chunk_tag {
                tag::DATA_SIZE => parsed.data_size = Some(decode_uint(value)?),
                tag::PLAIN_SIZE => parsed.plain_size = Some(decode_uint(value)?),
                tag::COMPRESSION => {
                    self.compression = Compression::from_value(decode_uint(value)?)?;
                }
                tag::CIPHER => self.cipher = Cipher::from_value(decode_uint(value)?)?,
                tag::KDF => {
                    self.kdf = KdfKind::from_value(decode_uint(value)?)?;
                    self.kdf_params = Argon2Params::default();
                }
                tag::KDF_PARAMS => match self.kdf {
                    KdfKind::Argon2id => self.kdf_params = Argon2Params::decode(value)?,
                    KdfKind::Raw => {
                        self.warn("KDF_PARAMS chunk ignored for raw KDF".into());
                    }
                },
                tag::SALT => self.salt = value.to_vec(),
                tag::CRC32 => {
                    let raw = decode_uint(value)?;
                    let checksum = u32::try_from(raw).map_err(|_| {
                        CryptoError::MalformedHeader(format!("CRC32 value {raw} exceeds 32 bits"))
                    })?;
                    parsed.checksum = Some(checksum);
                }
                unknown => {
                    // Forward compatibility: likely written by a newer
                    // version. Skip using the declared size.
                    self.warn(format!(
                        "unknown header chunk (tag {unknown}, size {size}) was skipped"
                    ));
                }
            }
        }

        Ok(parsed)
    }

    /// Decrypt and decompress a data region, then verify PLAIN_SIZE and
    /// CRC32 when the header carried them.
    fn unseal_region(
        &self,
        region: &[u8],
        plain_size: Option<u64>,
        checksum: Option<u32>,
    ) -> Result<SecretBuffer, CryptoError> {
        let min_len = NONCE_LEN.saturating_add(TAG_LEN);
        if region.len() < min_len {
            return Err(CryptoError::TruncatedData {
                expected: min_len,
                actual: region.len(),
            });
        }
        let (nonce_bytes, sealed) = region.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::AuthFailure)?;

        let key = self.require_key()?;
        let compressed = secretbox::open(key, &nonce, sealed)?;

        let plaintext = match self.compression {
            Compression::None => compressed,
            Compression::Deflate => {
                let hint = plain_size.and_then(|s| usize::try_from(s).ok());
                SecretBuffer::from_vec(inflate(compressed.expose(), hint)?)
            }
        };

        if let Some(expected) = plain_size {
            if u64::try_from(plaintext.len()).ok() != Some(expected) {
                return Err(CryptoError::IntegrityFailure(format!(
                    "plaintext is {} bytes, header declares {expected}",
                    plaintext.len()
                )));
            }
        }
        if let Some(expected) = checksum {
            let actual = crc32fast::hash(plaintext.expose());
            if actual != expected {
                return Err(CryptoError::IntegrityFailure(format!(
                    "CRC32 mismatch: computed {actual:#010x}, header declares {expected:#010x}"
                )));
            }
        }

        Ok(plaintext)
    }

    /// Encrypt a single value under the envelope key with a fresh nonce,
    /// returning `nonce ‖ secretbox output`. Used by the password cryptor.
    pub(crate) fn seal_value(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.require_key()?;
        let nonce = secretbox::generate_nonce();
        let sealed = secretbox::seal(key, &nonce, plaintext)?;
        let mut out = Vec::with_capacity(NONCE_LEN.saturating_add(sealed.len()));
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Reverse of [`Envelope::seal_value`].
    pub(crate) fn open_value(&self, data: &[u8]) -> Result<SecretBuffer, CryptoError> {
        if data.len() < NONCE_LEN.saturating_add(TAG_LEN) {
            return Err(CryptoError::AuthFailure);
        }
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::AuthFailure)?;
        secretbox::open(self.require_key()?, &nonce, sealed)
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}

/// Sizes and checksum pulled out of a parsed header.
struct ParsedHeader {
    data_offset: usize,
    data_size: Option<u64>,
    plain_size: Option<u64>,
    checksum: Option<u32>,
}

// ---------------------------------------------------------------------------
// Chunk helpers
// ---------------------------------------------------------------------------

/// Append one TLV chunk. Values are limited to 255 bytes by the 1-byte size.
fn push_chunk(out: &mut Vec<u8>, chunk_tag: u8, value: &[u8]) -> Result<(), CryptoError> {
    let size = u8::try_from(value.len()).map_err(|_| {
        CryptoError::Encryption(format!(
            "chunk value of {} bytes exceeds the 255-byte limit",
            value.len()
        ))
    })?;
    out.push(chunk_tag);
    out.push(size);
    out.extend_from_slice(value);
    Ok(())
}

/// Decode a little-endian unsigned integer chunk value (sizes 1, 2, 4, 8).
fn decode_uint(value: &[u8]) -> Result<u64, CryptoError> {
    match *value {
        [a] => Ok(u64::from(a)),
        [a, b] => Ok(u64::from(u16::from_le_bytes([a, b]))),
        [a, b, c, d] => Ok(u64::from(u32::from_le_bytes([a, b, c, d]))),
        [a, b, c, d, e, f, g, h] => Ok(u64::from_le_bytes([a, b, c, d, e, f, g, h])),
        _ => Err(CryptoError::MalformedHeader(format!(
            "integer chunk with invalid size {}",
            value.len()
        ))),
    }
}

/// Clamp a length to the u32 emitted in size chunks.
fn chunk_u32(len: usize, what: &str) -> Result<u32, CryptoError> {
    u32::try_from(len)
        .map_err(|_| CryptoError::Encryption(format!("{what} of {len} bytes is too large")))
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// Raw deflate (window bits −15), best compression — what the format calls
/// COMPRESSION = 1.
fn deflate(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| CryptoError::Encryption(format!("deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CryptoError::Encryption(format!("deflate failed: {e}")))
}

/// Inverse of [`deflate`]. A corrupt stream after a verified MAC means the
/// writer produced garbage, so this reports an integrity failure.
fn inflate(data: &[u8], size_hint: Option<usize>) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(size_hint.unwrap_or(data.len()));
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| CryptoError::IntegrityFailure(format!("inflate failed: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
