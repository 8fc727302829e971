//! Cryptographic and envelope error types for `keybox-crypto-core`.

use thiserror::Error;

/// Errors produced by cipher primitives and the binary envelope codec.
///
/// Every variant is a distinct failure category; callers map them to exit
/// codes or user messages without string matching.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The file does not start with the `[K]\0` magic bytes.
    #[error("not a keybox file: bad magic")]
    BadMagic,

    /// A declared header size extends past the available bytes.
    #[error("truncated header: input ends at byte {offset}")]
    TruncatedHeader {
        /// Byte offset at which the input ran out.
        offset: usize,
    },

    /// The declared ciphertext size exceeds the available bytes.
    #[error("truncated data: {expected} bytes declared, {actual} available")]
    TruncatedData {
        /// Bytes declared by the DATA_SIZE chunk (or required minimum).
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// The chunk structure itself is invalid (bad integer width, nonzero
    /// END size, short KDF parameter block).
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The CIPHER chunk carries a value this implementation does not know.
    #[error("unknown cipher id {0}")]
    UnknownCipher(u64),

    /// The KDF chunk carries a value this implementation does not know.
    #[error("unknown KDF id {0}")]
    UnknownKdf(u64),

    /// The COMPRESSION chunk carries a value this implementation does not know.
    #[error("unknown compression id {0}")]
    UnknownCompression(u64),

    /// Poly1305 verification failed — wrong passphrase or tampered data.
    #[error("authentication failed: MAC mismatch")]
    AuthFailure,

    /// Post-decryption verification failed (size or CRC32 mismatch,
    /// undecodable compressed stream).
    #[error("integrity check failed: {0}")]
    IntegrityFailure(String),

    /// Argon2id derivation failed or its parameters are unusable.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption-side failure (no key set, oversized input, bad cryptogram
    /// encoding).
    #[error("encryption error: {0}")]
    Encryption(String),
}
