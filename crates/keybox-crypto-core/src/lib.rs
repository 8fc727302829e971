//! `keybox-crypto-core` — cipher primitives and the `[K]\0` binary envelope
//! for keybox.
//!
//! This crate is the self-contained byte-level layer: zero filesystem, zero
//! UI concerns. It covers key derivation (Argon2id with file-carried
//! parameters), NaCl secretbox authenticated encryption, the TLV envelope
//! with optional deflate compression and CRC32 integrity check, and the
//! per-password inner encryption. Record handling and file lifecycle live
//! in `keybox-store`.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::arithmetic_side_effects
    )
)]

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod memory;
pub mod pwcrypt;
pub mod secretbox;

pub use envelope::{Cipher, Compression, Envelope, MAGIC};
pub use error::CryptoError;
pub use kdf::{Argon2Params, KdfKind, KEY_LEN};
pub use memory::{SecretBuffer, SecretBytes};
pub use pwcrypt::{decrypt_password, encrypt_password};
pub use secretbox::{NONCE_LEN, SALT_LEN, TAG_LEN};
