//! NaCl `crypto_secretbox` — XSalsa20 stream cipher + Poly1305 MAC.
//!
//! This module provides:
//! - [`seal`] — encrypt and authenticate, output = `tag ‖ ciphertext`
//! - [`open`] — verify and decrypt, returning a [`SecretBuffer`]
//! - [`generate_nonce`] / [`generate_salt`] — fresh CSPRNG bytes
//!
//! The wire layout matches NaCl exactly: the 16-byte Poly1305 tag is a
//! *prefix*, so sealed output is always `plaintext length + 16`. The tag is
//! verified before any plaintext is produced.

use crate::error::CryptoError;
use crate::memory::{SecretBuffer, SecretBytes};
use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::{Key, Nonce, Tag, XSalsa20Poly1305};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

/// Key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (192 bits — random nonces are safe).
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// KDF salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Encrypt `plaintext` under `key` and `nonce`.
///
/// Output is `tag (16) ‖ ciphertext (len(plaintext))`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the underlying cipher fails
/// (it cannot for valid key/nonce lengths, which the types enforce).
pub fn seal(
    key: &SecretBytes<KEY_LEN>,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.expose()));

    let mut buffer = plaintext.to_vec();
    let tag = match cipher.encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer) {
        Ok(tag) => tag,
        Err(_) => {
            buffer.zeroize();
            return Err(CryptoError::Encryption("secretbox seal failed".into()));
        }
    };

    let mut out = Vec::with_capacity(TAG_LEN.saturating_add(buffer.len()));
    out.extend_from_slice(tag.as_slice());
    out.extend_from_slice(&buffer);
    Ok(out)
}

/// Verify and decrypt `sealed` (as produced by [`seal`]).
///
/// # Errors
///
/// Returns [`CryptoError::AuthFailure`] if the input is shorter than a tag
/// or the MAC does not verify — wrong key, wrong nonce, or tampered bytes.
/// No partial plaintext is ever returned.
pub fn open(
    key: &SecretBytes<KEY_LEN>,
    nonce: &[u8; NONCE_LEN],
    sealed: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    if sealed.len() < TAG_LEN {
        return Err(CryptoError::AuthFailure);
    }
    let (tag_bytes, ciphertext) = sealed.split_at(TAG_LEN);

    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.expose()));

    let mut buffer = ciphertext.to_vec();
    if cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag_bytes),
        )
        .is_err()
    {
        buffer.zeroize();
        return Err(CryptoError::AuthFailure);
    }

    Ok(SecretBuffer::from_vec(buffer))
}

/// Fresh random nonce from the OS CSPRNG.
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Fresh random KDF salt from the OS CSPRNG.
#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
