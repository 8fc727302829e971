//! Per-password inner encryption.
//!
//! Each password is encrypted independently under the *same* master key as
//! the outer envelope, with its own fresh nonce, and stored as
//! `base64(nonce ‖ secretbox output)`. This adds no cryptographic strength
//! over the envelope — it keeps decrypted passwords out of memory until a
//! caller explicitly asks for one. The key never leaves the envelope; this
//! module reaches it through a crate-internal interface.

use crate::envelope::Envelope;
use crate::error::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encrypt a password under the envelope's key.
///
/// Returns the Base64 cryptogram stored in the record table. Encrypting the
/// same password twice yields different cryptograms (fresh nonce per call).
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the envelope holds no key.
pub fn encrypt_password(envelope: &Envelope, password: &str) -> Result<String, CryptoError> {
    let sealed = envelope.seal_value(password.as_bytes())?;
    Ok(STANDARD.encode(sealed))
}

/// Decrypt a password cryptogram produced by [`encrypt_password`].
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] for invalid Base64 or non-UTF-8
/// plaintext, [`CryptoError::AuthFailure`] for a wrong key or tampering.
pub fn decrypt_password(envelope: &Envelope, cryptogram: &str) -> Result<String, CryptoError> {
    let raw = STANDARD
        .decode(cryptogram)
        .map_err(|e| CryptoError::Encryption(format!("invalid password cryptogram: {e}")))?;
    let plain = envelope.open_value(&raw)?;
    String::from_utf8(plain.expose().to_vec())
        .map_err(|_| CryptoError::Encryption("password is not valid UTF-8".into()))
}
