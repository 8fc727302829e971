//! Zeroizing containers for key material and decrypted plaintext.
//!
//! Two wrappers cover the crate's needs:
//! - [`SecretBytes`] — fixed-size secrets (keys), wiped on drop
//! - [`SecretBuffer`] — variable-length secrets (decrypted table text,
//!   passwords), wiped on drop via [`secrecy`]
//!
//! Both mask their `Debug`/`Display` output so secrets never reach logs.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Fixed-size secret — keys, raw passphrase material.
///
/// The bytes are erased when the value goes out of scope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> SecretBytes<N> {
    /// Wrap a fixed-size array. The caller should zeroize its own copy
    /// afterwards (arrays are `Copy`).
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    /// Create a `SecretBytes` filled from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the CSPRNG is unavailable.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; N];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::Encryption(format!("CSPRNG fill failed: {e}")))?;
        let secret = Self::new(bytes);
        bytes.zeroize();
        Ok(secret)
    }

    /// Expose the raw bytes for a cryptographic operation. Keep the borrow
    /// short-lived; never copy the result into an unprotected buffer.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self::new(bytes)
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> fmt::Display for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

/// Variable-length secret — decrypted envelope plaintext and passwords.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
}

impl SecretBuffer {
    /// Copy `data` into a new protected allocation.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            inner: data.to_vec().into(),
        }
    }

    /// Take ownership of an existing buffer without copying. The vector's
    /// storage is zeroized when the `SecretBuffer` drops.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { inner: data.into() }
    }

    /// Expose the underlying bytes. Keep the borrow short-lived.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

impl fmt::Display for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_bytes_roundtrip() {
        let key = SecretBytes::new([0xAB; 32]);
        assert_eq!(key.expose(), &[0xAB; 32]);
    }

    #[test]
    fn secret_bytes_random_produces_distinct_values() {
        let a = SecretBytes::<32>::random().expect("random should succeed");
        let b = SecretBytes::<32>::random().expect("random should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn secret_bytes_debug_is_masked() {
        let key = SecretBytes::<16>::new([0xFF; 16]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretBytes<16>(***)");
        assert!(!debug.contains("ff"));
    }

    #[test]
    fn secret_buffer_holds_content() {
        let buf = SecretBuffer::new(b"decrypted table");
        assert_eq!(buf.expose(), b"decrypted table");
        assert_eq!(buf.len(), 15);
        assert!(!buf.is_empty());
    }

    #[test]
    fn secret_buffer_from_vec_keeps_bytes() {
        let buf = SecretBuffer::from_vec(vec![1, 2, 3]);
        assert_eq!(buf.expose(), &[1, 2, 3]);
    }

    #[test]
    fn secret_buffer_empty() {
        let buf = SecretBuffer::new(b"");
        assert!(buf.is_empty());
    }

    #[test]
    fn secret_buffer_debug_is_masked() {
        let buf = SecretBuffer::new(b"top secret");
        assert_eq!(format!("{buf:?}"), "SecretBuffer(***)");
        assert_eq!(format!("{buf}"), "SecretBuffer(***)");
    }
}
