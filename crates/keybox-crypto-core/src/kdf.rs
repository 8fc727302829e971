//! Passphrase-to-key derivation.
//!
//! The envelope stores its own KDF tuning so the cost can be raised later
//! without breaking old files. Two kinds exist on the wire:
//! - `0` — raw: the passphrase bytes *are* the 32-byte key (no stretching)
//! - `1` — Argon2id (default), parameters carried in the KDF_PARAMS chunk
//!
//! The Argon2id wire parameters are exactly 4 bytes:
//! `{version, mem_cost_log2, time_cost, parallelism}` — memory use is
//! `2^mem_cost_log2` KiB.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use zeroize::Zeroize;

/// Derived key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Key derivation function selector, as stored in the KDF chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KdfKind {
    /// No derivation — the passphrase is used as the key verbatim.
    Raw,
    /// Argon2id with parameters from the KDF_PARAMS chunk.
    Argon2id,
}

impl KdfKind {
    /// Map a KDF chunk value to a kind.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKdf`] for values this implementation
    /// does not know — unlike unknown chunk *tags*, an unknown KDF is fatal.
    pub fn from_value(value: u64) -> Result<Self, CryptoError> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Argon2id),
            other => Err(CryptoError::UnknownKdf(other)),
        }
    }

    /// Wire value for the KDF chunk.
    #[must_use]
    pub const fn wire_value(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Argon2id => 1,
        }
    }
}

/// Argon2id parameter set, as stored in the KDF_PARAMS chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Argon2Params {
    /// Argon2 version byte (0x10 or 0x13).
    pub version: u8,
    /// Memory cost as log2 KiB — actual memory is `2^mem_cost_log2` KiB.
    pub mem_cost_log2: u8,
    /// Number of passes.
    pub time_cost: u8,
    /// Number of lanes.
    pub parallelism: u8,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            version: 0x13,
            mem_cost_log2: 16, // 64 MiB
            time_cost: 3,
            parallelism: 1,
        }
    }
}

impl Argon2Params {
    /// Serialized length of the KDF_PARAMS chunk value.
    pub const WIRE_LEN: usize = 4;

    /// Encode to the 4-byte chunk value.
    #[must_use]
    pub const fn encode(&self) -> [u8; Self::WIRE_LEN] {
        [
            self.version,
            self.mem_cost_log2,
            self.time_cost,
            self.parallelism,
        ]
    }

    /// Decode from a KDF_PARAMS chunk value.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedHeader`] if the value is not exactly
    /// 4 bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, CryptoError> {
        let [version, mem_cost_log2, time_cost, parallelism] = *raw else {
            return Err(CryptoError::MalformedHeader(format!(
                "KDF_PARAMS must be {} bytes, got {}",
                Self::WIRE_LEN,
                raw.len()
            )));
        };
        Ok(Self {
            version,
            mem_cost_log2,
            time_cost,
            parallelism,
        })
    }

    /// Memory cost in KiB, as the `argon2` crate expects it.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if `mem_cost_log2` does not
    /// fit a `u32` (log2 ≥ 32).
    pub fn mem_cost_kib(&self) -> Result<u32, CryptoError> {
        1u32.checked_shl(u32::from(self.mem_cost_log2))
            .ok_or_else(|| {
                CryptoError::KeyDerivation(format!(
                    "memory cost 2^{} KiB out of range",
                    self.mem_cost_log2
                ))
            })
    }
}

/// Derive a 256-bit key from a passphrase and salt using Argon2id.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the version byte is unknown,
/// the parameters are rejected by the `argon2` crate, or derivation itself
/// fails (e.g. memory allocation).
pub fn derive(
    passphrase: &[u8],
    salt: &[u8],
    params: &Argon2Params,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let version = match params.version {
        0x10 => argon2::Version::V0x10,
        0x13 => argon2::Version::V0x13,
        other => {
            return Err(CryptoError::KeyDerivation(format!(
                "unsupported argon2 version 0x{other:02x}"
            )));
        }
    };

    let argon2_params = argon2::Params::new(
        params.mem_cost_kib()?,
        u32::from(params.time_cost),
        u32::from(params.parallelism),
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, version, argon2_params);

    let mut output = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2id derivation failed: {e}")))?;

    let key = SecretBytes::new(output);
    output.zeroize();
    Ok(key)
}

/// "Derive" a key for [`KdfKind::Raw`] — the passphrase bytes are the key.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] unless the passphrase is exactly
/// 32 bytes.
pub fn derive_raw(passphrase: &[u8]) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let bytes: [u8; KEY_LEN] = passphrase.try_into().map_err(|_| {
        CryptoError::KeyDerivation(format!(
            "raw KDF requires an exactly {KEY_LEN}-byte passphrase, got {} bytes",
            passphrase.len()
        ))
    })?;
    Ok(SecretBytes::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small parameters so tests stay fast — 1 MiB, single pass.
    const TEST_PARAMS: Argon2Params = Argon2Params {
        version: 0x13,
        mem_cost_log2: 10,
        time_cost: 1,
        parallelism: 1,
    };

    const TEST_SALT: &[u8; 16] = b"0123456789abcdef";

    #[test]
    fn default_params_match_file_format_defaults() {
        let p = Argon2Params::default();
        assert_eq!(p.version, 0x13);
        assert_eq!(p.mem_cost_log2, 16);
        assert_eq!(p.time_cost, 3);
        assert_eq!(p.parallelism, 1);
        assert_eq!(p.mem_cost_kib().unwrap(), 65_536); // 64 MiB
    }

    #[test]
    fn params_wire_roundtrip() {
        let p = Argon2Params {
            version: 0x13,
            mem_cost_log2: 12,
            time_cost: 2,
            parallelism: 4,
        };
        let wire = p.encode();
        assert_eq!(wire, [0x13, 12, 2, 4]);
        assert_eq!(Argon2Params::decode(&wire).unwrap(), p);
    }

    #[test]
    fn params_decode_rejects_wrong_length() {
        assert!(matches!(
            Argon2Params::decode(&[0x13, 16, 3]),
            Err(CryptoError::MalformedHeader(_))
        ));
        assert!(matches!(
            Argon2Params::decode(&[0x13, 16, 3, 1, 0]),
            Err(CryptoError::MalformedHeader(_))
        ));
    }

    #[test]
    fn kdf_kind_wire_values() {
        assert_eq!(KdfKind::from_value(0).unwrap(), KdfKind::Raw);
        assert_eq!(KdfKind::from_value(1).unwrap(), KdfKind::Argon2id);
        assert_eq!(KdfKind::Argon2id.wire_value(), 1);
    }

    #[test]
    fn unknown_kdf_value_is_fatal() {
        assert!(matches!(
            KdfKind::from_value(7),
            Err(CryptoError::UnknownKdf(7))
        ));
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"secret", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let b = derive(b"secret", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn derive_depends_on_salt_and_passphrase() {
        let a = derive(b"secret", TEST_SALT, &TEST_PARAMS).unwrap();
        let b = derive(b"secret", b"fedcba9876543210", &TEST_PARAMS).unwrap();
        let c = derive(b"other", TEST_SALT, &TEST_PARAMS).unwrap();
        assert_ne!(a.expose(), b.expose());
        assert_ne!(a.expose(), c.expose());
    }

    #[test]
    fn derive_rejects_unknown_version() {
        let params = Argon2Params {
            version: 0x42,
            ..TEST_PARAMS
        };
        assert!(matches!(
            derive(b"pw", TEST_SALT, &params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn derive_raw_requires_exact_length() {
        assert!(derive_raw(&[0u8; 31]).is_err());
        let key = derive_raw(&[7u8; 32]).expect("32-byte raw key should succeed");
        assert_eq!(key.expose(), &[7u8; 32]);
    }
}
