#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the `[K]\0` envelope.

use keybox_crypto_core::{Argon2Params, CryptoError, Envelope, MAGIC};
use proptest::prelude::*;

/// Fast Argon2id parameters — property tests derive a key per case.
const PROP_PARAMS: Argon2Params = Argon2Params {
    version: 0x13,
    mem_cost_log2: 10,
    time_cost: 1,
    parallelism: 1,
};

fn seal(plaintext: &[u8], passphrase: &[u8]) -> Vec<u8> {
    let mut envelope = Envelope::with_kdf_params(PROP_PARAMS);
    envelope
        .set_passphrase(passphrase)
        .expect("set_passphrase should succeed");
    envelope.seal(plaintext).expect("seal should succeed")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Seal→open always recovers the original plaintext.
    #[test]
    fn roundtrip_preserves_plaintext(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let blob = seal(&plaintext, b"prop-pass");
        let (envelope, recovered) =
            Envelope::open(&blob, b"prop-pass").expect("open should succeed");
        prop_assert_eq!(recovered.expose(), plaintext.as_slice());
        prop_assert!(envelope.warnings().is_empty());
    }

    /// Output always starts with the `[K]\0` magic.
    #[test]
    fn output_starts_with_magic(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let blob = seal(&plaintext, b"prop-pass");
        prop_assert_eq!(&blob[..4], MAGIC.as_slice());
    }

    /// A different passphrase always fails authentication.
    #[test]
    fn wrong_passphrase_always_fails(
        plaintext in proptest::collection::vec(any::<u8>(), 0..1024),
        wrong in "[a-z]{1,12}",
    ) {
        prop_assume!(wrong.as_bytes() != b"prop-pass");
        let blob = seal(&plaintext, b"prop-pass");
        let result = Envelope::open(&blob, wrong.as_bytes());
        prop_assert!(
            matches!(result, Err(CryptoError::AuthFailure)),
            "wrong passphrase must yield AuthFailure, got: {:?}",
            result.err()
        );
    }

    /// Any single-bit flip in the data region is caught — never silent.
    ///
    /// The data region is the trailing `nonce (24) ‖ tag (16) ‖ ciphertext`,
    /// so any flip within the last 40 bytes (or anywhere in the ciphertext)
    /// must fail authentication.
    #[test]
    fn bit_flip_never_silent(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        back_offset in 0usize..40,
        bit in 0u8..8,
    ) {
        let mut blob = seal(&plaintext, b"prop-pass");
        let idx = blob.len() - 1 - back_offset;
        blob[idx] ^= 1 << bit;
        let result = Envelope::open(&blob, b"prop-pass");
        prop_assert!(
            matches!(result, Err(CryptoError::AuthFailure)),
            "corruption must be detected, got: {:?}",
            result.as_ref().map(|_| "plaintext recovered").map_err(|e| e.to_string())
        );
    }
}
