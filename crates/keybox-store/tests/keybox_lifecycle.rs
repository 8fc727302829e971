#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]

//! End-to-end lifecycle tests: create, open, mutate, save, re-key.

use keybox_crypto_core::{Argon2Params, CryptoError};
use keybox_store::{FixedClock, Keybox, StoreError};

/// Fast Argon2id parameters (1 MiB, one pass) for tests that re-derive
/// often. Scenario tests that pin default behavior use `None` instead.
fn fast_params() -> Argon2Params {
    Argon2Params {
        version: 0x13,
        mem_cost_log2: 10,
        time_cost: 1,
        parallelism: 1,
    }
}

#[test]
fn one_record_roundtrip_with_default_params() {
    // Passphrase "secret", one record, default KDF parameters. The file
    // must start with the `[K]\0` magic: 5B 4B 5D 00.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");

    let mut keybox = Keybox::create(&path, "secret", None).unwrap();
    let id = keybox
        .add_record(&[
            ("site", "Example"),
            ("user", "johny"),
            ("password", "pa$$w0rD"),
        ])
        .unwrap();
    assert_eq!(keybox.password(id).unwrap(), "pa$$w0rD");
    keybox.save().unwrap();
    drop(keybox);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], &[0x5B, 0x4B, 0x5D, 0x00]);

    let reopened = Keybox::open_with_passphrase(&path, "secret").unwrap();
    assert_eq!(reopened.store().len(), 1);
    let (id, record) = reopened.store().iter().next().unwrap();
    assert_eq!(record.get("site"), "Example");
    assert_eq!(record.get("user"), "johny");
    assert_eq!(reopened.password(id).unwrap(), "pa$$w0rD");
}

#[test]
fn empty_keybox_is_small_and_reopens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");

    Keybox::create(&path, "secret", None).unwrap();

    let size = std::fs::metadata(&path).unwrap().len();
    assert!(size <= 200, "empty keybox file is {size} bytes, expected <= 200");

    let reopened = Keybox::open_with_passphrase(&path, "secret").unwrap();
    assert!(reopened.store().is_empty());
    assert_eq!(
        reopened.store().columns(),
        ["site", "user", "url", "tags", "mtime", "note", "password"]
    );
}

#[test]
fn identical_records_both_found_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();

    let first = keybox
        .add_record(&[("site", "Example"), ("user", "johny")])
        .unwrap();
    let second = keybox
        .add_record(&[("site", "Example"), ("user", "johny")])
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(keybox.find("Example"), [first, second]);
}

#[test]
fn change_passphrase_rekeys_file_and_passwords() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();
    keybox
        .add_record(&[("site", "Example"), ("password", "pa$$w0rD")])
        .unwrap();
    keybox.save().unwrap();

    keybox.change_passphrase("secret", "new").unwrap();
    assert!(keybox.is_dirty());
    keybox.save().unwrap();
    drop(keybox);

    assert!(matches!(
        Keybox::open_with_passphrase(&path, "secret"),
        Err(StoreError::Crypto(CryptoError::AuthFailure))
    ));

    let reopened = Keybox::open_with_passphrase(&path, "new").unwrap();
    let (id, record) = reopened.store().iter().next().unwrap();
    assert_eq!(record.get("site"), "Example");
    assert_eq!(reopened.password(id).unwrap(), "pa$$w0rD");
}

#[test]
fn change_passphrase_verifies_the_current_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();
    let id = keybox
        .add_record(&[("site", "Example"), ("password", "pa$$w0rD")])
        .unwrap();
    keybox.save().unwrap();

    assert!(matches!(
        keybox.change_passphrase("guessed-wrong", "new"),
        Err(StoreError::Crypto(CryptoError::AuthFailure))
    ));

    // Still fully on the old key: nothing dirty, password still readable.
    assert!(!keybox.is_dirty());
    assert_eq!(keybox.password(id).unwrap(), "pa$$w0rD");
    assert!(keybox.check_passphrase("secret").unwrap());
    assert!(!keybox.check_passphrase("guessed-wrong").unwrap());
}

#[test]
fn wrong_passphrase_yields_no_keybox() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    Keybox::create(&path, "secret", Some(fast_params())).unwrap();

    assert!(matches!(
        Keybox::open_with_passphrase(&path, "not-secret"),
        Err(StoreError::Crypto(CryptoError::AuthFailure))
    ));
}

#[test]
fn mtime_tracks_the_injected_clock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();

    keybox.set_clock(Box::new(FixedClock::new("2024-03-01 08:00:00")));
    let id = keybox.add_record(&[("site", "Example")]).unwrap();
    assert_eq!(
        keybox.store().get(id).unwrap().get("mtime"),
        "2024-03-01 08:00:00"
    );

    keybox.set_clock(Box::new(FixedClock::new("2024-03-02 09:30:00")));
    keybox.modify_record(id, &[("note", "updated")]).unwrap();
    assert_eq!(
        keybox.store().get(id).unwrap().get("mtime"),
        "2024-03-02 09:30:00"
    );
}

#[test]
fn column_reorder_preserves_record_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();
    keybox
        .add_record(&[("site", "Example"), ("user", "johny"), ("note", "hello")])
        .unwrap();
    keybox.save().unwrap();

    // Reverse the column order and save; contents must be order-independent.
    let reversed: Vec<String> = keybox.store().columns().iter().rev().cloned().collect();
    keybox.set_header(&reversed, false).unwrap();
    keybox.save().unwrap();
    drop(keybox);

    let reopened = Keybox::open_with_passphrase(&path, "secret").unwrap();
    assert_eq!(reopened.store().columns(), reversed);
    let (_, record) = reopened.store().iter().next().unwrap();
    assert_eq!(record.get("site"), "Example");
    assert_eq!(record.get("user"), "johny");
    assert_eq!(record.get("note"), "hello");
}

#[test]
fn saved_file_never_contains_plaintext_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();
    keybox
        .add_record(&[("site", "Example"), ("password", "super-unique-pw-9876")])
        .unwrap();
    keybox.save().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let needle = b"super-unique-pw-9876";
    assert!(
        !bytes.windows(needle.len()).any(|w| w == needle),
        "plaintext password leaked into the file"
    );
}

#[test]
fn deleted_record_stays_gone_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybox.safe");
    let mut keybox = Keybox::create(&path, "secret", Some(fast_params())).unwrap();
    let keep = keybox.add_record(&[("site", "keep")]).unwrap();
    let drop_id = keybox.add_record(&[("site", "drop")]).unwrap();

    keybox.delete_record(drop_id).unwrap();
    keybox.save().unwrap();
    assert!(keybox.store().get(keep).is_some());
    drop(keybox);

    let reopened = Keybox::open_with_passphrase(&path, "secret").unwrap();
    assert_eq!(reopened.store().len(), 1);
    let (_, record) = reopened.store().iter().next().unwrap();
    assert_eq!(record.get("site"), "keep");
}
