//! Cipher and codec round-trip and tamper tests.

use chrono::{DateTime, NaiveDate};
use proptest::prelude::*;

use daybook::cipher::{self, NONCE_BYTES, TAG_BYTES};
use daybook::codec::{decode_entry, encode_entry};
use daybook::error::IntegrityError;
use daybook::kdf::{self, CipherKeys, KdfParams, SALT_BYTES};
use daybook::types::{Entry, EntryId};

fn fast_params() -> KdfParams {
    KdfParams {
        m_cost: 16,
        t_cost: 1,
        p_cost: 1,
    }
}

fn test_keys() -> CipherKeys {
    let master = kdf::derive_master_key("test-passphrase", &[0x42; SALT_BYTES], &fast_params())
        .expect("derivation with fast params");
    CipherKeys::derive(&master)
}

fn other_keys() -> CipherKeys {
    let master = kdf::derive_master_key("other-passphrase", &[0x42; SALT_BYTES], &fast_params())
        .expect("derivation with fast params");
    CipherKeys::derive(&master)
}

// === Cipher round trips ===

#[test]
fn roundtrip_basic() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(0);
    let plaintext = b"dear diary, nothing happened today";

    let (ct, tag) = cipher::seal(&keys, &nonce, plaintext);
    let pt = cipher::open(&keys, &nonce, &ct, &tag).unwrap();
    assert_eq!(pt.as_slice(), plaintext);
}

#[test]
fn roundtrip_empty_plaintext() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(1);
    let (ct, tag) = cipher::seal(&keys, &nonce, b"");
    assert!(ct.is_empty());
    let pt = cipher::open(&keys, &nonce, &ct, &tag).unwrap();
    assert!(pt.is_empty());
}

#[test]
fn roundtrip_large_plaintext() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(2);
    let plaintext = vec![0xABu8; 65536];

    let (ct, tag) = cipher::seal(&keys, &nonce, &plaintext);
    let pt = cipher::open(&keys, &nonce, &ct, &tag).unwrap();
    assert_eq!(pt.as_slice(), plaintext.as_slice());
}

#[test]
fn ciphertext_length_equals_plaintext_length() {
    let keys = test_keys();
    for len in [0usize, 1, 15, 16, 17, 1024] {
        let plaintext = vec![0x11u8; len];
        let (ct, _) = cipher::seal(&keys, &cipher::nonce_for(len as u64), &plaintext);
        assert_eq!(ct.len(), len);
    }
}

#[test]
fn ciphertext_differs_from_plaintext() {
    let keys = test_keys();
    let plaintext = vec![0x5Au8; 64];
    let (ct, _) = cipher::seal(&keys, &cipher::nonce_for(3), &plaintext);
    assert_ne!(ct, plaintext);
}

#[test]
fn distinct_nonces_give_distinct_ciphertexts() {
    let keys = test_keys();
    let plaintext = b"same plaintext";
    let (ct1, _) = cipher::seal(&keys, &cipher::nonce_for(10), plaintext);
    let (ct2, _) = cipher::seal(&keys, &cipher::nonce_for(11), plaintext);
    assert_ne!(ct1, ct2);
}

// === Tamper detection ===

#[test]
fn every_ciphertext_bit_flip_detected() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(20);
    let (ct, tag) = cipher::seal(&keys, &nonce, b"tamper target");

    for i in 0..ct.len() {
        for bit in 0..8 {
            let mut bad = ct.clone();
            bad[i] ^= 1 << bit;
            assert!(
                matches!(cipher::open(&keys, &nonce, &bad, &tag), Err(IntegrityError)),
                "flip at byte {} bit {} must fail",
                i,
                bit
            );
        }
    }
}

#[test]
fn every_tag_byte_flip_detected() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(21);
    let (ct, tag) = cipher::seal(&keys, &nonce, b"tamper target");

    for i in 0..TAG_BYTES {
        let mut bad = tag;
        bad[i] ^= 0x01;
        assert!(matches!(
            cipher::open(&keys, &nonce, &ct, &bad),
            Err(IntegrityError)
        ));
    }
}

#[test]
fn wrong_nonce_fails() {
    let keys = test_keys();
    let (ct, tag) = cipher::seal(&keys, &cipher::nonce_for(30), b"data");
    assert!(matches!(
        cipher::open(&keys, &cipher::nonce_for(31), &ct, &tag),
        Err(IntegrityError)
    ));
}

#[test]
fn wrong_key_fails() {
    let keys = test_keys();
    let nonce = cipher::nonce_for(32);
    let (ct, tag) = cipher::seal(&keys, &nonce, b"data");
    assert!(matches!(
        cipher::open(&other_keys(), &nonce, &ct, &tag),
        Err(IntegrityError)
    ));
}

#[test]
fn nonce_layout() {
    let nonce = cipher::nonce_for(0x0102_0304_0506_0708);
    assert_eq!(nonce.len(), NONCE_BYTES);
    assert_eq!(&nonce[4..], &0x0102_0304_0506_0708u64.to_be_bytes());
    assert_eq!(hex::encode(cipher::nonce_for(1)), "44424b310000000000000001");
}

// === Property-based round trips ===

fn arb_entry() -> impl Strategy<Value = Entry> {
    (
        any::<u64>(),
        1970i32..=2200,
        1u32..=12,
        1u32..=28,
        0i64..=4_000_000_000,
        ".*",
    )
        .prop_map(|(id, year, month, day, secs, content)| Entry {
            id: EntryId::new(id),
            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            content,
            modified: DateTime::from_timestamp(secs, 0).unwrap(),
        })
}

proptest! {
    #[test]
    fn prop_entry_codec_roundtrip(entry in arb_entry()) {
        let bytes = encode_entry(&entry).unwrap();
        prop_assert_eq!(decode_entry(&bytes).unwrap(), entry);
    }

    #[test]
    fn prop_cipher_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..2048), counter in any::<u64>()) {
        let keys = test_keys();
        let nonce = cipher::nonce_for(counter);
        let (ct, tag) = cipher::seal(&keys, &nonce, &plaintext);
        let pt = cipher::open(&keys, &nonce, &ct, &tag).unwrap();
        prop_assert_eq!(pt.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn prop_sealed_entry_roundtrip(entry in arb_entry(), counter in any::<u64>()) {
        let keys = test_keys();
        let nonce = cipher::nonce_for(counter);
        let bytes = encode_entry(&entry).unwrap();
        let (ct, tag) = cipher::seal(&keys, &nonce, &bytes);
        let pt = cipher::open(&keys, &nonce, &ct, &tag).unwrap();
        prop_assert_eq!(decode_entry(&pt).unwrap(), entry);
    }
}
