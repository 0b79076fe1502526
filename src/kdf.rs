//! Key derivation (container v1)
//!
//! master   = Argon2id(passphrase, salt, work factors from header)
//! subkey   = HKDF-SHA256(master, info = PROTOCOL_ID || role)
//! verifier = HMAC-SHA256(vrf subkey, fixed input)

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::container::PROTOCOL_ID;
use crate::error::StoreError;

pub const MASTER_KEY_BYTES: usize = 32;
pub const SALT_BYTES: usize = 16;
pub const VERIFIER_BYTES: usize = 32;

/// Fixed input the verifier subkey is MACed over. The result reveals nothing
/// about the key and deterministically rejects any other passphrase.
const VERIFIER_INPUT: &[u8] = b"passphrase check";

// ---------------------------------------------------------------------------
// Work factors
// ---------------------------------------------------------------------------

/// Argon2id work factors, persisted in the container header so new stores
/// can raise them without breaking old files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// Session master key. Exists only long enough to expand the subkeys;
/// zeroed on drop.
pub struct MasterKey(Zeroizing<[u8; MASTER_KEY_BYTES]>);

/// Fresh random salt for a new store.
pub fn generate_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn derive_master_key(
    passphrase: &str,
    salt: &[u8; SALT_BYTES],
    params: &KdfParams,
) -> Result<MasterKey, StoreError> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(MASTER_KEY_BYTES))
        .map_err(|e| StoreError::Kdf(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = Zeroizing::new([0u8; MASTER_KEY_BYTES]);
    argon
        .hash_password_into(passphrase.as_bytes(), salt, out.as_mut())
        .map_err(|e| StoreError::Kdf(e.to_string()))?;
    Ok(MasterKey(out))
}

// ---------------------------------------------------------------------------
// Subkeys
// ---------------------------------------------------------------------------

/// Domain-separated subkeys expanded from the master key.
///
/// Encryption and authentication never share raw key material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherKeys {
    pub(crate) enc: [u8; 32],
    pub(crate) mac: [u8; 32],
    vrf: [u8; 32],
}

impl CipherKeys {
    pub fn derive(master: &MasterKey) -> Self {
        let hk = Hkdf::<Sha256>::new(None, &*master.0);
        let mut keys = Self {
            enc: [0u8; 32],
            mac: [0u8; 32],
            vrf: [0u8; 32],
        };
        expand(&hk, b"|enc", &mut keys.enc);
        expand(&hk, b"|mac", &mut keys.mac);
        expand(&hk, b"|vrf", &mut keys.vrf);
        keys
    }

    /// Verifier value stored unencrypted in the header.
    pub fn verifier(&self) -> [u8; VERIFIER_BYTES] {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.vrf)
            .expect("HMAC can take a key of any size");
        mac.update(VERIFIER_INPUT);
        mac.finalize().into_bytes().into()
    }

    /// Constant-time verifier comparison.
    pub fn check_verifier(&self, stored: &[u8; VERIFIER_BYTES]) -> bool {
        self.verifier().ct_eq(stored).into()
    }
}

fn expand(hk: &Hkdf<Sha256>, role: &[u8], out: &mut [u8; 32]) {
    let mut info = Vec::with_capacity(PROTOCOL_ID.len() + role.len());
    info.extend_from_slice(PROTOCOL_ID);
    info.extend_from_slice(role);
    hk.expand(&info, out).expect("32 bytes is a valid HKDF-SHA256 output length");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
