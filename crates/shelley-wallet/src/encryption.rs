//! Password-based authenticated encryption of wallet secrets.
//!
//! The password is stretched with Argon2id into a 256-bit key, and the
//! secret is sealed with AES-256-GCM under a fresh random salt and nonce
//! for every call. Re-encrypting the same secret with the same password
//! therefore never repeats a nonce.
//!
//! # Encoded form
//! ```text
//! hex( salt (16) || nonce (12) || tag (16) || ciphertext )
//! ```
//!
//! Decryption fails closed: a wrong password, a flipped bit anywhere in
//! the blob, a truncated blob or bad hex all produce the same
//! [`WalletError::Authentication`].

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// Encoded header size (salt + nonce + tag).
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Largest accepted memory cost in KiB (1 GiB).
pub const MAX_M_COST: u32 = 1024 * 1024;

/// Largest accepted number of passes.
pub const MAX_T_COST: u32 = 16;

/// Largest accepted degree of parallelism.
pub const MAX_P_COST: u32 = 16;

/// Password hashing algorithm recorded with each wallet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    #[default]
    Argon2id,
}

/// Argon2id cost parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    #[serde(default)]
    pub algorithm: KdfAlgorithm,
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl KdfParams {
    /// Argon2id with explicit costs.
    pub fn new(m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            m_cost,
            t_cost,
            p_cost,
        }
    }

    /// Costs are read back from disk, so they are bounded before Argon2
    /// allocates anything.
    fn argon2(&self) -> Result<Argon2<'static>, WalletError> {
        if self.m_cost > MAX_M_COST || self.t_cost > MAX_T_COST || self.p_cost > MAX_P_COST {
            return Err(WalletError::Encryption(format!(
                "kdf costs m={} t={} p={} exceed the limits m={MAX_M_COST} t={MAX_T_COST} p={MAX_P_COST}",
                self.m_cost, self.t_cost, self.p_cost
            )));
        }
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| WalletError::Encryption(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self::new(19 * 1024, 2, 1)
    }
}

/// The durable, encrypted form of a wallet secret.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WalletRecord {
    /// Hex of `salt || nonce || tag || ciphertext`.
    pub encrypted: String,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// KDF used for `encrypted`; records without it use the defaults.
    #[serde(default)]
    pub kdf: KdfParams,
}

/// Derive a 256-bit encryption key from a password and salt using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(password, salt, key.as_mut())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Encrypt `secret` under `password`, producing a new [`WalletRecord`].
pub fn encrypt(
    secret: &[u8],
    password: &str,
    params: &KdfParams,
) -> Result<WalletRecord, WalletError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password.as_bytes(), &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut buf = secret.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce_bytes), b"", &mut buf)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + buf.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&buf);

    Ok(WalletRecord {
        encrypted: hex::encode(blob),
        created_at: Utc::now(),
        kdf: *params,
    })
}

/// Decrypt a record produced by [`encrypt`].
///
/// Returns [`WalletError::Authentication`] for every failure so callers
/// cannot tell a wrong password from a corrupted record.
pub fn decrypt(record: &WalletRecord, password: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let blob = hex::decode(&record.encrypted).map_err(|_| WalletError::Authentication)?;
    if blob.len() < HEADER_LEN {
        return Err(WalletError::Authentication);
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, rest) = rest.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let key = derive_key(password.as_bytes(), salt, &record.kdf)
        .map_err(|_| WalletError::Authentication)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_ref()).map_err(|_| WalletError::Authentication)?;

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce_bytes),
            b"",
            &mut buf,
            Tag::from_slice(tag),
        )
        .map_err(|_| WalletError::Authentication)?;
    Ok(buf)
}
