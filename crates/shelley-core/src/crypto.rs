//! Ed25519 and Blake2b primitives for Shelley transactions.
//!
//! Keys in the wallet hierarchy are *extended* Ed25519 keys: a 32-byte
//! scalar half `kL` and a 32-byte nonce-prefix half `kR`. They cannot be
//! turned back into a 32-byte RFC 8032 seed, so signing goes through the
//! expanded-key path of ed25519-dalek. The resulting signatures verify
//! under the ordinary Ed25519 verifier.
//!
//! # Hashes
//!
//! - Credential hash: Blake2b-224 of the 32-byte public key.
//! - Transaction id: Blake2b-256 of the CBOR-encoded body.
//!
//! Every witness signs the transaction id, so a witness is valid for
//! exactly one body.

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use curve25519_dalek::{EdwardsPoint, Scalar};
use ed25519_dalek::Verifier;
use ed25519_dalek::hazmat::{ExpandedSecretKey, raw_sign};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{KEY_HASH_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN, TX_ID_LEN};
use crate::error::{CryptoError, TransactionError};
use crate::types::{KeyHash, TransactionBody, TxId, VkeyWitness};

/// Blake2b-224 digest, the credential hash of a key.
pub fn blake2b_224(data: &[u8]) -> [u8; KEY_HASH_LEN] {
    let mut out = [0u8; KEY_HASH_LEN];
    out.copy_from_slice(&Blake2b::<U28>::digest(data));
    out
}

/// Blake2b-256 digest, used for transaction ids.
pub fn blake2b_256(data: &[u8]) -> [u8; TX_ID_LEN] {
    let mut out = [0u8; TX_ID_LEN];
    out.copy_from_slice(&Blake2b::<U32>::digest(data));
    out
}

/// Extended Ed25519 signing key (`kL ‖ kR`).
///
/// The secret halves are zeroized on drop. `Debug` only shows the public key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    kl: [u8; 32],
    kr: [u8; 32],
    #[zeroize(skip)]
    public: PublicKey,
}

impl KeyPair {
    /// Build a key pair from the two extended secret halves.
    ///
    /// `kl` is interpreted as a little-endian scalar; it is not clamped here,
    /// since derived child keys are valid without the RFC 8032 clamp.
    pub fn from_extended(kl: [u8; 32], kr: [u8; 32]) -> Result<Self, CryptoError> {
        let public = PublicKey::from_bytes(&public_from_scalar_bytes(&kl))?;
        Ok(Self { kl, kr, public })
    }

    /// The scalar half of the extended key.
    pub fn scalar_bytes(&self) -> &[u8; 32] {
        &self.kl
    }

    /// The nonce-prefix half of the extended key.
    pub fn prefix_bytes(&self) -> &[u8; 32] {
        &self.kr
    }

    /// Public key `kL·B`.
    pub fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    /// Sign `message`, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        let expanded = ExpandedSecretKey {
            scalar: Scalar::from_bytes_mod_order(self.kl),
            hash_prefix: self.kr,
        };
        raw_sign::<Sha512>(&expanded, message, &self.public.verifying_key).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Compute `s·B` for a little-endian 32-byte scalar.
pub fn public_from_scalar_bytes(scalar: &[u8; 32]) -> [u8; PUBLIC_KEY_LEN] {
    EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(*scalar))
        .compress()
        .to_bytes()
}

/// Ed25519 verification key.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from its 32-byte compressed encoding.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Raw 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    /// Blake2b-224 credential hash used in addresses.
    pub fn key_hash(&self) -> KeyHash {
        KeyHash(blake2b_224(&self.to_bytes()))
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes: [u8; PUBLIC_KEY_LEN] = hex::decode(&s)
            .map_err(serde::de::Error::custom)?
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 32 bytes"))?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Sign a transaction body, producing a verification-key witness.
///
/// The signature covers the transaction id (Blake2b-256 of the body CBOR).
pub fn sign_transaction(
    body: &TransactionBody,
    keypair: &KeyPair,
) -> Result<VkeyWitness, TransactionError> {
    Ok(sign_tx_id(&body.id()?, keypair))
}

/// Sign an already computed transaction id.
pub fn sign_tx_id(id: &TxId, keypair: &KeyPair) -> VkeyWitness {
    VkeyWitness {
        vkey: keypair.public_key().to_bytes(),
        signature: keypair.sign(id.as_bytes()),
    }
}

/// Verify that `witness` signs `id`, returning the signer's credential hash.
pub fn verify_witness(id: &TxId, witness: &VkeyWitness) -> Result<KeyHash, CryptoError> {
    let pk = PublicKey::from_bytes(&witness.vkey)?;
    pk.verify(id.as_bytes(), &witness.signature)?;
    Ok(pk.key_hash())
}
