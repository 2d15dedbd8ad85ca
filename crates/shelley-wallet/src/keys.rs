//! Seed management and hierarchical key derivation.
//!
//! Implements BIP32-Ed25519 (Khovratovich–Law, derivation scheme V2) over
//! the CIP-1852 path `m / 1852' / 1815' / account' / role / index`.
//!
//! Unlike BIP-32 on secp256k1, Ed25519 child keys are derived by adding
//! `8·Z[0..28]` to the parent scalar, which keeps every child scalar a
//! multiple of the cofactor and lets non-hardened children be derived from
//! the parent public key alone.

use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::{EdwardsPoint, Scalar};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use shelley_core::address::{Address, Network};
use shelley_core::constants::{COIN_TYPE, HARDENED_OFFSET, PURPOSE};
use shelley_core::crypto::{KeyPair, PublicKey, public_from_scalar_bytes};
use shelley_core::types::KeyHash;

use crate::error::WalletError;

type HmacSha512 = Hmac<Sha512>;

/// Icarus seed length: `kL(32) ‖ kR(32) ‖ chain_code(32)`.
pub const SEED_LEN: usize = 96;

/// Deepest key the tree will produce.
const MAX_DEPTH: u8 = u8::MAX;

/// A 96-byte master seed for deterministic key derivation.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; SEED_LEN],
}

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A child index; values at or above 2^31 are hardened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildIndex(u32);

impl ChildIndex {
    /// Hardened index `n'`.
    pub fn hardened(n: u32) -> Result<Self, WalletError> {
        if n >= HARDENED_OFFSET {
            return Err(WalletError::Derivation(format!("index {n} out of range")));
        }
        Ok(Self(n | HARDENED_OFFSET))
    }

    /// Non-hardened index `n`.
    pub fn soft(n: u32) -> Result<Self, WalletError> {
        if n >= HARDENED_OFFSET {
            return Err(WalletError::Derivation(format!("index {n} out of range")));
        }
        Ok(Self(n))
    }

    /// Raw 32-bit value including the hardened bit.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Whether derivation at this index requires the parent private key.
    pub fn is_hardened(&self) -> bool {
        self.0 >= HARDENED_OFFSET
    }

    /// Index without the hardened bit.
    pub fn number(&self) -> u32 {
        self.0 & !HARDENED_OFFSET
    }
}

impl From<u32> for ChildIndex {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}'", self.number())
        } else {
            write!(f, "{}", self.number())
        }
    }
}

/// Key role within an account (the fourth path component).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Receiving (payment) keys.
    External = 0,
    /// Change keys.
    Internal = 1,
    /// Staking key.
    Stake = 2,
}

/// An ordered list of child indexes from the root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildIndex>);

impl DerivationPath {
    /// `m / 1852' / 1815' / account'`.
    pub fn account(account: u32) -> Result<Self, WalletError> {
        Ok(Self(vec![
            ChildIndex::hardened(PURPOSE)?,
            ChildIndex::hardened(COIN_TYPE)?,
            ChildIndex::hardened(account)?,
        ]))
    }

    /// `m / 1852' / 1815' / account' / role / index`.
    pub fn cip1852(account: u32, role: Role, index: u32) -> Result<Self, WalletError> {
        let mut path = Self::account(account)?;
        path.0.push(ChildIndex::soft(role as u32)?);
        path.0.push(ChildIndex::soft(index)?);
        Ok(path)
    }

    /// The path components.
    pub fn components(&self) -> &[ChildIndex] {
        &self.0
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for c in &self.0 {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::Derivation(format!("path must start with m: {s}")));
        }
        let mut components = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('H')) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let n: u32 = digits
                .parse()
                .map_err(|_| WalletError::Derivation(format!("bad path component: {part}")))?;
            components.push(if hardened {
                ChildIndex::hardened(n)?
            } else {
                ChildIndex::soft(n)?
            });
        }
        Ok(Self(components))
    }
}

/// Secret halves of an extended private key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretHalves {
    kl: [u8; 32],
    kr: [u8; 32],
}

/// A node in the key tree: key material plus chain code.
///
/// Private nodes can derive hardened and soft children; public-only nodes
/// (from [`ExtendedKey::to_public`]) can derive soft children only.
#[derive(Clone)]
pub struct ExtendedKey {
    secret: Option<SecretHalves>,
    public: [u8; 32],
    chain_code: [u8; 32],
    depth: u8,
    child: ChildIndex,
}

impl ExtendedKey {
    /// Root key (depth 0) from an Icarus seed.
    pub fn root_from_seed(seed: &Seed) -> Self {
        let bytes = seed.as_bytes();
        let mut secret = SecretHalves {
            kl: [0u8; 32],
            kr: [0u8; 32],
        };
        secret.kl.copy_from_slice(&bytes[..32]);
        secret.kr.copy_from_slice(&bytes[32..64]);
        secret.kl[0] &= 0b1111_1000;
        secret.kl[31] &= 0b0001_1111;
        secret.kl[31] |= 0b0100_0000;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[64..96]);

        Self {
            public: public_from_scalar_bytes(&secret.kl),
            secret: Some(secret),
            chain_code,
            depth: 0,
            child: ChildIndex(0),
        }
    }

    /// Derive the child at `index`.
    ///
    /// Fails with [`WalletError::Derivation`] when a hardened child is
    /// requested from a public-only key.
    pub fn derive(&self, index: ChildIndex) -> Result<Self, WalletError> {
        if self.depth == MAX_DEPTH {
            return Err(WalletError::Derivation("maximum depth reached".into()));
        }
        let depth = self.depth + 1;
        let idx = index.raw().to_le_bytes();

        match &self.secret {
            Some(parent) => {
                let (z, i) = if index.is_hardened() {
                    (
                        hmac_parts(&self.chain_code, 0x00, &[&parent.kl, &parent.kr, &idx])?,
                        hmac_parts(&self.chain_code, 0x01, &[&parent.kl, &parent.kr, &idx])?,
                    )
                } else {
                    (
                        hmac_parts(&self.chain_code, 0x02, &[&self.public, &idx])?,
                        hmac_parts(&self.chain_code, 0x03, &[&self.public, &idx])?,
                    )
                };
                let secret = SecretHalves {
                    kl: add_28_mul8(&parent.kl, &z[..32]),
                    kr: add_256(&parent.kr, &z[32..]),
                };
                Ok(Self {
                    public: public_from_scalar_bytes(&secret.kl),
                    secret: Some(secret),
                    chain_code: right_half(&i),
                    depth,
                    child: index,
                })
            }
            None => {
                if index.is_hardened() {
                    return Err(WalletError::Derivation(format!(
                        "hardened index {index} requires a private parent"
                    )));
                }
                let z = hmac_parts(&self.chain_code, 0x02, &[&self.public, &idx])?;
                let i = hmac_parts(&self.chain_code, 0x03, &[&self.public, &idx])?;

                let parent_point = CompressedEdwardsY(self.public)
                    .decompress()
                    .ok_or_else(|| WalletError::Derivation("invalid parent public key".into()))?;
                let tweak = Scalar::from_bytes_mod_order(add_28_mul8(&[0u8; 32], &z[..32]));
                let child_point: EdwardsPoint = parent_point + EdwardsPoint::mul_base(&tweak);

                Ok(Self {
                    secret: None,
                    public: child_point.compress().to_bytes(),
                    chain_code: right_half(&i),
                    depth,
                    child: index,
                })
            }
        }
    }

    /// Derive along every component of `path`.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        path.components()
            .iter()
            .try_fold(self.clone(), |key, &index| key.derive(index))
    }

    /// Strip the private material.
    pub fn to_public(&self) -> Self {
        Self {
            secret: None,
            public: self.public,
            chain_code: self.chain_code,
            depth: self.depth,
            child: self.child,
        }
    }

    /// Whether this node carries private key material.
    pub fn is_private(&self) -> bool {
        self.secret.is_some()
    }

    /// Ed25519 public key of this node.
    pub fn public_key(&self) -> Result<PublicKey, WalletError> {
        Ok(PublicKey::from_bytes(&self.public)?)
    }

    /// Signing key pair. Fails for public-only nodes.
    pub fn keypair(&self) -> Result<KeyPair, WalletError> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| WalletError::Derivation("public-only key cannot sign".into()))?;
        Ok(KeyPair::from_extended(secret.kl, secret.kr)?)
    }

    /// Chain code of this node.
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Distance from the root.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Index this node was derived at (0 for the root).
    pub fn child_index(&self) -> ChildIndex {
        self.child
    }

    /// Whether this node was derived at a hardened index.
    pub fn is_hardened(&self) -> bool {
        self.child.is_hardened()
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("public", &hex::encode(self.public))
            .field("private", &self.is_private())
            .field("depth", &self.depth)
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

/// Payment and stake keys for one `(account, index)` slot.
pub struct AccountKeys {
    account: u32,
    index: u32,
    payment: KeyPair,
    stake: KeyPair,
}

impl AccountKeys {
    /// Derive `account'/0/index` (payment) and `account'/2/0` (stake) from the root.
    pub fn derive(root: &ExtendedKey, account: u32, index: u32) -> Result<Self, WalletError> {
        let account_key = root.derive_path(&DerivationPath::account(account)?)?;
        let payment = account_key
            .derive(ChildIndex::soft(Role::External as u32)?)?
            .derive(ChildIndex::soft(index)?)?
            .keypair()?;
        let stake = account_key
            .derive(ChildIndex::soft(Role::Stake as u32)?)?
            .derive(ChildIndex::soft(0)?)?
            .keypair()?;
        Ok(Self {
            account,
            index,
            payment,
            stake,
        })
    }

    /// Payment key pair (`role = 0`).
    pub fn payment(&self) -> &KeyPair {
        &self.payment
    }

    /// Stake key pair (`role = 2`).
    pub fn stake(&self) -> &KeyPair {
        &self.stake
    }

    /// Base address for this slot on `network`.
    pub fn address(&self, network: Network) -> Address {
        Address::from_public_keys(&self.payment.public_key(), &self.stake.public_key(), network)
    }

    /// Reward address of the stake key on `network`.
    pub fn reward_address(&self, network: Network) -> Address {
        Address::reward(self.stake.public_key().key_hash(), network)
    }

    /// Look up the key pair whose credential hash is `hash`.
    pub fn keypair_for(&self, hash: &KeyHash) -> Option<&KeyPair> {
        [&self.payment, &self.stake]
            .into_iter()
            .find(|kp| kp.public_key().key_hash() == *hash)
    }

    /// Account index.
    pub fn account(&self) -> u32 {
        self.account
    }

    /// Address index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("account", &self.account)
            .field("index", &self.index)
            .field("payment", &self.payment.public_key())
            .field("stake", &self.stake.public_key())
            .finish()
    }
}

// --- Derivation arithmetic ---

fn hmac_parts(chain_code: &[u8; 32], tag: u8, parts: &[&[u8]]) -> Result<[u8; 64], WalletError> {
    let mut mac = HmacSha512::new_from_slice(chain_code)
        .map_err(|e| WalletError::Derivation(e.to_string()))?;
    mac.update(&[tag]);
    for p in parts {
        mac.update(p);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn right_half(bytes: &[u8; 64]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[32..]);
    out
}

/// `x + 8·y[0..28]` as little-endian integers, truncated to 256 bits.
fn add_28_mul8(x: &[u8; 32], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..28 {
        let r = u16::from(x[i]) + (u16::from(y[i]) << 3) + carry;
        out[i] = (r & 0xFF) as u8;
        carry = r >> 8;
    }
    for i in 28..32 {
        let r = u16::from(x[i]) + carry;
        out[i] = (r & 0xFF) as u8;
        carry = r >> 8;
    }
    out
}

/// `x + y mod 2^256` as little-endian integers.
fn add_256(x: &[u8; 32], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let r = u16::from(x[i]) + u16::from(y[i]) + carry;
        out[i] = (r & 0xFF) as u8;
        carry = r >> 8;
    }
    out
}
