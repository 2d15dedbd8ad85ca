//! Shelley address encoding.
//!
//! Addresses use Bech32 encoding ([BIP-173] checksum, without the 90
//! character limit) with human-readable prefixes:
//! - Mainnet: `addr1...` (payment), `stake1...` (reward)
//! - Testnet: `addr_test1...` (payment), `stake_test1...` (reward)
//!
//! The binary form is a one-byte header followed by one or two 28-byte
//! credential hashes. The high nibble of the header selects the address
//! type and the low nibble carries the network id:
//!
//! ```text
//! base:       0b00xy | net  payment(28) || stake(28)
//! enterprise: 0b011x | net  payment(28)
//! reward:     0b111x | net  stake(28)
//! ```
//! where `x`/`y` are set when the respective credential is a script hash.
//!
//! [BIP-173]: https://github.com/bitcoin/bips/blob/master/bip-0173.mediawiki

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::KEY_HASH_LEN;
use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::types::KeyHash;

const HEADER_BASE: u8 = 0b0000;
const HEADER_ENTERPRISE: u8 = 0b0110;
const HEADER_REWARD: u8 = 0b1110;

/// Network identifier carried in the address header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet (network id 1, HRP `addr` / `stake`).
    Mainnet,
    /// Any test network (network id 0, HRP `addr_test` / `stake_test`).
    Testnet,
}

impl Network {
    /// Network id stored in the low nibble of the address header.
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Testnet => 0,
        }
    }

    /// Look up a network from a header network id.
    pub fn from_network_id(id: u8) -> Result<Self, AddressError> {
        match id {
            1 => Ok(Network::Mainnet),
            0 => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(format!("network id {other}"))),
        }
    }

    /// Human-readable prefix for payment (base/enterprise) addresses.
    pub fn address_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Testnet => "addr_test",
        }
    }

    /// Human-readable prefix for reward (stake) addresses.
    pub fn stake_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "stake",
            Network::Testnet => "stake_test",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" | "preprod" | "preview" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A payment or stake credential: the hash of a verification key or a script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Credential {
    /// Blake2b-224 hash of an Ed25519 verification key.
    Key(KeyHash),
    /// Blake2b-224 hash of a script. Never produced by this wallet.
    Script(KeyHash),
}

impl Credential {
    fn hash(&self) -> &KeyHash {
        match self {
            Credential::Key(h) | Credential::Script(h) => h,
        }
    }

    fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }

    /// The key hash if this is a key credential.
    pub fn key_hash(&self) -> Option<KeyHash> {
        match self {
            Credential::Key(h) => Some(*h),
            Credential::Script(_) => None,
        }
    }
}

/// The credential layout of an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressPayload {
    /// Payment credential plus stake credential.
    Base { payment: Credential, stake: Credential },
    /// Payment credential only.
    Enterprise { payment: Credential },
    /// Stake credential only; receives staking rewards.
    Reward { stake: Credential },
}

/// A Shelley-era address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    payload: AddressPayload,
}

impl Address {
    /// Base address from payment and stake key hashes.
    pub fn base(payment: KeyHash, stake: KeyHash, network: Network) -> Self {
        Self {
            network,
            payload: AddressPayload::Base {
                payment: Credential::Key(payment),
                stake: Credential::Key(stake),
            },
        }
    }

    /// Base address from payment and stake public keys.
    pub fn from_public_keys(payment: &PublicKey, stake: &PublicKey, network: Network) -> Self {
        Self::base(payment.key_hash(), stake.key_hash(), network)
    }

    /// Enterprise address (no staking rights) from a payment key hash.
    pub fn enterprise(payment: KeyHash, network: Network) -> Self {
        Self {
            network,
            payload: AddressPayload::Enterprise {
                payment: Credential::Key(payment),
            },
        }
    }

    /// Reward address from a stake key hash.
    pub fn reward(stake: KeyHash, network: Network) -> Self {
        Self {
            network,
            payload: AddressPayload::Reward {
                stake: Credential::Key(stake),
            },
        }
    }

    /// The network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The credential layout.
    pub fn payload(&self) -> &AddressPayload {
        &self.payload
    }

    /// Payment key hash, if the address has a key payment credential.
    pub fn payment_key_hash(&self) -> Option<KeyHash> {
        match &self.payload {
            AddressPayload::Base { payment, .. } | AddressPayload::Enterprise { payment } => {
                payment.key_hash()
            }
            AddressPayload::Reward { .. } => None,
        }
    }

    /// Stake key hash, if the address has a key stake credential.
    pub fn stake_key_hash(&self) -> Option<KeyHash> {
        match &self.payload {
            AddressPayload::Base { stake, .. } | AddressPayload::Reward { stake } => {
                stake.key_hash()
            }
            AddressPayload::Enterprise { .. } => None,
        }
    }

    /// Whether outputs may be paid to this address.
    pub fn is_payment(&self) -> bool {
        !matches!(self.payload, AddressPayload::Reward { .. })
    }

    /// Fail unless this address belongs to `network`.
    pub fn require_network(&self, network: Network) -> Result<(), AddressError> {
        if self.network != network {
            return Err(AddressError::NetworkMismatch {
                expected: network.to_string(),
                got: self.network.to_string(),
            });
        }
        Ok(())
    }

    fn header(&self) -> u8 {
        let kind = match &self.payload {
            AddressPayload::Base { payment, stake } => {
                HEADER_BASE | (payment.is_script() as u8) | ((stake.is_script() as u8) << 1)
            }
            AddressPayload::Enterprise { payment } => HEADER_ENTERPRISE | payment.is_script() as u8,
            AddressPayload::Reward { stake } => HEADER_REWARD | stake.is_script() as u8,
        };
        (kind << 4) | self.network.network_id()
    }

    fn hrp(&self) -> &'static str {
        match self.payload {
            AddressPayload::Reward { .. } => self.network.stake_hrp(),
            _ => self.network.address_hrp(),
        }
    }

    /// Raw address bytes as they appear in transaction outputs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 2 * KEY_HASH_LEN);
        out.push(self.header());
        match &self.payload {
            AddressPayload::Base { payment, stake } => {
                out.extend_from_slice(payment.hash().as_bytes());
                out.extend_from_slice(stake.hash().as_bytes());
            }
            AddressPayload::Enterprise { payment } => {
                out.extend_from_slice(payment.hash().as_bytes())
            }
            AddressPayload::Reward { stake } => out.extend_from_slice(stake.hash().as_bytes()),
        }
        out
    }

    /// Parse raw address bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let (&header, body) = bytes.split_first().ok_or(AddressError::InvalidLength)?;
        let network = Network::from_network_id(header & 0x0F)?;
        let kind = header >> 4;

        let credential = |chunk: &[u8], script: bool| -> Result<Credential, AddressError> {
            let hash = KeyHash::from_slice(chunk).ok_or(AddressError::InvalidLength)?;
            Ok(if script {
                Credential::Script(hash)
            } else {
                Credential::Key(hash)
            })
        };

        let payload = match kind {
            0..=3 => {
                if body.len() != 2 * KEY_HASH_LEN {
                    return Err(AddressError::InvalidLength);
                }
                AddressPayload::Base {
                    payment: credential(&body[..KEY_HASH_LEN], kind & 0b01 != 0)?,
                    stake: credential(&body[KEY_HASH_LEN..], kind & 0b10 != 0)?,
                }
            }
            6 | 7 => {
                if body.len() != KEY_HASH_LEN {
                    return Err(AddressError::InvalidLength);
                }
                AddressPayload::Enterprise {
                    payment: credential(body, kind == 7)?,
                }
            }
            14 | 15 => {
                if body.len() != KEY_HASH_LEN {
                    return Err(AddressError::InvalidLength);
                }
                AddressPayload::Reward {
                    stake: credential(body, kind == 15)?,
                }
            }
            _ => return Err(AddressError::UnsupportedHeader(header)),
        };

        Ok(Self { network, payload })
    }

    /// Encode this address as a Bech32 string.
    pub fn encode(&self) -> String {
        // The four prefixes are fixed lowercase HRPs, which always encode.
        bech32::encode(self.hrp(), self.to_bytes().to_base32(), Variant::Bech32)
            .unwrap_or_default()
    }

    /// Decode a Bech32 address string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let (hrp, data, variant) = bech32::decode(s).map_err(bech32_error)?;
        if variant != Variant::Bech32 {
            return Err(AddressError::InvalidChecksum);
        }
        let bytes = Vec::<u8>::from_base32(&data).map_err(bech32_error)?;
        let address = Self::from_bytes(&bytes)?;

        // The prefix must agree with what the header says.
        if address.hrp() != hrp {
            return Err(AddressError::InvalidHrp);
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

fn bech32_error(e: bech32::Error) -> AddressError {
    match e {
        bech32::Error::MissingSeparator => AddressError::MissingSeparator,
        bech32::Error::InvalidChecksum => AddressError::InvalidChecksum,
        bech32::Error::InvalidChar(c) => AddressError::InvalidCharacter(c),
        bech32::Error::InvalidPadding => AddressError::InvalidPadding,
        bech32::Error::MixedCase => AddressError::MixedCase,
        _ => AddressError::InvalidLength,
    }
}
