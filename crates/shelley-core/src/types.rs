//! Core protocol types: hashes, UTXOs, transaction bodies and witnesses.
//!
//! All monetary values are in lovelace (1 ADA = 10^6 lovelace) and use u64.
//!
//! Bodies and signed transactions have a canonical CBOR form (definite
//! lengths, minimal integer heads, map keys in ascending order). The
//! transaction id is the Blake2b-256 hash of the body's CBOR bytes, so
//! input and output order are part of the id.

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::address::Address;
use crate::constants::{
    DEFAULT_MAX_TX_SIZE, DEFAULT_MIN_FEE_A, DEFAULT_MIN_FEE_B, DEFAULT_MIN_UTXO_VALUE,
    KEY_HASH_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN, TX_ID_LEN,
};
use crate::crypto::blake2b_256;
use crate::error::TransactionError;

/// A 28-byte Blake2b-224 credential hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHash(pub [u8; KEY_HASH_LEN]);

impl KeyHash {
    /// Create from a slice; `None` unless it is exactly 28 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A 32-byte transaction id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId(pub [u8; TX_ID_LEN]);

impl TxId {
    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; TX_ID_LEN] {
        &self.0
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s).map_err(|e| TransactionError::Decode(e.to_string()))?;
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| TransactionError::Decode("tx id must be 32 bytes".into()))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for TxId {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to an output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxIn {
    /// Transaction that created the output.
    pub tx_id: TxId,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

/// A transaction output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub address: Address,
    /// Value in lovelace.
    pub amount: u64,
}

/// An unspent output as reported by the ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub input: TxIn,
    pub address: Address,
    /// Value in lovelace.
    pub amount: u64,
}

/// The signed portion of a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionBody {
    /// Inputs in caller order.
    pub inputs: Vec<TxIn>,
    /// Outputs in caller order.
    pub outputs: Vec<TxOut>,
    /// Fee in lovelace.
    pub fee: u64,
    /// Slot after which the transaction is invalid.
    pub ttl: Option<u64>,
}

impl TransactionBody {
    /// Sum of all output amounts. Returns None on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }

    fn to_value(&self) -> Value {
        let inputs = self
            .inputs
            .iter()
            .map(|i| {
                Value::Array(vec![
                    Value::Bytes(i.tx_id.0.to_vec()),
                    uint(u64::from(i.index)),
                ])
            })
            .collect();
        let outputs = self
            .outputs
            .iter()
            .map(|o| Value::Array(vec![Value::Bytes(o.address.to_bytes()), uint(o.amount)]))
            .collect();

        let mut map = vec![
            (uint(0), Value::Array(inputs)),
            (uint(1), Value::Array(outputs)),
            (uint(2), uint(self.fee)),
        ];
        if let Some(ttl) = self.ttl {
            map.push((uint(3), uint(ttl)));
        }
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, TransactionError> {
        let map = value.as_map().ok_or_else(|| decode_err("body is not a map"))?;

        let mut inputs = None;
        let mut outputs = None;
        let mut fee = None;
        let mut ttl = None;
        for (key, val) in map {
            match as_u64(key)? {
                0 => {
                    let items = as_array(val)?;
                    let mut parsed = Vec::with_capacity(items.len());
                    for item in items {
                        let pair = as_pair(item)?;
                        let tx_id = TxId(as_fixed_bytes::<TX_ID_LEN>(&pair[0])?);
                        let index = u32::try_from(as_u64(&pair[1])?)
                            .map_err(|_| decode_err("input index out of range"))?;
                        parsed.push(TxIn { tx_id, index });
                    }
                    inputs = Some(parsed);
                }
                1 => {
                    let items = as_array(val)?;
                    let mut parsed = Vec::with_capacity(items.len());
                    for item in items {
                        let pair = as_pair(item)?;
                        let raw = pair[0]
                            .as_bytes()
                            .ok_or_else(|| decode_err("output address is not bytes"))?;
                        let address = Address::from_bytes(raw)
                            .map_err(|e| TransactionError::Decode(e.to_string()))?;
                        parsed.push(TxOut {
                            address,
                            amount: as_u64(&pair[1])?,
                        });
                    }
                    outputs = Some(parsed);
                }
                2 => fee = Some(as_u64(val)?),
                3 => ttl = Some(as_u64(val)?),
                other => return Err(TransactionError::Decode(format!("unknown body key {other}"))),
            }
        }

        Ok(Self {
            inputs: inputs.ok_or_else(|| decode_err("missing inputs"))?,
            outputs: outputs.ok_or_else(|| decode_err("missing outputs"))?,
            fee: fee.ok_or_else(|| decode_err("missing fee"))?,
            ttl,
        })
    }

    /// Canonical CBOR encoding of the body.
    pub fn to_cbor(&self) -> Result<Vec<u8>, TransactionError> {
        encode(&self.to_value())
    }

    /// Decode a body from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TransactionError> {
        Self::from_value(&decode(bytes)?)
    }

    /// Transaction id: Blake2b-256 of the body CBOR.
    pub fn id(&self) -> Result<TxId, TransactionError> {
        Ok(TxId(blake2b_256(&self.to_cbor()?)))
    }
}

/// A verification-key witness: the signer's public key and its signature
/// over the transaction id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VkeyWitness {
    pub vkey: [u8; PUBLIC_KEY_LEN],
    pub signature: [u8; SIGNATURE_LEN],
}

impl VkeyWitness {
    fn to_value(self) -> Value {
        Value::Array(vec![
            Value::Bytes(self.vkey.to_vec()),
            Value::Bytes(self.signature.to_vec()),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, TransactionError> {
        let pair = as_pair(value)?;
        Ok(Self {
            vkey: as_fixed_bytes::<PUBLIC_KEY_LEN>(&pair[0])?,
            signature: as_fixed_bytes::<SIGNATURE_LEN>(&pair[1])?,
        })
    }
}

/// A body with its witness set, ready for submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub body: TransactionBody,
    pub witnesses: Vec<VkeyWitness>,
}

impl SignedTransaction {
    fn to_value(&self) -> Value {
        let witnesses = self.witnesses.iter().map(|w| w.to_value()).collect();
        Value::Array(vec![
            self.body.to_value(),
            Value::Map(vec![(uint(0), Value::Array(witnesses))]),
            Value::Bool(true),
            Value::Null,
        ])
    }

    /// CBOR encoding: `[body, {0: [[vkey, sig]...]}, true, null]`.
    pub fn to_cbor(&self) -> Result<Vec<u8>, TransactionError> {
        encode(&self.to_value())
    }

    /// Decode a signed transaction from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TransactionError> {
        let value = decode(bytes)?;
        let items = as_array(&value)?;
        if items.len() != 4 {
            return Err(decode_err("signed transaction must have 4 elements"));
        }
        let body = TransactionBody::from_value(&items[0])?;

        let mut witnesses = Vec::new();
        let set = items[1]
            .as_map()
            .ok_or_else(|| decode_err("witness set is not a map"))?;
        for (key, val) in set {
            match as_u64(key)? {
                0 => {
                    for w in as_array(val)? {
                        witnesses.push(VkeyWitness::from_value(w)?);
                    }
                }
                other => {
                    return Err(TransactionError::Decode(format!(
                        "unsupported witness kind {other}"
                    )));
                }
            }
        }

        if items[2].as_bool() != Some(true) || !items[3].is_null() {
            return Err(decode_err("unsupported validity flag or auxiliary data"));
        }
        Ok(Self { body, witnesses })
    }

    /// Id of the contained body.
    pub fn id(&self) -> Result<TxId, TransactionError> {
        self.body.id()
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> Result<u64, TransactionError> {
        Ok(self.to_cbor()?.len() as u64)
    }
}

/// Fee and size parameters supplied by the ledger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolParameters {
    /// Lovelace per byte of serialized transaction.
    pub min_fee_a: u64,
    /// Constant lovelace added to every fee.
    pub min_fee_b: u64,
    /// Smallest value an output may carry.
    pub min_utxo_value: u64,
    /// Largest serialized transaction the ledger accepts.
    pub max_tx_size: u64,
}

impl ProtocolParameters {
    /// Linear fee `a * size + b`. Returns None on overflow.
    pub fn min_fee(&self, size: u64) -> Option<u64> {
        self.min_fee_a.checked_mul(size)?.checked_add(self.min_fee_b)
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            min_fee_a: DEFAULT_MIN_FEE_A,
            min_fee_b: DEFAULT_MIN_FEE_B,
            min_utxo_value: DEFAULT_MIN_UTXO_VALUE,
            max_tx_size: DEFAULT_MAX_TX_SIZE,
        }
    }
}

// --- CBOR helpers ---

fn uint(v: u64) -> Value {
    Value::Integer(Integer::from(v))
}

fn decode_err(msg: &str) -> TransactionError {
    TransactionError::Decode(msg.to_string())
}

fn encode(value: &Value) -> Result<Vec<u8>, TransactionError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| TransactionError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode(bytes: &[u8]) -> Result<Value, TransactionError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| TransactionError::Decode(e.to_string()))?;
    if cursor.position() != bytes.len() as u64 {
        return Err(decode_err("trailing bytes"));
    }
    Ok(value)
}

fn as_u64(value: &Value) -> Result<u64, TransactionError> {
    let int = value
        .as_integer()
        .ok_or_else(|| decode_err("expected unsigned integer"))?;
    u64::try_from(int).map_err(|_| decode_err("integer out of range"))
}

fn as_array(value: &Value) -> Result<&Vec<Value>, TransactionError> {
    value.as_array().ok_or_else(|| decode_err("expected array"))
}

fn as_pair(value: &Value) -> Result<&[Value], TransactionError> {
    let items = as_array(value)?;
    if items.len() != 2 {
        return Err(decode_err("expected 2-element array"));
    }
    Ok(items.as_slice())
}

fn as_fixed_bytes<const N: usize>(value: &Value) -> Result<[u8; N], TransactionError> {
    value
        .as_bytes()
        .and_then(|b| <[u8; N]>::try_from(b.as_slice()).ok())
        .ok_or_else(|| TransactionError::Decode(format!("expected {N} bytes")))
}
