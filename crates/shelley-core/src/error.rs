//! Error types for the Shelley wallet core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("serialization: {0}")] Serialization(String),
    #[error("malformed transaction encoding: {0}")] Decode(String),
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: u64, max: u64 },
    #[error("unbalanced: inputs {inputs} != outputs {outputs} + fee {fee}")] Unbalanced { inputs: u64, outputs: u64, fee: u64 },
    #[error("input consumed twice: {0}")] DuplicateInput(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("witness key {0} does not match any input credential")] UnknownWitness(String),
    #[error("no witness for input credential {0}")] MissingWitness(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("unsupported address header: {0:#04x}")] UnsupportedHeader(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
    #[error("network mismatch: expected {expected}, got {got}")] NetworkMismatch { expected: String, got: String },
}

/// Failures of the ledger-query and broadcast collaborators.
///
/// Only [`LedgerError::Unavailable`] is transient; everything else is
/// terminal for the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")] Unavailable(String),
    #[error("rejected by ledger: {0}")] Rejected(String),
    #[error("submission outcome unknown: {0}")] AmbiguousSubmission(String),
    #[error("invalid ledger response: {0}")] InvalidResponse(String),
    #[error("ledger request failed: {0}")] Request(String),
}

impl LedgerError {
    /// Whether a retry of the same request is safe and may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}
