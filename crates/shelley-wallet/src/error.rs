//! Wallet error types.

use shelley_core::error::{AddressError, CryptoError, LedgerError, TransactionError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Every variant is recoverable at the request boundary. Secret material
/// held by the failed operation is dropped (and zeroized) before the error
/// reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Unknown word, bad checksum or unsupported word count.
    #[error("invalid mnemonic: {0}")]
    InvalidPhrase(String),

    /// Key derivation failure (e.g. hardened child from a public-only key).
    #[error("key derivation: {0}")]
    Derivation(String),

    /// Wrong password or corrupted vault. Deliberately carries no detail.
    #[error("authentication failed")]
    Authentication,

    /// Insufficient funds to cover the amount plus fees.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Available lovelace.
        have: u64,
        /// Required lovelace.
        need: u64,
    },

    /// No UTXOs available for spending.
    #[error("no UTXOs available")]
    NoUtxos,

    /// Illegal draft transition or an unbalanced draft.
    #[error("malformed draft: {0}")]
    MalformedDraft(String),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid or foreign-network address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Missing or malformed request field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Wallet id outside `[A-Za-z0-9_-]{1,64}`.
    #[error("invalid wallet id: {0}")]
    InvalidWalletId(String),

    /// No record stored under this id.
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    /// A record already exists under this id.
    #[error("wallet already exists: {0}")]
    WalletExists(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Wallet record file is not valid JSON.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Cryptographic error from shelley-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Transaction encoding or validation error from shelley-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Address error from shelley-core.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Ledger query or submission failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Io(e.to_string())
    }
}
