//! Trait interfaces between the wallet and the outside world.
//!
//! - [`LedgerQuery`]: read-only view of the ledger (shelley-ledger implements)
//! - [`Broadcaster`]: transaction submission (shelley-ledger implements)
//!
//! Both are async and object safe so the wallet engine can hold them as
//! `Arc<dyn ...>` and tests can swap in in-memory mocks.

use async_trait::async_trait;

use crate::address::Address;
use crate::error::LedgerError;
use crate::types::{ProtocolParameters, TxId, Utxo};

/// Read-only ledger queries.
///
/// Implementations talk to untrusted services and must validate what they
/// return: amounts are parsed as `u64`, ids as 32-byte hashes.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// All unspent outputs currently held at `address`.
    ///
    /// An address the ledger has never seen has no UTXOs; that is `Ok(vec![])`,
    /// not an error.
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, LedgerError>;

    /// Current fee and size parameters.
    async fn protocol_parameters(&self) -> Result<ProtocolParameters, LedgerError>;

    /// Lovelace balance of `address`.
    ///
    /// Default implementation sums [`utxos`](Self::utxos).
    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.utxos(address).await?.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.amount)
                .ok_or_else(|| LedgerError::InvalidResponse("balance overflow".into()))
        })
    }
}

/// Submits signed transactions.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit a CBOR-encoded signed transaction, returning the id the ledger
    /// accepted it under.
    ///
    /// A failure after the request may have reached the ledger must surface as
    /// [`LedgerError::AmbiguousSubmission`], never as a retryable error.
    async fn submit(&self, signed_tx_cbor: &[u8]) -> Result<TxId, LedgerError>;
}
