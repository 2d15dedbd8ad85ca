//! Transaction builder: coin selection, fee balancing and signing.
//!
//! 1. Add recipients (address + amount)
//! 2. Build an unsigned transaction (selects coins, balances the fee)
//! 3. Sign every input credential with the account's keys

use shelley_core::address::Address;
use shelley_core::error::CryptoError;
use shelley_core::types::{KeyHash, ProtocolParameters, SignedTransaction, TxIn, TxOut, Utxo};
use tracing::debug;

use crate::coin_selection::{CoinSelection, CoinSelector, SelectionStrategy};
use crate::draft::TransactionDraft;
use crate::error::WalletError;
use crate::fee::{Balanced, ChangeOutcome, FeeEstimator};
use crate::keys::AccountKeys;

/// A transaction recipient: address and amount.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Destination address.
    pub address: Address,
    /// Amount in lovelace.
    pub amount: u64,
}

/// A balanced, fee-finalized draft waiting for signatures.
#[derive(Debug)]
pub struct UnsignedTransaction {
    /// Draft in the `FeeFinalized` state.
    pub draft: TransactionDraft,
    /// The coin selection used to fund the draft.
    pub selection: CoinSelection,
    /// Final fee in lovelace, including folded dust.
    pub fee: u64,
    /// Change returned to the sender (zero when folded or exact).
    pub change: u64,
    /// Dust added to the fee instead of a change output.
    pub folded: u64,
    /// Credentials that must sign.
    pub required_signers: Vec<KeyHash>,
}

impl UnsignedTransaction {
    /// What happened to the value left after outputs and fee.
    pub fn change_outcome(&self) -> ChangeOutcome {
        match (self.change, self.folded) {
            (0, 0) => ChangeOutcome::Exact,
            (0, folded) => ChangeOutcome::Folded(folded),
            (change, _) => ChangeOutcome::Output(change),
        }
    }
}

/// Builder for constructing and signing transactions.
///
/// # Example
/// ```ignore
/// let mut unsigned = TransactionBuilder::new(params)
///     .add_recipient(address, 2_000_000)
///     .build(&utxos, &change_address)?;
/// let signed = TransactionBuilder::sign(&mut unsigned, &keys)?;
/// ```
pub struct TransactionBuilder {
    recipients: Vec<Recipient>,
    params: ProtocolParameters,
    strategy: SelectionStrategy,
    ttl: Option<u64>,
}

impl TransactionBuilder {
    /// Create a builder priced with `params`.
    pub fn new(params: ProtocolParameters) -> Self {
        Self {
            recipients: Vec::new(),
            params,
            strategy: SelectionStrategy::default(),
            ttl: None,
        }
    }

    /// Add a recipient to the transaction.
    pub fn add_recipient(&mut self, address: Address, amount: u64) -> &mut Self {
        self.recipients.push(Recipient { address, amount });
        self
    }

    /// Override the selection strategy (default: largest first).
    pub fn set_strategy(&mut self, strategy: SelectionStrategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    /// Set the time-to-live slot.
    pub fn set_ttl(&mut self, slot: u64) -> &mut Self {
        self.ttl = Some(slot);
        self
    }

    /// Select coins from `utxos` and produce a fee-finalized draft.
    ///
    /// Outputs are the recipients in the order they were added, followed by
    /// the change output to `change_address` when there is one.
    pub fn build(
        &self,
        utxos: &[Utxo],
        change_address: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        if self.recipients.is_empty() {
            return Err(WalletError::InvalidRequest("no recipients".into()));
        }

        let mut total_send: u64 = 0;
        for r in &self.recipients {
            if r.amount == 0 {
                return Err(WalletError::InvalidAmount("recipient amount is zero".into()));
            }
            if r.amount < self.params.min_utxo_value {
                return Err(WalletError::InvalidAmount(format!(
                    "{} is below the minimum UTXO value {}",
                    r.amount, self.params.min_utxo_value
                )));
            }
            if !r.address.is_payment() {
                return Err(WalletError::InvalidAddress(format!(
                    "{} cannot receive payments",
                    r.address
                )));
            }
            total_send = total_send
                .checked_add(r.amount)
                .ok_or_else(|| WalletError::InvalidAmount("total amount overflow".into()))?;
        }

        let outputs: Vec<TxOut> = self
            .recipients
            .iter()
            .map(|r| TxOut {
                address: r.address.clone(),
                amount: r.amount,
            })
            .collect();

        // Only key-locked outputs can be signed for.
        let spendable: Vec<Utxo> = utxos
            .iter()
            .filter(|u| u.address.payment_key_hash().is_some())
            .cloned()
            .collect();

        // A selection that has to fold dust into the fee is kept as a
        // fallback while more inputs may still produce a real change output.
        // Among folding selections the cheapest one wins.
        let estimator = FeeEstimator::new(self.params);
        let mut fallback: Option<(CoinSelection, Balanced)> = None;
        let result = CoinSelector::select_with(&spendable, self.strategy, |selected, total| {
            let inputs: Vec<TxIn> = selected.iter().map(|u| u.input).collect();
            let balanced = estimator.balance(
                &inputs,
                total,
                &outputs,
                change_address,
                self.ttl,
                signer_count(selected),
            )?;
            if balanced.folded > 0 && self.strategy == SelectionStrategy::LargestFirst {
                let cheaper = match &fallback {
                    Some((_, kept)) => balanced.fee < kept.fee,
                    None => true,
                };
                if cheaper {
                    fallback = Some((
                        CoinSelection {
                            selected: selected.to_vec(),
                            total,
                        },
                        balanced,
                    ));
                }
                return Ok(None);
            }
            Ok(Some(balanced))
        });
        let (selection, balanced) = match (result, fallback) {
            (Ok(found), _) => found,
            (Err(WalletError::InsufficientFunds { .. }), Some(folded)) => folded,
            (Err(e), _) => return Err(e),
        };

        let Balanced {
            body,
            fee,
            change,
            folded,
            size,
        } = balanced;

        let mut draft = TransactionDraft::new();
        if let Some(slot) = body.ttl {
            draft.set_ttl(slot)?;
        }
        for utxo in &selection.selected {
            draft.add_input(utxo.clone())?;
        }
        for output in body.outputs {
            draft.add_output(output)?;
        }
        let txid = draft.finalize_fee(fee)?;
        let required_signers = draft.required_signers();

        debug!(
            %txid,
            inputs = selection.selected.len(),
            amount = total_send,
            fee,
            change,
            folded,
            size,
            "builder: built unsigned transaction"
        );

        Ok(UnsignedTransaction {
            draft,
            selection,
            fee,
            change,
            folded,
            required_signers,
        })
    }

    /// Sign every required credential using `keys`.
    ///
    /// Fails with a missing-witness error if a credential belongs to a key
    /// the account does not hold.
    pub fn sign(
        unsigned: &mut UnsignedTransaction,
        keys: &AccountKeys,
    ) -> Result<SignedTransaction, WalletError> {
        for hash in &unsigned.required_signers {
            let keypair = keys
                .keypair_for(hash)
                .ok_or_else(|| CryptoError::MissingWitness(hash.to_string()))?;
            unsigned.draft.sign_with(keypair)?;
        }
        unsigned.draft.seal()
    }
}

fn signer_count(selected: &[Utxo]) -> usize {
    let mut hashes: Vec<KeyHash> = selected
        .iter()
        .filter_map(|u| u.address.payment_key_hash())
        .collect();
    hashes.sort();
    hashes.dedup();
    hashes.len().max(1)
}
