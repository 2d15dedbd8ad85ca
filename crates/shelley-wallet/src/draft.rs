//! Transaction draft state machine.
//!
//! ```text
//! Empty -> InputsAdded -> OutputsAdded -> FeeFinalized -> Signed -> Submitted
//! ```
//!
//! Inputs and outputs are append-only and keep caller order, since order is
//! part of the transaction id. Once signed, a draft is frozen; changing
//! anything means starting a new draft.

use shelley_core::crypto::{KeyPair, sign_tx_id, verify_witness};
use shelley_core::error::{CryptoError, TransactionError};
use shelley_core::types::{
    KeyHash, SignedTransaction, TransactionBody, TxId, TxOut, Utxo, VkeyWitness,
};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::error::WalletError;

/// Lifecycle stage of a [`TransactionDraft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DraftState {
    Empty,
    InputsAdded,
    OutputsAdded,
    FeeFinalized,
    Signed,
    Submitted,
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An in-progress transfer.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    state: DraftState,
    inputs: Vec<Utxo>,
    outputs: Vec<TxOut>,
    ttl: Option<u64>,
    body: Option<TransactionBody>,
    tx_id: Option<TxId>,
    witnesses: Vec<VkeyWitness>,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self {
            state: DraftState::Empty,
            inputs: Vec::new(),
            outputs: Vec::new(),
            ttl: None,
            body: None,
            tx_id: None,
            witnesses: Vec::new(),
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    fn expect_state(&self, allowed: &[DraftState], op: &str) -> Result<(), WalletError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WalletError::MalformedDraft(format!(
                "{op} not allowed in state {}",
                self.state
            )))
        }
    }

    /// Append an input. The UTXO must be locked by a key credential.
    pub fn add_input(&mut self, utxo: Utxo) -> Result<&mut Self, WalletError> {
        self.expect_state(&[DraftState::Empty, DraftState::InputsAdded], "add_input")?;
        if utxo.address.payment_key_hash().is_none() {
            return Err(WalletError::MalformedDraft(format!(
                "input {} is not locked by a key",
                utxo.input
            )));
        }
        if self.inputs.iter().any(|u| u.input == utxo.input) {
            return Err(TransactionError::DuplicateInput(utxo.input.to_string()).into());
        }
        self.inputs.push(utxo);
        self.state = DraftState::InputsAdded;
        Ok(self)
    }

    /// Append an output. Requires at least one input.
    pub fn add_output(&mut self, output: TxOut) -> Result<&mut Self, WalletError> {
        self.expect_state(&[DraftState::InputsAdded, DraftState::OutputsAdded], "add_output")?;
        if output.amount == 0 {
            return Err(WalletError::InvalidAmount("output amount is zero".into()));
        }
        if !output.address.is_payment() {
            return Err(WalletError::InvalidAddress(
                "cannot pay to a reward address".into(),
            ));
        }
        self.outputs.push(output);
        self.state = DraftState::OutputsAdded;
        Ok(self)
    }

    /// Set the validity upper bound (slot). Allowed until the fee is final.
    pub fn set_ttl(&mut self, slot: u64) -> Result<&mut Self, WalletError> {
        self.expect_state(
            &[DraftState::Empty, DraftState::InputsAdded, DraftState::OutputsAdded],
            "set_ttl",
        )?;
        self.ttl = Some(slot);
        Ok(self)
    }

    /// Body for `fee`, failing unless inputs equal outputs plus fee.
    ///
    /// No change is invented here: any change must already be an output.
    pub fn build(&self, fee: u64) -> Result<TransactionBody, WalletError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(WalletError::MalformedDraft(
                "draft needs at least one input and one output".into(),
            ));
        }
        let total_in = self
            .inputs
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.amount))
            .ok_or(TransactionError::ValueOverflow)?;
        let body = TransactionBody {
            inputs: self.inputs.iter().map(|u| u.input).collect(),
            outputs: self.outputs.clone(),
            fee,
            ttl: self.ttl,
        };
        let total_out = body.total_output().ok_or(TransactionError::ValueOverflow)?;
        if total_out.checked_add(fee) != Some(total_in) {
            return Err(WalletError::MalformedDraft(
                TransactionError::Unbalanced {
                    inputs: total_in,
                    outputs: total_out,
                    fee,
                }
                .to_string(),
            ));
        }
        Ok(body)
    }

    /// Fix the fee, freezing inputs and outputs.
    pub fn finalize_fee(&mut self, fee: u64) -> Result<TxId, WalletError> {
        self.expect_state(&[DraftState::OutputsAdded], "finalize_fee")?;
        let body = self.build(fee)?;
        let id = body.id()?;
        self.body = Some(body);
        self.tx_id = Some(id);
        self.state = DraftState::FeeFinalized;
        debug!(txid = %id, fee, "draft: fee finalized");
        Ok(id)
    }

    /// The finalized body.
    pub fn body(&self) -> Result<&TransactionBody, WalletError> {
        self.body
            .as_ref()
            .ok_or_else(|| WalletError::MalformedDraft("fee not finalized".into()))
    }

    /// Id of the finalized body.
    pub fn tx_id(&self) -> Result<TxId, WalletError> {
        self.tx_id
            .ok_or_else(|| WalletError::MalformedDraft("fee not finalized".into()))
    }

    /// Distinct payment key hashes that must sign, in first-use order.
    pub fn required_signers(&self) -> Vec<KeyHash> {
        let mut seen = BTreeSet::new();
        self.inputs
            .iter()
            .filter_map(|u| u.address.payment_key_hash())
            .filter(|h| seen.insert(*h))
            .collect()
    }

    /// Attach an externally produced witness.
    ///
    /// The signature must verify over the body id and come from one of the
    /// input credentials. Re-adding a witness for the same key replaces it.
    pub fn add_witness(&mut self, witness: VkeyWitness) -> Result<&mut Self, WalletError> {
        self.expect_state(&[DraftState::FeeFinalized], "add_witness")?;
        let id = self.tx_id()?;
        let signer = verify_witness(&id, &witness)?;
        if !self.required_signers().contains(&signer) {
            return Err(CryptoError::UnknownWitness(signer.to_string()).into());
        }
        self.witnesses.retain(|w| w.vkey != witness.vkey);
        self.witnesses.push(witness);
        Ok(self)
    }

    /// Sign the finalized body with `keypair` and attach the witness.
    pub fn sign_with(&mut self, keypair: &KeyPair) -> Result<&mut Self, WalletError> {
        self.expect_state(&[DraftState::FeeFinalized], "sign")?;
        let witness = sign_tx_id(&self.tx_id()?, keypair);
        self.add_witness(witness)
    }

    /// Check the witness set and move to `Signed`.
    pub fn seal(&mut self) -> Result<SignedTransaction, WalletError> {
        self.expect_state(&[DraftState::FeeFinalized], "seal")?;
        let body = self.body()?.clone();
        let signed = assemble(body, self.witnesses.clone(), &self.required_signers())?;
        self.state = DraftState::Signed;
        Ok(signed)
    }

    /// Record that the ledger accepted the transaction.
    pub fn mark_submitted(&mut self, accepted: &TxId) -> Result<(), WalletError> {
        self.expect_state(&[DraftState::Signed], "mark_submitted")?;
        let id = self.tx_id()?;
        if *accepted != id {
            return Err(WalletError::MalformedDraft(format!(
                "ledger returned id {accepted}, expected {id}"
            )));
        }
        self.state = DraftState::Submitted;
        Ok(())
    }
}

/// Combine a body and witnesses into a signed transaction.
///
/// Every witness must verify over the body id and belong to one of
/// `required`, and every credential in `required` must have a witness.
pub fn assemble(
    body: TransactionBody,
    witnesses: Vec<VkeyWitness>,
    required: &[KeyHash],
) -> Result<SignedTransaction, WalletError> {
    let id = body.id()?;
    let mut covered = BTreeSet::new();
    for witness in &witnesses {
        let signer = verify_witness(&id, witness)?;
        if !required.contains(&signer) {
            return Err(CryptoError::UnknownWitness(signer.to_string()).into());
        }
        covered.insert(signer);
    }
    if let Some(missing) = required.iter().find(|h| !covered.contains(*h)) {
        return Err(CryptoError::MissingWitness(missing.to_string()).into());
    }
    Ok(SignedTransaction { body, witnesses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelley_core::address::{Address, Network};
    use shelley_core::types::TxIn;

    fn keypair(byte: u8) -> KeyPair {
        let mut kl = [byte; 32];
        kl[0] &= 0xF8;
        kl[31] &= 0x1F;
        kl[31] |= 0x40;
        KeyPair::from_extended(kl, [byte.wrapping_add(1); 32]).unwrap()
    }

    fn utxo_for(kp: &KeyPair, id: u8, amount: u64) -> Utxo {
        Utxo {
            input: TxIn {
                tx_id: TxId([id; 32]),
                index: 0,
            },
            address: Address::enterprise(kp.public_key().key_hash(), Network::Testnet),
            amount,
        }
    }

    fn out(amount: u64) -> TxOut {
        TxOut {
            address: Address::enterprise(KeyHash([9; 28]), Network::Testnet),
            amount,
        }
    }

    fn finalized(kp: &KeyPair) -> TransactionDraft {
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(kp, 1, 3_000_000)).unwrap();
        d.add_output(out(2_800_000)).unwrap();
        d.finalize_fee(200_000).unwrap();
        d
    }

    #[test]
    fn happy_path_walks_every_state() {
        let kp = keypair(1);
        let mut d = TransactionDraft::new();
        assert_eq!(d.state(), DraftState::Empty);
        d.add_input(utxo_for(&kp, 1, 3_000_000)).unwrap();
        assert_eq!(d.state(), DraftState::InputsAdded);
        d.add_output(out(2_800_000)).unwrap();
        assert_eq!(d.state(), DraftState::OutputsAdded);
        let id = d.finalize_fee(200_000).unwrap();
        assert_eq!(d.state(), DraftState::FeeFinalized);
        d.sign_with(&kp).unwrap();
        let signed = d.seal().unwrap();
        assert_eq!(d.state(), DraftState::Signed);
        assert_eq!(signed.id().unwrap(), id);
        d.mark_submitted(&id).unwrap();
        assert_eq!(d.state(), DraftState::Submitted);
    }

    #[test]
    fn output_before_input_rejected() {
        let mut d = TransactionDraft::new();
        assert!(matches!(d.add_output(out(1)), Err(WalletError::MalformedDraft(_))));
    }

    #[test]
    fn finalize_requires_outputs() {
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&keypair(1), 1, 100)).unwrap();
        assert!(matches!(d.finalize_fee(100), Err(WalletError::MalformedDraft(_))));
    }

    #[test]
    fn unbalanced_draft_rejected() {
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&keypair(1), 1, 3_000_000)).unwrap();
        d.add_output(out(2_000_000)).unwrap();
        // 1_000_000 unaccounted for; no implicit change.
        assert!(matches!(d.finalize_fee(200_000), Err(WalletError::MalformedDraft(_))));
        assert_eq!(d.state(), DraftState::OutputsAdded);
    }

    #[test]
    fn duplicate_input_rejected() {
        let kp = keypair(1);
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&kp, 1, 100)).unwrap();
        assert!(matches!(
            d.add_input(utxo_for(&kp, 1, 100)),
            Err(WalletError::Transaction(TransactionError::DuplicateInput(_)))
        ));
    }

    #[test]
    fn zero_output_rejected() {
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&keypair(1), 1, 100)).unwrap();
        assert!(matches!(d.add_output(out(0)), Err(WalletError::InvalidAmount(_))));
    }

    #[test]
    fn order_is_preserved() {
        let kp = keypair(1);
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&kp, 5, 1_000)).unwrap();
        d.add_input(utxo_for(&kp, 2, 1_000)).unwrap();
        d.add_output(out(1_500)).unwrap();
        d.add_output(out(400)).unwrap();
        let body = d.build(100).unwrap();
        assert_eq!(body.inputs[0].tx_id, TxId([5; 32]));
        assert_eq!(body.outputs[0].amount, 1_500);
    }

    #[test]
    fn signed_draft_is_frozen() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        d.sign_with(&kp).unwrap();
        d.seal().unwrap();
        assert!(d.add_input(utxo_for(&kp, 7, 1)).is_err());
        assert!(d.add_output(out(1)).is_err());
        assert!(d.sign_with(&kp).is_err());
        assert!(d.seal().is_err());
        assert!(d.set_ttl(5).is_err());
    }

    #[test]
    fn seal_without_witness_fails() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        assert!(matches!(
            d.seal(),
            Err(WalletError::Crypto(CryptoError::MissingWitness(_)))
        ));
    }

    #[test]
    fn foreign_signer_rejected() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        assert!(matches!(
            d.sign_with(&keypair(2)),
            Err(WalletError::Crypto(CryptoError::UnknownWitness(_)))
        ));
    }

    #[test]
    fn witness_over_other_body_rejected() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        let forged = sign_tx_id(&TxId([0xAB; 32]), &kp);
        assert!(matches!(d.add_witness(forged), Err(WalletError::Crypto(_))));
    }

    #[test]
    fn two_signers_for_two_credentials() {
        let (a, b) = (keypair(1), keypair(2));
        let mut d = TransactionDraft::new();
        d.add_input(utxo_for(&a, 1, 2_000_000)).unwrap();
        d.add_input(utxo_for(&b, 2, 2_000_000)).unwrap();
        d.add_output(out(3_800_000)).unwrap();
        d.finalize_fee(200_000).unwrap();
        assert_eq!(d.required_signers().len(), 2);
        d.sign_with(&a).unwrap();
        assert!(d.clone().seal().is_err());
        d.sign_with(&b).unwrap();
        let signed = d.seal().unwrap();
        assert_eq!(signed.witnesses.len(), 2);
    }

    #[test]
    fn resigning_same_key_does_not_duplicate() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        d.sign_with(&kp).unwrap();
        d.sign_with(&kp).unwrap();
        assert_eq!(d.seal().unwrap().witnesses.len(), 1);
    }

    #[test]
    fn mark_submitted_checks_id() {
        let kp = keypair(1);
        let mut d = finalized(&kp);
        d.sign_with(&kp).unwrap();
        d.seal().unwrap();
        assert!(d.mark_submitted(&TxId([0; 32])).is_err());
        assert_eq!(d.state(), DraftState::Signed);
    }

    #[test]
    fn assemble_checks_witnesses() {
        let kp = keypair(1);
        let d = finalized(&kp);
        let body = d.body().unwrap().clone();
        let required = d.required_signers();
        let good = sign_tx_id(&body.id().unwrap(), &kp);
        assert!(assemble(body.clone(), vec![good], &required).is_ok());
        let stranger = sign_tx_id(&body.id().unwrap(), &keypair(3));
        assert!(matches!(
            assemble(body.clone(), vec![good, stranger], &required),
            Err(WalletError::Crypto(CryptoError::UnknownWitness(_)))
        ));
        assert!(matches!(
            assemble(body, vec![], &required),
            Err(WalletError::Crypto(CryptoError::MissingWitness(_)))
        ));
    }
}
