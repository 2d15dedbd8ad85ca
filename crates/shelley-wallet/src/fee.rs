//! Linear fee estimation and change computation.
//!
//! The fee is `a * size + b` where `size` is the serialized signed
//! transaction. Estimates are taken over the body with placeholder witnesses
//! (one per distinct input credential), which serialize to exactly the same
//! size as real ones.
//!
//! Writing the fee into the body can itself grow the body (a wider CBOR
//! integer), so [`FeeEstimator::balance`] raises the fee until it covers the
//! body it is written into.

use shelley_core::address::Address;
use shelley_core::error::TransactionError;
use shelley_core::types::{
    ProtocolParameters, SignedTransaction, TransactionBody, TxIn, TxOut, VkeyWitness,
};
use tracing::debug;

use crate::error::WalletError;

/// Upper bound on fee refinement rounds. The fee only grows, and the CBOR
/// width of the fee and change fields is bounded, so this is never reached
/// with sane parameters.
const MAX_FEE_ROUNDS: usize = 16;

/// A witness that serializes to the same size as a real one.
const PLACEHOLDER_WITNESS: VkeyWitness = VkeyWitness {
    vkey: [0; 32],
    signature: [0; 64],
};

/// What happened to the value left over after outputs and fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Inputs exactly cover outputs and fee.
    Exact,
    /// Leftover is large enough for its own output.
    Output(u64),
    /// Leftover is below the minimum UTXO value and was added to the fee.
    Folded(u64),
}

impl ChangeOutcome {
    /// Classify a leftover amount against the minimum UTXO value.
    pub fn classify(change: u64, min_utxo_value: u64) -> Self {
        match change {
            0 => ChangeOutcome::Exact,
            c if c < min_utxo_value => ChangeOutcome::Folded(c),
            c => ChangeOutcome::Output(c),
        }
    }
}

/// `total_in - total_out - fee`, or [`WalletError::InsufficientFunds`].
pub fn compute_change(total_in: u64, total_out: u64, fee: u64) -> Result<u64, WalletError> {
    let need = total_out
        .checked_add(fee)
        .ok_or(TransactionError::ValueOverflow)?;
    total_in
        .checked_sub(need)
        .ok_or(WalletError::InsufficientFunds {
            have: total_in,
            need,
        })
}

/// A balanced body: inputs equal outputs plus fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balanced {
    /// Body with recipients first and the change output (if any) last.
    pub body: TransactionBody,
    /// Final fee, including any folded dust.
    pub fee: u64,
    /// Change output amount, zero when there is none.
    pub change: u64,
    /// Dust added to the fee instead of creating a change output.
    pub folded: u64,
    /// Estimated signed size in bytes.
    pub size: u64,
}

/// Fee estimator bound to one set of protocol parameters.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimator {
    params: ProtocolParameters,
}

impl FeeEstimator {
    pub fn new(params: ProtocolParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    /// Serialized size of `body` once `witnesses` witnesses are attached.
    pub fn estimate_size(
        &self,
        body: &TransactionBody,
        witnesses: usize,
    ) -> Result<u64, WalletError> {
        let tx = SignedTransaction {
            body: body.clone(),
            witnesses: vec![PLACEHOLDER_WITNESS; witnesses],
        };
        Ok(tx.size()?)
    }

    /// Minimum fee for `body` signed by `witnesses` keys.
    pub fn estimate_fee(
        &self,
        body: &TransactionBody,
        witnesses: usize,
    ) -> Result<u64, WalletError> {
        let size = self.estimate_size(body, witnesses)?;
        Ok(self
            .params
            .min_fee(size)
            .ok_or(TransactionError::ValueOverflow)?)
    }

    /// Build a balanced body spending `inputs` (worth `total_in`) to `outputs`.
    ///
    /// Change goes to `change_address` when it reaches the minimum UTXO
    /// value; smaller change is folded into the fee. Fails with
    /// [`WalletError::InsufficientFunds`] when the inputs cannot cover the
    /// outputs and fee, and with an oversized-transaction error when the
    /// result exceeds `max_tx_size`.
    pub fn balance(
        &self,
        inputs: &[TxIn],
        total_in: u64,
        outputs: &[TxOut],
        change_address: &Address,
        ttl: Option<u64>,
        witnesses: usize,
    ) -> Result<Balanced, WalletError> {
        let total_out = outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
            .ok_or(TransactionError::ValueOverflow)?;

        let mut body = TransactionBody {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            fee: 0,
            ttl,
        };

        // With a change output.
        body.outputs.push(TxOut {
            address: change_address.clone(),
            amount: 0,
        });
        let mut fee = 0u64;
        for _ in 0..MAX_FEE_ROUNDS {
            let leftover = compute_change(total_in, total_out, fee)?;
            let change = match ChangeOutcome::classify(leftover, self.params.min_utxo_value) {
                ChangeOutcome::Output(change) => change,
                ChangeOutcome::Exact | ChangeOutcome::Folded(_) => break,
            };
            body.fee = fee;
            if let Some(last) = body.outputs.last_mut() {
                last.amount = change;
            }
            let needed = self.estimate_fee(&body, witnesses)?;
            if needed <= fee {
                return self.finish(body, fee, change, 0, witnesses);
            }
            fee = needed;
        }

        // Without one; the leftover becomes part of the fee.
        body.outputs.pop();
        let mut fee = 0u64;
        for _ in 0..MAX_FEE_ROUNDS {
            body.fee = fee;
            let needed = self.estimate_fee(&body, witnesses)?;
            if needed <= fee {
                break;
            }
            fee = needed;
        }
        let folded = compute_change(total_in, total_out, fee)?;
        body.fee = fee + folded;
        let needed = self.estimate_fee(&body, witnesses)?;
        if needed > body.fee {
            return Err(WalletError::InsufficientFunds {
                have: total_in,
                need: total_out.saturating_add(needed),
            });
        }
        let fee = body.fee;
        self.finish(body, fee, 0, folded, witnesses)
    }

    fn finish(
        &self,
        body: TransactionBody,
        fee: u64,
        change: u64,
        folded: u64,
        witnesses: usize,
    ) -> Result<Balanced, WalletError> {
        let size = self.estimate_size(&body, witnesses)?;
        if size > self.params.max_tx_size {
            return Err(TransactionError::OversizedTransaction {
                size,
                max: self.params.max_tx_size,
            }
            .into());
        }
        debug!(fee, change, folded, size, "fee: balanced body");
        Ok(Balanced {
            body,
            fee,
            change,
            folded,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelley_core::address::Network;
    use shelley_core::types::{KeyHash, TxId};

    fn addr(byte: u8) -> Address {
        Address::base(KeyHash([byte; 28]), KeyHash([byte ^ 0xFF; 28]), Network::Testnet)
    }

    fn input(byte: u8) -> TxIn {
        TxIn {
            tx_id: TxId([byte; 32]),
            index: 0,
        }
    }

    fn pay(amount: u64) -> Vec<TxOut> {
        vec![TxOut {
            address: addr(0x10),
            amount,
        }]
    }

    fn estimator() -> FeeEstimator {
        FeeEstimator::new(ProtocolParameters::default())
    }

    #[test]
    fn compute_change_exact() {
        assert_eq!(compute_change(5_000_000, 2_000_000, 170_000).unwrap(), 2_830_000);
        assert_eq!(compute_change(100, 60, 40).unwrap(), 0);
    }

    #[test]
    fn compute_change_insufficient() {
        assert_eq!(
            compute_change(1_000_000, 2_000_000, 170_000).unwrap_err(),
            WalletError::InsufficientFunds {
                have: 1_000_000,
                need: 2_170_000
            }
        );
    }

    #[test]
    fn compute_change_overflow() {
        assert!(matches!(
            compute_change(10, u64::MAX, 1),
            Err(WalletError::Transaction(TransactionError::ValueOverflow))
        ));
    }

    #[test]
    fn classify_change() {
        assert_eq!(ChangeOutcome::classify(0, 1_000_000), ChangeOutcome::Exact);
        assert_eq!(ChangeOutcome::classify(999_999, 1_000_000), ChangeOutcome::Folded(999_999));
        assert_eq!(ChangeOutcome::classify(1_000_000, 1_000_000), ChangeOutcome::Output(1_000_000));
    }

    #[test]
    fn fee_is_linear_in_size() {
        let body = TransactionBody {
            inputs: vec![input(1)],
            outputs: pay(2_000_000),
            fee: 0,
            ttl: None,
        };
        let est = estimator();
        let size = est.estimate_size(&body, 1).unwrap();
        assert_eq!(est.estimate_fee(&body, 1).unwrap(), 44 * size + 155_381);
    }

    #[test]
    fn witnesses_increase_estimate() {
        let body = TransactionBody {
            inputs: vec![input(1)],
            outputs: pay(2_000_000),
            fee: 0,
            ttl: None,
        };
        let est = estimator();
        let one = est.estimate_fee(&body, 1).unwrap();
        let two = est.estimate_fee(&body, 2).unwrap();
        assert_eq!(two - one, 44 * 101);
    }

    #[test]
    fn balance_with_change() {
        let est = estimator();
        let b = est
            .balance(&[input(1)], 5_000_000, &pay(2_000_000), &addr(0x20), None, 1)
            .unwrap();
        assert_eq!(b.body.outputs.len(), 2);
        assert_eq!(b.folded, 0);
        assert_eq!(b.change, 5_000_000 - 2_000_000 - b.fee);
        assert_eq!(b.body.total_output().unwrap() + b.body.fee, 5_000_000);
        // The fee covers the body it is written into.
        assert!(est.estimate_fee(&b.body, 1).unwrap() <= b.fee);
    }

    #[test]
    fn balance_folds_dust_into_fee() {
        let est = estimator();
        // Leaves roughly 500_000 - fee, under the 1 ADA minimum.
        let b = est
            .balance(&[input(1)], 2_500_000, &pay(2_000_000), &addr(0x20), None, 1)
            .unwrap();
        assert_eq!(b.body.outputs.len(), 1);
        assert_eq!(b.change, 0);
        assert!(b.folded > 0);
        assert_eq!(b.fee, 500_000);
        assert_eq!(b.body.fee, 500_000);
        assert!(est.estimate_fee(&b.body, 1).unwrap() + b.folded <= b.fee);
    }

    #[test]
    fn balance_insufficient() {
        let err = estimator()
            .balance(&[input(1)], 2_050_000, &pay(2_000_000), &addr(0x20), None, 1)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { have: 2_050_000, .. }));
    }

    #[test]
    fn balance_rejects_oversized() {
        let params = ProtocolParameters {
            max_tx_size: 100,
            ..ProtocolParameters::default()
        };
        let err = FeeEstimator::new(params)
            .balance(&[input(1)], 5_000_000, &pay(2_000_000), &addr(0x20), None, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::Transaction(TransactionError::OversizedTransaction { max: 100, .. })
        ));
    }

    #[test]
    fn balance_keeps_ttl() {
        let b = estimator()
            .balance(&[input(1)], 5_000_000, &pay(2_000_000), &addr(0x20), Some(1234), 1)
            .unwrap();
        assert_eq!(b.body.ttl, Some(1234));
    }

    // --- proptest ---

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn balance_conserves_value(
            total_in in 1_000_000u64..20_000_000,
            amount in 1_000_000u64..20_000_000,
            witnesses in 1usize..4,
        ) {
            let est = estimator();
            match est.balance(&[input(1)], total_in, &pay(amount), &addr(0x20), None, witnesses) {
                Ok(b) => {
                    prop_assert_eq!(b.body.total_output().unwrap() + b.body.fee, total_in);
                    prop_assert_eq!(b.body.fee, b.fee);
                    prop_assert!(b.fee >= est.estimate_fee(&b.body, witnesses).unwrap());
                    prop_assert!(b.change == 0 || b.change >= est.params().min_utxo_value);
                    prop_assert_eq!(b.body.outputs.len(), if b.change > 0 { 2 } else { 1 });
                    prop_assert!(b.change == 0 || b.folded == 0);
                }
                Err(WalletError::InsufficientFunds { have, need }) => {
                    prop_assert_eq!(have, total_in);
                    prop_assert!(need > have);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
