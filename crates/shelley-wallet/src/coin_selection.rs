//! UTXO selection.
//!
//! Candidates are de-duplicated (a UTXO is consumed at most once) and put
//! in strategy order, then taken greedily until the caller's funding check
//! is satisfied. Selection never under-funds: it either returns a set that
//! passed the check or fails with [`WalletError::InsufficientFunds`].

use serde::{Deserialize, Serialize};
use shelley_core::types::Utxo;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::WalletError;

/// How candidate UTXOs are ordered and consumed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Largest amount first, ties broken by `(tx_id, index)`. Stops as soon
    /// as the target is covered.
    #[default]
    LargestFirst,
    /// Spend every available UTXO.
    All,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::LargestFirst => write!(f, "largest-first"),
            SelectionStrategy::All => write!(f, "all"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "largest-first" | "largest_first" | "largest" => Ok(SelectionStrategy::LargestFirst),
            "all" => Ok(SelectionStrategy::All),
            other => Err(WalletError::InvalidRequest(format!(
                "unknown selection strategy: {other}"
            ))),
        }
    }
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Chosen UTXOs, in the order they will appear as inputs.
    pub selected: Vec<Utxo>,
    /// Sum of the chosen amounts.
    pub total: u64,
}

/// Greedy UTXO selector.
pub struct CoinSelector;

impl CoinSelector {
    /// De-duplicate `utxos` and sort them for `strategy`.
    pub fn candidates(utxos: &[Utxo], strategy: SelectionStrategy) -> Vec<Utxo> {
        let mut seen = HashSet::with_capacity(utxos.len());
        let mut out: Vec<Utxo> = utxos
            .iter()
            .filter(|u| seen.insert(u.input))
            .cloned()
            .collect();
        if out.len() != utxos.len() {
            debug!(
                dropped = utxos.len() - out.len(),
                "coin_selection: ignored duplicate utxos"
            );
        }
        match strategy {
            SelectionStrategy::LargestFirst => {
                out.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.input.cmp(&b.input)));
            }
            SelectionStrategy::All => out.sort_by(|a, b| a.input.cmp(&b.input)),
        }
        out
    }

    /// Select inputs whose total reaches `target`.
    ///
    /// `target` must already include the fee. Fails with
    /// [`WalletError::NoUtxos`] on an empty set and
    /// [`WalletError::InsufficientFunds`] when the whole set falls short.
    pub fn select(
        utxos: &[Utxo],
        target: u64,
        strategy: SelectionStrategy,
    ) -> Result<CoinSelection, WalletError> {
        let (selection, ()) = Self::select_with(utxos, strategy, |_, total| {
            if total >= target {
                Ok(Some(()))
            } else {
                Err(WalletError::InsufficientFunds {
                    have: total,
                    need: target,
                })
            }
        })?;
        Ok(selection)
    }

    /// Select inputs until `fund` accepts the running selection.
    ///
    /// `fund` is called with the selection so far and its total. It returns
    /// `Ok(Some(_))` when the selection is sufficient and
    /// `Err(InsufficientFunds)` when more inputs are needed; any other error
    /// aborts selection. With [`SelectionStrategy::All`] it is called once,
    /// with every candidate.
    pub fn select_with<T, F>(
        utxos: &[Utxo],
        strategy: SelectionStrategy,
        mut fund: F,
    ) -> Result<(CoinSelection, T), WalletError>
    where
        F: FnMut(&[Utxo], u64) -> Result<Option<T>, WalletError>,
    {
        let candidates = Self::candidates(utxos, strategy);
        if candidates.is_empty() {
            return Err(WalletError::NoUtxos);
        }

        let mut selected = Vec::with_capacity(candidates.len());
        let mut total: u64 = 0;
        let mut shortfall = None;

        for (i, utxo) in candidates.iter().enumerate() {
            total = total
                .checked_add(utxo.amount)
                .ok_or_else(|| WalletError::InvalidAmount("utxo total overflow".into()))?;
            selected.push(utxo.clone());

            let last = i + 1 == candidates.len();
            if strategy == SelectionStrategy::All && !last {
                continue;
            }

            match fund(&selected, total) {
                Ok(Some(value)) => {
                    debug!(inputs = selected.len(), total, %strategy, "coin_selection: selected");
                    return Ok((CoinSelection { selected, total }, value));
                }
                Ok(None) => {}
                Err(WalletError::InsufficientFunds { need, .. }) => shortfall = Some(need),
                Err(e) => return Err(e),
            }
        }

        Err(WalletError::InsufficientFunds {
            have: total,
            need: shortfall.unwrap_or(total.saturating_add(1)),
        })
    }
}
