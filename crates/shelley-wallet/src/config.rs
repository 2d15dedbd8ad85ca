//! Wallet engine configuration.

use serde::{Deserialize, Serialize};
use shelley_core::address::Network;
use std::path::PathBuf;

use crate::coin_selection::SelectionStrategy;
use crate::encryption::KdfParams;

/// Settings passed to [`WalletEngine`](crate::wallet::WalletEngine) at
/// construction. Nothing here is read from process-wide state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    /// Network every derived and accepted address must belong to.
    pub network: Network,
    /// Directory holding one `<wallet-id>.json` record per wallet.
    pub wallets_dir: PathBuf,
    /// Password hashing costs for newly saved records.
    #[serde(default)]
    pub kdf: KdfParams,
    /// Coin selection strategy for sends.
    #[serde(default)]
    pub selection: SelectionStrategy,
    /// Account index used for the wallet's keys.
    #[serde(default)]
    pub account: u32,
}

impl WalletConfig {
    /// Default settings for `network`, storing wallets under `wallets_dir`.
    pub fn new(network: Network, wallets_dir: impl Into<PathBuf>) -> Self {
        Self {
            network,
            wallets_dir: wallets_dir.into(),
            kdf: KdfParams::default(),
            selection: SelectionStrategy::default(),
            account: 0,
        }
    }

    /// `<data dir>/shelley-wallet/wallets`, falling back to the working
    /// directory when the platform has no data dir.
    pub fn default_wallets_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shelley-wallet")
            .join("wallets")
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::new(Network::Testnet, Self::default_wallets_dir())
    }
}
