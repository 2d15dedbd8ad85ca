//! CLI configuration loaded from environment variables and flags.
//!
//! Flags win over the environment, which wins over built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use shelley_core::address::Network;
use shelley_ledger::LedgerConfig;
use shelley_ledger::config::DEFAULT_TIMEOUT;
use shelley_wallet::WalletConfig;

/// Values given on the command line; `None` falls through to the environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub network: Option<String>,
    pub wallet_dir: Option<PathBuf>,
    pub blockfrost_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub wallet: WalletConfig,
    pub ledger: LedgerConfig,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env(overrides: &Overrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with `env` standing in for the environment.
    pub fn resolve(overrides: &Overrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let network: Network = overrides
            .network
            .clone()
            .or_else(|| env("SHELLEY_NETWORK"))
            .unwrap_or_else(|| "testnet".to_string())
            .parse()
            .context("SHELLEY_NETWORK must be mainnet or testnet")?;

        let wallets_dir = overrides
            .wallet_dir
            .clone()
            .or_else(|| env("SHELLEY_WALLET_DIR").map(PathBuf::from))
            .unwrap_or_else(WalletConfig::default_wallets_dir);

        let project_id = env("BLOCKFROST_PROJECT_ID").unwrap_or_default();
        let mut ledger = LedgerConfig::for_network(network, project_id);
        if let Some(url) = overrides
            .blockfrost_url
            .clone()
            .or_else(|| env("BLOCKFROST_BASE_URL"))
        {
            ledger = ledger.with_base_url(url);
        }

        let timeout_ms: u64 = match env("SHELLEY_LEDGER_TIMEOUT_MS") {
            Some(raw) => raw
                .parse()
                .context("SHELLEY_LEDGER_TIMEOUT_MS must be a positive integer")?,
            None => DEFAULT_TIMEOUT.as_millis() as u64,
        };
        if timeout_ms == 0 {
            bail!("SHELLEY_LEDGER_TIMEOUT_MS must be a positive integer");
        }
        ledger.timeout = Duration::from_millis(timeout_ms);

        if let Some(raw) = env("SHELLEY_LEDGER_RETRIES") {
            ledger.retry.max_attempts = raw
                .parse()
                .context("SHELLEY_LEDGER_RETRIES must be a non-negative integer")?;
        }

        Ok(Self {
            wallet: WalletConfig::new(network, wallets_dir),
            ledger,
        })
    }

    /// Fail early when a ledger call is about to be made without an API key.
    pub fn require_project_id(&self) -> Result<()> {
        if self.ledger.project_id.is_empty() {
            bail!("BLOCKFROST_PROJECT_ID is required for ledger queries");
        }
        Ok(())
    }
}
