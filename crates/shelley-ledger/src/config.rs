//! Ledger client configuration.

use shelley_core::address::Network;
use std::fmt;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Blockfrost endpoint for mainnet.
pub const MAINNET_URL: &str = "https://cardano-mainnet.blockfrost.io/api/v0";
/// Blockfrost endpoint for the preprod test network.
pub const PREPROD_URL: &str = "https://cardano-preprod.blockfrost.io/api/v0";

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the ledger.
#[derive(Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Blockfrost project id, sent as the `project_id` header.
    pub project_id: String,
    /// Timeout for each individual HTTP request.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl LedgerConfig {
    /// Defaults for `network` with the given project id.
    pub fn for_network(network: Network, project_id: impl Into<String>) -> Self {
        let base_url = match network {
            Network::Mainnet => MAINNET_URL,
            Network::Testnet => PREPROD_URL,
        };
        Self {
            base_url: base_url.to_string(),
            project_id: project_id.into(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the API root, trimming any trailing slash.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::for_network(Network::Testnet, String::new())
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("base_url", &self.base_url)
            .field("project_id", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_network() {
        assert_eq!(LedgerConfig::for_network(Network::Mainnet, "k").base_url, MAINNET_URL);
        assert_eq!(LedgerConfig::for_network(Network::Testnet, "k").base_url, PREPROD_URL);
        assert_eq!(LedgerConfig::default().base_url, PREPROD_URL);
    }

    #[test]
    fn custom_base_url_is_trimmed() {
        let config = LedgerConfig::default().with_base_url("http://localhost:3000/api/");
        assert_eq!(config.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn debug_hides_project_id() {
        let config = LedgerConfig::for_network(Network::Mainnet, "mainnetSECRET");
        assert!(!format!("{config:?}").contains("SECRET"));
    }
}
