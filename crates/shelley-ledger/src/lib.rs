//! # shelley-ledger: ledger collaborators over the Blockfrost HTTP API.
//!
//! [`BlockfrostClient`] implements [`LedgerQuery`](shelley_core::traits::LedgerQuery)
//! and [`Broadcaster`](shelley_core::traits::Broadcaster). Every call runs
//! under a [`RetryPolicy`]; only failures that left the ledger untouched
//! are retried.

pub mod blockfrost;
pub mod config;
pub mod retry;

pub use blockfrost::BlockfrostClient;
pub use config::LedgerConfig;
pub use retry::{Idempotency, RetryPolicy};
