//! # shelley-wallet: HD wallet engine for Cardano Shelley.
//!
//! Turns a BIP-39 recovery phrase into a BIP32-Ed25519 key tree, keeps the
//! phrase encrypted at rest, and builds, signs and submits payments against
//! the UTXO set reported by a ledger collaborator.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`mnemonic`]: recovery phrases, entropy and Icarus seeds
//! - [`keys`]: extended keys, derivation paths, account keys
//! - [`encryption`]: Argon2id + AES-256-GCM vault
//! - [`store`]: one encrypted record per wallet id on disk
//! - [`coin_selection`]: UTXO selection strategies
//! - [`fee`]: linear fee estimation and change
//! - [`draft`]: transaction draft state machine and witness assembly
//! - [`builder`]: transaction builder with signing
//! - [`request`]: validated request structs
//! - [`config`]: engine configuration
//! - [`wallet`]: restored wallets and the engine

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod draft;
pub mod encryption;
pub mod error;
pub mod fee;
pub mod keys;
pub mod mnemonic;
pub mod request;
pub mod store;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{Recipient, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector, SelectionStrategy};
pub use config::WalletConfig;
pub use draft::{DraftState, TransactionDraft, assemble};
pub use encryption::{KdfParams, WalletRecord, decrypt, encrypt};
pub use error::WalletError;
pub use fee::{ChangeOutcome, FeeEstimator, compute_change};
pub use keys::{AccountKeys, ChildIndex, DerivationPath, ExtendedKey, Role, Seed};
pub use mnemonic::{Entropy, RecoveryPhrase, entropy_to_seed, generate_phrase, phrase_to_entropy};
pub use request::{SaveRequest, SendRequest, UnlockRequest};
pub use store::WalletStore;
pub use wallet::{GeneratedWallet, SendReceipt, Wallet, WalletEngine};
