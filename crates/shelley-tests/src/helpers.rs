//! Shared test helpers for the end-to-end and property suites.

use async_trait::async_trait;
use parking_lot::Mutex;
use shelley_core::address::{Address, Network};
use shelley_core::error::LedgerError;
use shelley_core::traits::{Broadcaster, LedgerQuery};
use shelley_core::types::{KeyHash, ProtocolParameters, SignedTransaction, TxId, TxIn, Utxo};
use shelley_wallet::{KdfParams, SaveRequest, WalletConfig, WalletEngine};
use std::sync::Arc;

/// Reference 12-word phrase with published addresses.
pub const PHRASE: &str = "test walk nut penalty hip pave soap entry language right filter choice";

/// Base address of [`PHRASE`] (account 0, index 0) on the test network.
pub const TESTNET_ADDR: &str = "addr_test1qz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3jcu5d8ps7zex2k2xt3uqxgjqnnj83ws8lhrn648jjxtwq2ytjqp";

/// Base address of [`PHRASE`] (account 0, index 0) on mainnet.
pub const MAINNET_ADDR: &str = "addr1qx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3jcu5d8ps7zex2k2xt3uqxgjqnnj83ws8lhrn648jjxtwqfjkjv7";

/// How the mock ledger answers `submit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitMode {
    /// Accept and return the transaction's real id.
    Accept,
    /// Refuse with the given reason.
    Reject(String),
    /// Lose the answer after the request went out.
    Ambiguous,
    /// Accept but report an unrelated id.
    WrongId,
}

/// In-memory ledger implementing both collaborator traits.
pub struct MockLedger {
    pub utxos: Mutex<Vec<Utxo>>,
    pub params: Mutex<ProtocolParameters>,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub mode: Mutex<SubmitMode>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            utxos: Mutex::new(Vec::new()),
            params: Mutex::new(ProtocolParameters::default()),
            submitted: Mutex::new(Vec::new()),
            mode: Mutex::new(SubmitMode::Accept),
        }
    }
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add one UTXO per amount at `address`, each from a distinct tx id.
    pub fn fund(&self, address: &Address, amounts: &[u64]) {
        let mut utxos = self.utxos.lock();
        let base = utxos.len();
        for (i, amount) in amounts.iter().enumerate() {
            utxos.push(utxo(address, (base + i) as u32, *amount));
        }
    }

    pub fn set_mode(&self, mode: SubmitMode) {
        *self.mode.lock() = mode;
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Decode the most recent submission.
    pub fn last_submitted(&self) -> Option<SignedTransaction> {
        self.submitted
            .lock()
            .last()
            .and_then(|cbor| SignedTransaction::from_cbor(cbor).ok())
    }
}

#[async_trait]
impl LedgerQuery for MockLedger {
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, LedgerError> {
        Ok(self
            .utxos
            .lock()
            .iter()
            .filter(|u| u.address == *address)
            .cloned()
            .collect())
    }

    async fn protocol_parameters(&self) -> Result<ProtocolParameters, LedgerError> {
        Ok(*self.params.lock())
    }
}

#[async_trait]
impl Broadcaster for MockLedger {
    async fn submit(&self, cbor: &[u8]) -> Result<TxId, LedgerError> {
        self.submitted.lock().push(cbor.to_vec());
        let mode = self.mode.lock().clone();
        match mode {
            SubmitMode::Accept => SignedTransaction::from_cbor(cbor)
                .and_then(|tx| tx.id())
                .map_err(|e| LedgerError::Rejected(e.to_string())),
            SubmitMode::Reject(reason) => Err(LedgerError::Rejected(reason)),
            SubmitMode::Ambiguous => Err(LedgerError::AmbiguousSubmission(
                "connection reset after send".into(),
            )),
            SubmitMode::WrongId => Ok(TxId([0xEE; 32])),
        }
    }
}

/// A UTXO at `address` from a tx id derived from `n`.
pub fn utxo(address: &Address, n: u32, amount: u64) -> Utxo {
    let mut id = [0u8; 32];
    id[..4].copy_from_slice(&n.to_be_bytes());
    id[31] = 0xA5;
    Utxo {
        input: TxIn {
            tx_id: TxId(id),
            index: n % 3,
        },
        address: address.clone(),
        amount,
    }
}

/// A foreign payment address on `network`.
pub fn recipient(network: Network) -> Address {
    Address::base(KeyHash([0x42; 28]), KeyHash([0x43; 28]), network)
}

/// Testnet engine over `dir` with cheap Argon2 costs, sharing one mock ledger.
pub fn engine(dir: &std::path::Path) -> (WalletEngine, Arc<MockLedger>) {
    let mut config = WalletConfig::new(Network::Testnet, dir);
    config.kdf = KdfParams::new(64, 1, 1);
    let ledger = MockLedger::new();
    let engine = WalletEngine::new(config, ledger.clone(), ledger.clone())
        .unwrap_or_else(|e| panic!("engine: {e}"));
    (engine, ledger)
}

/// Save `phrase` under `id` with `password`, panicking on failure.
pub fn save(engine: &WalletEngine, id: &str, phrase: &str, password: &str) {
    let req = SaveRequest::parse(Some(id), Some(phrase), Some(password))
        .unwrap_or_else(|e| panic!("save request: {e}"));
    engine
        .save_wallet(&req)
        .unwrap_or_else(|e| panic!("save: {e}"));
}
