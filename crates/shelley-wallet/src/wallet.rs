//! High-level wallet operations.
//!
//! [`Wallet`] is the key material of one restored phrase; [`WalletEngine`]
//! ties it to the encrypted store and the ledger collaborators and exposes
//! the request-level operations: generate, save, unlock, balance and
//! build-and-send.
//!
//! Every operation derives what it needs from the phrase and drops it again
//! before returning. Phrases, seeds and private keys zeroize on drop, on the
//! error path too.

use shelley_core::address::{Address, Network};
use shelley_core::error::LedgerError;
use shelley_core::traits::{Broadcaster, LedgerQuery};
use shelley_core::types::{SignedTransaction, TxId, Utxo};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::builder::TransactionBuilder;
use crate::config::WalletConfig;
use crate::encryption::{self, WalletRecord};
use crate::error::WalletError;
use crate::fee::ChangeOutcome;
use crate::keys::{AccountKeys, ExtendedKey};
use crate::mnemonic::{DEFAULT_WORD_COUNT, RecoveryPhrase, entropy_to_seed};
use crate::request::{SaveRequest, SendRequest, UnlockRequest};
use crate::store::WalletStore;

/// Keys and addresses restored from one recovery phrase.
pub struct Wallet {
    network: Network,
    keys: AccountKeys,
}

impl Wallet {
    /// Restore account `account`, address index 0, from `phrase`.
    pub fn from_phrase(
        phrase: &RecoveryPhrase,
        passphrase: &str,
        network: Network,
        account: u32,
    ) -> Result<Self, WalletError> {
        let entropy = phrase.to_entropy()?;
        let seed = entropy_to_seed(&entropy, passphrase);
        let root = ExtendedKey::root_from_seed(&seed);
        let keys = AccountKeys::derive(&root, account, 0)?;
        Ok(Self { network, keys })
    }

    /// Base address (payment + stake credential).
    pub fn address(&self) -> Address {
        self.keys.address(self.network)
    }

    /// Reward address of the stake key.
    pub fn reward_address(&self) -> Address {
        self.keys.reward_address(self.network)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn keys(&self) -> &AccountKeys {
        &self.keys
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("address", &self.address().to_string())
            .finish_non_exhaustive()
    }
}

/// A freshly generated wallet. The phrase is shown to the user once.
#[derive(Debug)]
pub struct GeneratedWallet {
    pub phrase: RecoveryPhrase,
    pub address: Address,
}

/// Outcome of a successful send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Id the ledger accepted the transaction under.
    pub tx_id: TxId,
    /// Fee paid, including folded dust.
    pub fee: u64,
    /// Where the leftover went: a change output, the fee, or nowhere.
    pub change: ChangeOutcome,
    /// The submitted transaction.
    pub signed: SignedTransaction,
}

/// The wallet engine.
pub struct WalletEngine {
    config: WalletConfig,
    store: WalletStore,
    ledger: Arc<dyn LedgerQuery>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl WalletEngine {
    /// Create an engine, opening (and creating) the configured wallet directory.
    pub fn new(
        config: WalletConfig,
        ledger: Arc<dyn LedgerQuery>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, WalletError> {
        let store = WalletStore::open(&config.wallets_dir)?;
        info!(network = %config.network, dir = %config.wallets_dir.display(), "wallet engine ready");
        Ok(Self {
            config,
            store,
            ledger,
            broadcaster,
        })
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    /// Generate a new phrase and its first address.
    pub fn generate_wallet(&self) -> Result<GeneratedWallet, WalletError> {
        let phrase = RecoveryPhrase::generate(DEFAULT_WORD_COUNT)?;
        let address = self.restore(&phrase)?.address();
        info!(%address, "generated wallet");
        Ok(GeneratedWallet { phrase, address })
    }

    /// Derive the wallet for `phrase` on the configured network.
    pub fn restore(&self, phrase: &RecoveryPhrase) -> Result<Wallet, WalletError> {
        Wallet::from_phrase(phrase, "", self.config.network, self.config.account)
    }

    /// Encrypt the phrase under the password and store it.
    pub fn save_wallet(&self, req: &SaveRequest) -> Result<WalletRecord, WalletError> {
        let kdf = self.config.kdf;
        let overwrite = req.overwrite;
        let record = self.store.update(&req.wallet_id, |existing| {
            if existing.is_some() && !overwrite {
                return Err(WalletError::WalletExists(req.wallet_id.clone()));
            }
            encryption::encrypt(req.phrase.as_str().as_bytes(), &req.password, &kdf)
        })?;
        info!(wallet_id = %req.wallet_id, "saved wallet");
        Ok(record)
    }

    /// Decrypt and return the stored phrase.
    ///
    /// A wrong password and a tampered record are indistinguishable.
    pub fn unlock_wallet(&self, req: &UnlockRequest) -> Result<RecoveryPhrase, WalletError> {
        let record = self.store.load(&req.wallet_id)?;
        let plain = encryption::decrypt(&record, &req.password).inspect_err(|_| {
            warn!(wallet_id = %req.wallet_id, "unlock failed");
        })?;
        // A record that decrypts but does not hold a phrase is treated like
        // any other corruption.
        let text = std::str::from_utf8(&plain).map_err(|_| WalletError::Authentication)?;
        let phrase = RecoveryPhrase::parse(text).map_err(|_| WalletError::Authentication)?;
        debug!(wallet_id = %req.wallet_id, "unlocked wallet");
        Ok(phrase)
    }

    /// Address of a stored wallet.
    pub fn wallet_address(&self, req: &UnlockRequest) -> Result<Address, WalletError> {
        let phrase = self.unlock_wallet(req)?;
        Ok(self.restore(&phrase)?.address())
    }

    /// Lovelace held at `address`.
    pub async fn balance(&self, address: &Address) -> Result<u64, WalletError> {
        address.require_network(self.config.network)?;
        Ok(self.ledger.balance(address).await?)
    }

    /// Unlock, select coins, sign and submit a payment.
    ///
    /// Nothing is submitted unless every earlier step succeeded. A failure
    /// after the submit request may have reached the ledger, including a
    /// reply naming a different transaction, surfaces as
    /// [`LedgerError::AmbiguousSubmission`].
    pub async fn build_and_send(&self, req: &SendRequest) -> Result<SendReceipt, WalletError> {
        let (signed, fee, change) = self.prepare(req).await?;
        let signed_id = signed.id()?;
        let cbor = signed.to_cbor()?;

        let accepted = self.broadcaster.submit(&cbor).await?;
        if accepted != signed_id {
            warn!(%accepted, expected = %signed_id, "ledger reported a different tx id");
            return Err(WalletError::Ledger(LedgerError::AmbiguousSubmission(format!(
                "ledger accepted {accepted}, signed {signed_id}"
            ))));
        }
        info!(wallet_id = %req.wallet_id, txid = %accepted, fee, "submitted transaction");
        Ok(SendReceipt {
            tx_id: accepted,
            fee,
            change,
            signed,
        })
    }

    /// Everything in [`build_and_send`](Self::build_and_send) except the
    /// submission.
    pub async fn build_signed(&self, req: &SendRequest) -> Result<SignedTransaction, WalletError> {
        Ok(self.prepare(req).await?.0)
    }

    async fn prepare(
        &self,
        req: &SendRequest,
    ) -> Result<(SignedTransaction, u64, ChangeOutcome), WalletError> {
        req.recipient
            .require_network(self.config.network)
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))?;

        let phrase = self.unlock_wallet(&UnlockRequest {
            wallet_id: req.wallet_id.clone(),
            password: req.password.clone(),
        })?;
        let wallet = self.restore(&phrase)?;
        drop(phrase);
        let from = wallet.address();

        let params = self.ledger.protocol_parameters().await?;
        let utxos = self.own_utxos(&from).await?;
        debug!(wallet_id = %req.wallet_id, utxos = utxos.len(), "fetched utxos");

        let mut unsigned = TransactionBuilder::new(params)
            .add_recipient(req.recipient.clone(), req.amount)
            .set_strategy(self.config.selection)
            .build(&utxos, &from)?;
        let signed = TransactionBuilder::sign(&mut unsigned, wallet.keys())?;
        info!(
            wallet_id = %req.wallet_id,
            txid = %signed.id()?,
            amount = req.amount,
            fee = unsigned.fee,
            "signed transaction"
        );
        Ok((signed, unsigned.fee, unsigned.change_outcome()))
    }

    /// UTXOs the ledger reports for `address`, minus any that do not
    /// actually belong to it.
    async fn own_utxos(&self, address: &Address) -> Result<Vec<Utxo>, WalletError> {
        let reported = self.ledger.utxos(address).await?;
        let total = reported.len();
        let own: Vec<Utxo> = reported
            .into_iter()
            .filter(|u| u.address == *address)
            .collect();
        if own.len() != total {
            warn!(
                dropped = total - own.len(),
                "ledger returned utxos for another address"
            );
        }
        Ok(own)
    }
}

impl std::fmt::Debug for WalletEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
