//! Validated request structs for the engine's entry points.
//!
//! Whatever sits in front of the engine (CLI, HTTP) hands over raw strings;
//! these types reject missing fields, malformed amounts and foreign-network
//! addresses before any key material is touched.

use shelley_core::address::{Address, Network};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WalletError;
use crate::mnemonic::RecoveryPhrase;
use crate::store::validate_wallet_id;

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, WalletError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WalletError::InvalidRequest(format!("{field} is required"))),
    }
}

fn password(value: Option<&str>) -> Result<String, WalletError> {
    // Passwords are taken verbatim; only emptiness is rejected.
    match value {
        Some(p) if !p.is_empty() => Ok(p.to_string()),
        _ => Err(WalletError::InvalidRequest("password is required".into())),
    }
}

/// Parse a lovelace amount: a positive base-10 integer that fits in `u64`.
///
/// Signs, fractions, exponents, separators and surrounding text are all
/// rejected.
pub fn parse_lovelace(raw: &str) -> Result<u64, WalletError> {
    let s = raw.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount(format!(
            "{raw:?} is not a whole number of lovelace"
        )));
    }
    let amount: u64 = s
        .parse()
        .map_err(|_| WalletError::InvalidAmount(format!("{raw:?} is too large")))?;
    if amount == 0 {
        return Err(WalletError::InvalidAmount("amount must be positive".into()));
    }
    Ok(amount)
}

/// Decode `raw` as a payment address on `network`.
pub fn parse_recipient(raw: &str, network: Network) -> Result<Address, WalletError> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|e| WalletError::InvalidAddress(format!("{e}")))?;
    address
        .require_network(network)
        .map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
    if !address.is_payment() {
        return Err(WalletError::InvalidAddress(
            "reward addresses cannot receive payments".into(),
        ));
    }
    Ok(address)
}

/// A validated send: who pays, to whom, how much.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SendRequest {
    #[zeroize(skip)]
    pub wallet_id: String,
    pub password: String,
    #[zeroize(skip)]
    pub recipient: Address,
    #[zeroize(skip)]
    pub amount: u64,
}

impl SendRequest {
    pub fn parse(
        wallet_id: Option<&str>,
        password_raw: Option<&str>,
        recipient: Option<&str>,
        amount: Option<&str>,
        network: Network,
    ) -> Result<Self, WalletError> {
        let wallet_id = required("wallet_id", wallet_id)?;
        validate_wallet_id(wallet_id)?;
        let password = password(password_raw)?;
        let recipient = parse_recipient(required("recipient", recipient)?, network)?;
        let amount = parse_lovelace(required("amount", amount)?)?;
        Ok(Self {
            wallet_id: wallet_id.to_string(),
            password,
            recipient,
            amount,
        })
    }
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("wallet_id", &self.wallet_id)
            .field("recipient", &self.recipient.to_string())
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// A validated request to encrypt and store a phrase.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SaveRequest {
    #[zeroize(skip)]
    pub wallet_id: String,
    pub phrase: RecoveryPhrase,
    pub password: String,
    #[zeroize(skip)]
    pub overwrite: bool,
}

impl SaveRequest {
    pub fn parse(
        wallet_id: Option<&str>,
        phrase: Option<&str>,
        password_raw: Option<&str>,
    ) -> Result<Self, WalletError> {
        let wallet_id = required("wallet_id", wallet_id)?;
        validate_wallet_id(wallet_id)?;
        let phrase = RecoveryPhrase::parse(required("phrase", phrase)?)?;
        Ok(Self {
            wallet_id: wallet_id.to_string(),
            phrase,
            password: password(password_raw)?,
            overwrite: false,
        })
    }

    /// Allow replacing an existing record.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl fmt::Debug for SaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveRequest")
            .field("wallet_id", &self.wallet_id)
            .field("overwrite", &self.overwrite)
            .finish_non_exhaustive()
    }
}

/// A validated request to decrypt a stored phrase.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct UnlockRequest {
    #[zeroize(skip)]
    pub wallet_id: String,
    pub password: String,
}

impl UnlockRequest {
    pub fn parse(wallet_id: Option<&str>, password_raw: Option<&str>) -> Result<Self, WalletError> {
        let wallet_id = required("wallet_id", wallet_id)?;
        validate_wallet_id(wallet_id)?;
        Ok(Self {
            wallet_id: wallet_id.to_string(),
            password: password(password_raw)?,
        })
    }
}

impl fmt::Debug for UnlockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockRequest")
            .field("wallet_id", &self.wallet_id)
            .finish_non_exhaustive()
    }
}
