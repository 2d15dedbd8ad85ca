//! Blockfrost REST client.
//!
//! Responses are untrusted: quantities must parse as `u64`, transaction
//! hashes as 32-byte hex, and any malformed entry fails the whole query with
//! [`LedgerError::InvalidResponse`]. Non-lovelace assets are ignored.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use shelley_core::address::Address;
use shelley_core::constants::DEFAULT_MIN_UTXO_VALUE;
use shelley_core::error::LedgerError;
use shelley_core::traits::{Broadcaster, LedgerQuery};
use shelley_core::types::{ProtocolParameters, TxId, TxIn, Utxo};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::retry::{Idempotency, RetryPolicy, TransportFailure};

/// Entries requested per UTXO page (the API maximum).
const PAGE_SIZE: usize = 100;

/// Refuse to walk more pages than this for one address.
const MAX_PAGES: u32 = 500;

const LOVELACE: &str = "lovelace";

/// HTTP client for one Blockfrost project.
#[derive(Clone, Debug)]
pub struct BlockfrostClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BlockfrostClient {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::with_builder(config, Client::builder())
    }

    /// Build on a caller-supplied reqwest builder (proxies, TLS roots).
    pub fn with_builder(config: LedgerConfig, builder: ClientBuilder) -> Result<Self, LedgerError> {
        let mut project_id = HeaderValue::from_str(&config.project_id)
            .map_err(|_| LedgerError::Request("project id is not a valid header value".into()))?;
        project_id.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("project_id", project_id);

        let http = builder
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerError::Request(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, returning `None` on 404.
    async fn get(&self, path: &str) -> Result<Option<String>, LedgerError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(Idempotency::Safe, &e))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| transport(Idempotency::Safe, &e))?;
        if !status.is_success() {
            return Err(Idempotency::Safe.classify_status(status.as_u16(), error_message(&body)));
        }
        Ok(Some(body))
    }

    async fn post_cbor(&self, path: &str, payload: &[u8]) -> Result<String, LedgerError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/cbor")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| transport(Idempotency::Submit, &e))?;
        let status = resp.status();
        let body = resp.text().await;
        if !status.is_success() {
            let body = body.map_err(|e| transport(Idempotency::Submit, &e))?;
            return Err(Idempotency::Submit.classify_status(status.as_u16(), error_message(&body)));
        }
        // Past a 2xx the ledger holds the transaction whatever the body says.
        body.map_err(accepted_unreadable)
    }
}

#[async_trait]
impl LedgerQuery for BlockfrostClient {
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, LedgerError> {
        let encoded = address.encode();
        let mut utxos = Vec::new();
        for page in 1..=MAX_PAGES {
            let path = format!("/addresses/{encoded}/utxos?count={PAGE_SIZE}&page={page}");
            let Some(body) = self.retry.run("utxos", || self.get(&path)).await? else {
                debug!(address = %encoded, pages = page, "blockfrost: no further utxo pages");
                return Ok(utxos);
            };
            let entries = parse_utxos(&body, address)?;
            let full = entries.len() >= PAGE_SIZE;
            utxos.extend(entries);
            if !full {
                debug!(address = %encoded, pages = page, count = utxos.len(), "blockfrost: utxos fetched");
                return Ok(utxos);
            }
        }
        Err(LedgerError::InvalidResponse(format!(
            "more than {MAX_PAGES} pages of utxos"
        )))
    }

    async fn protocol_parameters(&self) -> Result<ProtocolParameters, LedgerError> {
        let body = self
            .retry
            .run("protocol_parameters", || self.get("/epochs/latest/parameters"))
            .await?
            .ok_or_else(|| LedgerError::InvalidResponse("no parameters for latest epoch".into()))?;
        let params = parse_parameters(&body)?;
        debug!(
            min_fee_a = params.min_fee_a,
            min_fee_b = params.min_fee_b,
            max_tx_size = params.max_tx_size,
            "blockfrost: protocol parameters"
        );
        Ok(params)
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let path = format!("/addresses/{}", address.encode());
        match self.retry.run("balance", || self.get(&path)).await? {
            Some(body) => parse_address_balance(&body),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl Broadcaster for BlockfrostClient {
    async fn submit(&self, signed_tx_cbor: &[u8]) -> Result<TxId, LedgerError> {
        let body = self
            .retry
            .run("submit", || self.post_cbor("/tx/submit", signed_tx_cbor))
            .await?;
        let tx_id = parse_submitted_id(&body).map_err(accepted_unreadable)?;
        info!(txid = %tx_id, bytes = signed_tx_cbor.len(), "blockfrost: transaction submitted");
        Ok(tx_id)
    }
}

fn accepted_unreadable(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::AmbiguousSubmission(format!("submission accepted, reply unreadable: {e}"))
}

fn transport(idempotency: Idempotency, e: &reqwest::Error) -> LedgerError {
    let failure = if e.is_connect() {
        TransportFailure::Connect
    } else if e.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Other
    };
    idempotency.classify_transport(failure, e.to_string())
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AmountEntry {
    unit: String,
    quantity: String,
}

#[derive(Deserialize)]
struct UtxoEntry {
    #[serde(default)]
    address: Option<String>,
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountEntry>,
}

#[derive(Deserialize)]
struct ParametersEntry {
    min_fee_a: u64,
    min_fee_b: u64,
    max_tx_size: u64,
    #[serde(default)]
    min_utxo: Option<String>,
}

#[derive(Deserialize)]
struct AddressEntry {
    amount: Vec<AmountEntry>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn invalid(what: &str, e: impl std::fmt::Display) -> LedgerError {
    LedgerError::InvalidResponse(format!("{what}: {e}"))
}

/// Parse a decimal quantity string as `u64`.
fn parse_quantity(raw: &str) -> Result<u64, LedgerError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("quantity", format!("{raw:?} is not a natural number")));
    }
    raw.parse().map_err(|e| invalid("quantity", e))
}

/// Sum of the lovelace entries in an amount list.
fn lovelace(amounts: &[AmountEntry]) -> Result<u64, LedgerError> {
    let mut total: Option<u64> = None;
    for entry in amounts.iter().filter(|a| a.unit == LOVELACE) {
        let quantity = parse_quantity(&entry.quantity)?;
        total = Some(
            total
                .unwrap_or(0)
                .checked_add(quantity)
                .ok_or_else(|| invalid("quantity", "lovelace overflow"))?,
        );
    }
    total.ok_or_else(|| invalid("amount", "no lovelace entry"))
}

fn parse_utxos(body: &str, address: &Address) -> Result<Vec<Utxo>, LedgerError> {
    let entries: Vec<UtxoEntry> = serde_json::from_str(body).map_err(|e| invalid("utxos", e))?;
    let expected = address.encode();
    entries
        .into_iter()
        .map(|entry| {
            if let Some(reported) = &entry.address {
                if *reported != expected {
                    return Err(invalid("utxo address", reported));
                }
            }
            let tx_id = TxId::from_hex(&entry.tx_hash).map_err(|e| invalid("tx_hash", e))?;
            Ok(Utxo {
                input: TxIn {
                    tx_id,
                    index: entry.output_index,
                },
                address: address.clone(),
                amount: lovelace(&entry.amount)?,
            })
        })
        .collect()
}

/// Blockfrost's `min_utxo` became a per-byte coefficient after Alonzo, so
/// the reported value is only ever allowed to raise the one-ADA floor.
fn parse_parameters(body: &str) -> Result<ProtocolParameters, LedgerError> {
    let entry: ParametersEntry =
        serde_json::from_str(body).map_err(|e| invalid("parameters", e))?;
    let reported_min = match entry.min_utxo.as_deref() {
        Some(raw) => parse_quantity(raw)?,
        None => 0,
    };
    if entry.max_tx_size == 0 {
        return Err(invalid("parameters", "max_tx_size is zero"));
    }
    Ok(ProtocolParameters {
        min_fee_a: entry.min_fee_a,
        min_fee_b: entry.min_fee_b,
        min_utxo_value: reported_min.max(DEFAULT_MIN_UTXO_VALUE),
        max_tx_size: entry.max_tx_size,
    })
}

fn parse_address_balance(body: &str) -> Result<u64, LedgerError> {
    let entry: AddressEntry = serde_json::from_str(body).map_err(|e| invalid("address", e))?;
    if entry.amount.is_empty() {
        return Ok(0);
    }
    lovelace(&entry.amount)
}

fn parse_submitted_id(body: &str) -> Result<TxId, LedgerError> {
    let hex: String = serde_json::from_str(body).map_err(|e| invalid("submit", e))?;
    TxId::from_hex(&hex).map_err(|e| invalid("submit", e))
}

/// Human-readable reason from an error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            message: Some(m), ..
        }) => m,
        Ok(ApiError { error: Some(e), .. }) => e,
        _ => body.chars().take(200).collect(),
    }
}
