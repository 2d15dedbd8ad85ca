//! End-to-end tests for the Shelley wallet engine.
//!
//! Each test opens an engine over a temporary wallet directory with an
//! in-memory ledger, then walks a full user flow: generate or restore,
//! save, unlock, and pay.

use shelley_core::address::{Address, Network};
use shelley_core::crypto::verify_witness;
use shelley_core::error::LedgerError;
use shelley_core::types::SignedTransaction;
use shelley_tests::helpers::*;
use shelley_wallet::{
    ChangeOutcome, RecoveryPhrase, SaveRequest, SendRequest, UnlockRequest, WalletEngine, WalletError,
};
use std::collections::HashSet;
use std::sync::Arc;

fn unlock(engine: &WalletEngine, id: &str, password: &str) -> Result<RecoveryPhrase, WalletError> {
    engine.unlock_wallet(&UnlockRequest::parse(Some(id), Some(password)).unwrap())
}

fn send_request(id: &str, password: &str, amount: u64) -> SendRequest {
    let to = recipient(Network::Testnet).to_string();
    let amount = amount.to_string();
    SendRequest::parse(
        Some(id),
        Some(password),
        Some(to.as_str()),
        Some(amount.as_str()),
        Network::Testnet,
    )
    .unwrap()
}

/// Sum of the ledger amounts behind every input of `tx`.
fn input_total(ledger: &MockLedger, tx: &SignedTransaction) -> u64 {
    let utxos = ledger.utxos.lock();
    tx.body
        .inputs
        .iter()
        .map(|input| {
            utxos
                .iter()
                .find(|u| u.input == *input)
                .map(|u| u.amount)
                .unwrap()
        })
        .sum()
}

// ---------------------------------------------------------------------------
// Generate, save, unlock
// ---------------------------------------------------------------------------

#[test]
fn e2e_generate_save_unlock() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());

    let generated = engine.generate_wallet().unwrap();
    assert_eq!(generated.phrase.word_count(), 24);
    assert!(generated.address.to_string().starts_with("addr_test1"));

    save(&engine, "fresh", generated.phrase.as_str(), "pw1");
    let unlocked = unlock(&engine, "fresh", "pw1").unwrap();
    assert_eq!(unlocked.as_str(), generated.phrase.as_str());
    assert_eq!(
        unlock(&engine, "fresh", "pw2").unwrap_err(),
        WalletError::Authentication
    );

    let req = UnlockRequest::parse(Some("fresh"), Some("pw1")).unwrap();
    assert_eq!(engine.wallet_address(&req).unwrap(), generated.address);
}

#[test]
fn e2e_reference_phrase_addresses() {
    let phrase = RecoveryPhrase::parse(PHRASE).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (testnet, _) = engine(dir.path());
    assert_eq!(testnet.restore(&phrase).unwrap().address().to_string(), TESTNET_ADDR);

    let mut config = testnet.config().clone();
    config.network = Network::Mainnet;
    let ledger = MockLedger::new();
    let mainnet = WalletEngine::new(config, ledger.clone(), ledger).unwrap();
    assert_eq!(mainnet.restore(&phrase).unwrap().address().to_string(), MAINNET_ADDR);
}

#[test]
fn e2e_record_never_holds_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    save(&engine, "w", PHRASE, "correct horse");

    let raw = std::fs::read_to_string(dir.path().join("w.json")).unwrap();
    for word in PHRASE.split(' ') {
        assert!(!raw.contains(word), "record leaks {word}");
    }
    assert!(!raw.contains("correct horse"));

    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(json["encrypted"].is_string());
    assert!(json["created_at"].is_string());
}

#[test]
fn e2e_tampered_record_fails_like_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");

    let path = dir.path().join("w.json");
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let mut bytes = hex::decode(json["encrypted"].as_str().unwrap()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    json["encrypted"] = serde_json::Value::String(hex::encode(bytes));
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let tampered = unlock(&engine, "w", "pw1").unwrap_err();
    let wrong = unlock(&engine, "w", "pw2").unwrap_err();
    assert_eq!(tampered, WalletError::Authentication);
    assert_eq!(tampered.to_string(), wrong.to_string());
}

#[test]
fn e2e_concurrent_saves_keep_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let password = format!("pw{i}");
                let req =
                    SaveRequest::parse(Some("shared"), Some(PHRASE), Some(password.as_str())).unwrap();
                engine.save_wallet(&req).is_ok()
            })
        })
        .collect();
    let winners: Vec<usize> = handles
        .into_iter()
        .enumerate()
        .filter_map(|(i, h)| h.join().unwrap().then_some(i))
        .collect();
    assert_eq!(winners.len(), 1);

    let password = format!("pw{}", winners[0]);
    assert_eq!(unlock(&engine, "shared", &password).unwrap().as_str(), PHRASE);
}

// ---------------------------------------------------------------------------
// Paying
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e2e_build_and_send() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    let from: Address = TESTNET_ADDR.parse().unwrap();
    ledger.fund(&from, &[1_000_000, 3_000_000, 1_000_000]);

    let receipt = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap();
    assert_eq!(ledger.submissions(), 1);

    // What the ledger saw is what the engine signed.
    let submitted = ledger.last_submitted().unwrap();
    assert_eq!(submitted, receipt.signed);
    let body_id = submitted.body.id().unwrap();
    assert_eq!(receipt.tx_id, body_id);

    // Every witness signs exactly the body hash and belongs to an input.
    let payment = from.payment_key_hash().unwrap();
    assert_eq!(submitted.witnesses.len(), 1);
    for witness in &submitted.witnesses {
        assert_eq!(verify_witness(&body_id, witness).unwrap(), payment);
    }

    // Value is conserved and the fee covers the final size.
    let body = &submitted.body;
    let total_in = input_total(&ledger, &submitted);
    assert_eq!(total_in, body.total_output().unwrap() + body.fee);
    assert_eq!(receipt.fee, body.fee);
    let params = *ledger.params.lock();
    assert!(body.fee >= params.min_fee(submitted.size().unwrap()).unwrap());

    // Recipient first, change back to the sender.
    assert_eq!(body.outputs[0].address, recipient(Network::Testnet));
    assert_eq!(body.outputs[0].amount, 2_000_000);
    assert_eq!(body.outputs[1].address, from);
    assert_eq!(receipt.change, ChangeOutcome::Output(body.outputs[1].amount));
    assert!(body.outputs[1].amount >= params.min_utxo_value);

    let distinct: HashSet<_> = body.inputs.iter().collect();
    assert_eq!(distinct.len(), body.inputs.len());
}

#[tokio::test]
async fn e2e_insufficient_funds_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    let from: Address = TESTNET_ADDR.parse().unwrap();
    ledger.fund(&from, &[1_500_000]);

    let err = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds { have, need } => {
            assert_eq!(have, 1_500_000);
            assert!(need > have);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn e2e_wrong_password_never_reaches_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    ledger.fund(&TESTNET_ADDR.parse().unwrap(), &[10_000_000]);

    let err = engine
        .build_and_send(&send_request("w", "nope", 2_000_000))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::Authentication);
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn e2e_ambiguous_submission_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    ledger.fund(&TESTNET_ADDR.parse().unwrap(), &[10_000_000]);
    ledger.set_mode(SubmitMode::Ambiguous);

    let err = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Ledger(LedgerError::AmbiguousSubmission(_))
    ));
    assert_eq!(ledger.submissions(), 1);
}

#[tokio::test]
async fn e2e_rejection_surfaces_reason() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    ledger.fund(&TESTNET_ADDR.parse().unwrap(), &[10_000_000]);
    ledger.set_mode(SubmitMode::Reject("BadInputsUTxO".into()));

    let err = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Ledger(LedgerError::Rejected("BadInputsUTxO".into()))
    );
}

#[tokio::test]
async fn e2e_mismatched_ledger_id_is_ambiguous() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    ledger.fund(&TESTNET_ADDR.parse().unwrap(), &[10_000_000]);
    ledger.set_mode(SubmitMode::WrongId);

    let err = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Ledger(LedgerError::AmbiguousSubmission(_))
    ));
    // The ledger did take something; it must not be sent again.
    assert_eq!(ledger.submissions(), 1);
}

#[tokio::test]
async fn e2e_foreign_utxos_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw1");
    let from: Address = TESTNET_ADDR.parse().unwrap();
    ledger.fund(&from, &[4_000_000]);
    ledger.fund(&recipient(Network::Testnet), &[50_000_000]);

    let receipt = engine
        .build_and_send(&send_request("w", "pw1", 2_000_000))
        .await
        .unwrap();
    let own: Vec<_> = ledger
        .utxos
        .lock()
        .iter()
        .filter(|u| u.address == from)
        .map(|u| u.input)
        .collect();
    assert!(receipt.signed.body.inputs.iter().all(|i| own.contains(i)));
}

#[tokio::test]
async fn e2e_balance_checks_network() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    let from: Address = TESTNET_ADDR.parse().unwrap();
    ledger.fund(&from, &[1_000_000, 2_500_000]);

    assert_eq!(engine.balance(&from).await.unwrap(), 3_500_000);
    let mainnet: Address = MAINNET_ADDR.parse().unwrap();
    assert!(matches!(
        engine.balance(&mainnet).await,
        Err(WalletError::Address(_))
    ));
}
