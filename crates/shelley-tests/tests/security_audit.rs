//! Adversarial security tests for the Shelley wallet.
//!
//! Each test states the attack it exercises and the invariant that stops
//! it: signatures bind the exact body, secrets never leave the vault in
//! readable form, and untrusted input is rejected before key material is
//! touched.

use shelley_core::address::{Address, Network};
use shelley_core::crypto::{sign_tx_id, verify_witness};
use shelley_core::error::CryptoError;
use shelley_core::types::{ProtocolParameters, SignedTransaction};
use shelley_tests::helpers::*;
use shelley_wallet::{
    KdfParams, RecoveryPhrase, SendRequest, TransactionBuilder, UnlockRequest, Wallet,
    WalletError, WalletStore, assemble, encrypt,
};

fn reference_wallet() -> Wallet {
    let phrase = RecoveryPhrase::parse(PHRASE).unwrap();
    Wallet::from_phrase(&phrase, "", Network::Testnet, 0).unwrap()
}

fn other_wallet() -> Wallet {
    let phrase = RecoveryPhrase::parse(
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
    )
    .unwrap();
    Wallet::from_phrase(&phrase, "", Network::Testnet, 0).unwrap()
}

/// A signed payment of 2 ADA from the reference wallet.
fn signed_payment() -> SignedTransaction {
    let wallet = reference_wallet();
    let from = wallet.address();
    let utxos = vec![utxo(&from, 1, 5_000_000)];
    let mut unsigned = TransactionBuilder::new(ProtocolParameters::default())
        .add_recipient(recipient(Network::Testnet), 2_000_000)
        .build(&utxos, &from)
        .unwrap();
    TransactionBuilder::sign(&mut unsigned, wallet.keys()).unwrap()
}

// ======================================================================
// ATTACK 1: Witness malleability
// Attack: alter or strip witnesses hoping the transaction id moves.
// Invariant: the id is the hash of the body alone.
// ======================================================================

#[test]
fn attack_witnesses_do_not_change_tx_id() {
    let signed = signed_payment();
    let id = signed.id().unwrap();
    assert_eq!(id, signed.body.id().unwrap());

    let mut stripped = signed.clone();
    stripped.witnesses.clear();
    assert_eq!(stripped.id().unwrap(), id);

    let mut flipped = signed.clone();
    flipped.witnesses[0].signature[0] ^= 0x80;
    assert_eq!(flipped.id().unwrap(), id);
    assert!(verify_witness(&id, &flipped.witnesses[0]).is_err());
}

// ======================================================================
// ATTACK 2: Body substitution
// Attack: keep a valid witness and swap the recipient or the fee.
// Invariant: a witness verifies only against the body it signed.
// ======================================================================

#[test]
fn attack_redirected_output_breaks_signature() {
    let signed = signed_payment();
    let required = vec![reference_wallet().address().payment_key_hash().unwrap()];

    let mut body = signed.body.clone();
    body.outputs[0].address = Address::enterprise(shelley_core::types::KeyHash([0x66; 28]), Network::Testnet);
    let err = assemble(body, signed.witnesses.clone(), &required).unwrap_err();
    assert_eq!(err, WalletError::Crypto(CryptoError::VerificationFailed));

    let mut body = signed.body.clone();
    body.fee += 1;
    assert!(assemble(body, signed.witnesses.clone(), &required).is_err());

    // The untouched pair still assembles.
    assert!(assemble(signed.body.clone(), signed.witnesses, &required).is_ok());
}

// ======================================================================
// ATTACK 3: Witness injection and omission
// Attack: attach a valid signature from an unrelated key, or drop one.
// Invariant: witnesses are exactly the input credentials.
// ======================================================================

#[test]
fn attack_foreign_and_missing_witnesses() {
    let signed = signed_payment();
    let id = signed.id().unwrap();
    let required = vec![reference_wallet().address().payment_key_hash().unwrap()];

    let stranger = other_wallet();
    let mut witnesses = signed.witnesses.clone();
    witnesses.push(sign_tx_id(&id, stranger.keys().payment()));
    assert!(matches!(
        assemble(signed.body.clone(), witnesses, &required),
        Err(WalletError::Crypto(CryptoError::UnknownWitness(_)))
    ));

    assert!(matches!(
        assemble(signed.body.clone(), Vec::new(), &required),
        Err(WalletError::Crypto(CryptoError::MissingWitness(_)))
    ));
}

#[test]
fn attack_signing_with_wrong_account() {
    let wallet = reference_wallet();
    let from = wallet.address();
    let utxos = vec![utxo(&from, 1, 5_000_000)];
    let mut unsigned = TransactionBuilder::new(ProtocolParameters::default())
        .add_recipient(recipient(Network::Testnet), 2_000_000)
        .build(&utxos, &from)
        .unwrap();
    let err = TransactionBuilder::sign(&mut unsigned, other_wallet().keys()).unwrap_err();
    assert!(matches!(err, WalletError::Crypto(CryptoError::MissingWitness(_))));
}

// ======================================================================
// ATTACK 4: Vault probing
// Attack: distinguish wrong passwords from corrupted records, or smuggle
// a record that decrypts to something other than a phrase.
// Invariant: every failure is the same AuthenticationError.
// ======================================================================

#[test]
fn attack_non_phrase_plaintext_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    let record = encrypt(b"not a mnemonic at all", "pw", &KdfParams::new(64, 1, 1)).unwrap();
    WalletStore::open(dir.path())
        .unwrap()
        .save("planted", &record, false)
        .unwrap();

    let req = UnlockRequest::parse(Some("planted"), Some("pw")).unwrap();
    assert_eq!(engine.unlock_wallet(&req).unwrap_err(), WalletError::Authentication);
}

#[test]
fn attack_truncated_record_is_authentication_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw");

    let path = dir.path().join("w.json");
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let encrypted = json["encrypted"].as_str().unwrap().to_string();
    json["encrypted"] = serde_json::Value::String(encrypted[..40].to_string());
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let req = UnlockRequest::parse(Some("w"), Some("pw")).unwrap();
    assert_eq!(engine.unlock_wallet(&req).unwrap_err(), WalletError::Authentication);
}

#[test]
fn attack_inflated_kdf_costs_fail_closed() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw");

    // Argon2 would try to allocate 256 GiB for this record.
    let path = dir.path().join("w.json");
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    json["kdf"]["m_cost"] = serde_json::json!(1u32 << 28);
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let req = UnlockRequest::parse(Some("w"), Some("pw")).unwrap();
    assert_eq!(engine.unlock_wallet(&req).unwrap_err(), WalletError::Authentication);
}

// ======================================================================
// ATTACK 5: Path traversal through wallet ids
// Invariant: ids are restricted to [A-Za-z0-9_-]{1,64}.
// ======================================================================

#[test]
fn attack_wallet_id_traversal() {
    for id in ["../../etc/passwd", "a/b", "..", "w.json", "C:\\x", "\0"] {
        assert!(
            matches!(
                UnlockRequest::parse(Some(id), Some("pw")),
                Err(WalletError::InvalidWalletId(_))
            ),
            "{id:?}"
        );
    }
}

// ======================================================================
// ATTACK 6: Hostile request fields
// Attack: negative, fractional or overflowing amounts; addresses from the
// other network; reward addresses as recipients.
// ======================================================================

#[test]
fn attack_hostile_amounts_and_addresses() {
    let to = recipient(Network::Testnet).to_string();
    for amount in ["-1", "0", "1.0", "0x10", "99999999999999999999", "1 000"] {
        assert!(
            matches!(
                SendRequest::parse(Some("w"), Some("pw"), Some(to.as_str()), Some(amount), Network::Testnet),
                Err(WalletError::InvalidAmount(_))
            ),
            "{amount}"
        );
    }

    let mainnet = recipient(Network::Mainnet).to_string();
    assert!(matches!(
        SendRequest::parse(Some("w"), Some("pw"), Some(mainnet.as_str()), Some("1000000"), Network::Testnet),
        Err(WalletError::InvalidAddress(_))
    ));

    let reward = reference_wallet().reward_address().to_string();
    assert!(matches!(
        SendRequest::parse(Some("w"), Some("pw"), Some(reward.as_str()), Some("1000000"), Network::Testnet),
        Err(WalletError::InvalidAddress(_))
    ));
}

// ======================================================================
// ATTACK 7: Duplicated UTXOs from a lying ledger
// Attack: report the same output twice to inflate the spendable total.
// Invariant: an input is consumed at most once.
// ======================================================================

#[tokio::test]
async fn attack_duplicate_utxos_not_double_counted() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, ledger) = engine(dir.path());
    save(&engine, "w", PHRASE, "pw");
    let from: Address = TESTNET_ADDR.parse().unwrap();
    let only = utxo(&from, 7, 3_000_000);
    ledger.utxos.lock().extend([only.clone(), only]);

    let to = recipient(Network::Testnet).to_string();
    let req = SendRequest::parse(Some("w"), Some("pw"), Some(to.as_str()), Some("4000000"), Network::Testnet)
        .unwrap();
    match engine.build_and_send(&req).await.unwrap_err() {
        WalletError::InsufficientFunds { have, .. } => assert_eq!(have, 3_000_000),
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(ledger.submissions(), 0);
}

// ======================================================================
// ATTACK 8: Secrets in logs
// Invariant: Debug output of secret-bearing types never shows them.
// ======================================================================

#[test]
fn attack_debug_output_hides_secrets() {
    let phrase = RecoveryPhrase::parse(PHRASE).unwrap();
    let wallet = reference_wallet();
    let to = recipient(Network::Testnet).to_string();
    let req = SendRequest::parse(Some("w"), Some("s3cret-pw"), Some(to.as_str()), Some("1000000"), Network::Testnet)
        .unwrap();

    let rendered = format!("{phrase:?} {wallet:?} {:?} {req:?}", wallet.keys());
    for word in ["walk", "penalty", "filter", "s3cret-pw"] {
        assert!(!rendered.contains(word), "leaked {word}");
    }
}
