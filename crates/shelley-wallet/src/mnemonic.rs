//! BIP-39 recovery phrases and Icarus seed generation.
//!
//! A phrase encodes 128–256 bits of entropy plus a checksum. The binary
//! [`Seed`] is derived from the *entropy* (not the phrase text):
//!
//! ```text
//! seed = PBKDF2-HMAC-SHA512(password = passphrase, salt = entropy, 4096, 96 bytes)
//! ```

use bip39::{Language, Mnemonic};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WalletError;
use crate::keys::{SEED_LEN, Seed};

/// PBKDF2 rounds for Icarus master key generation.
const PBKDF2_ROUNDS: u32 = 4096;

/// Word counts accepted for import and generation.
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Word count used when generating new wallets.
pub const DEFAULT_WORD_COUNT: usize = 24;

/// A validated, whitespace-normalized BIP-39 English phrase.
///
/// The text is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryPhrase {
    phrase: String,
}

impl RecoveryPhrase {
    /// Validate and normalize a phrase.
    ///
    /// Whitespace is collapsed and words are lower-cased before the
    /// wordlist and checksum checks.
    pub fn parse(phrase: &str) -> Result<Self, WalletError> {
        let normalized = phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let count = normalized.split(' ').filter(|w| !w.is_empty()).count();
        if !VALID_WORD_COUNTS.contains(&count) {
            return Err(WalletError::InvalidPhrase(format!(
                "expected 12, 15, 18, 21 or 24 words, got {count}"
            )));
        }
        Mnemonic::parse_in(Language::English, &normalized)
            .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
        Ok(Self { phrase: normalized })
    }

    /// Generate a fresh phrase from OS randomness.
    pub fn generate(word_count: usize) -> Result<Self, WalletError> {
        if !VALID_WORD_COUNTS.contains(&word_count) {
            return Err(WalletError::InvalidPhrase(format!(
                "unsupported word count {word_count}"
            )));
        }
        // 11 bits per word, one checksum bit per 32 bits of entropy.
        let mut entropy = Entropy {
            bytes: vec![0u8; word_count / 3 * 4],
        };
        rand::rngs::OsRng.fill_bytes(&mut entropy.bytes);
        Self::from_entropy(&entropy)
    }

    /// Encode entropy as a phrase.
    pub fn from_entropy(entropy: &Entropy) -> Result<Self, WalletError> {
        let m = Mnemonic::from_entropy_in(Language::English, entropy.as_bytes())
            .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
        Ok(Self {
            phrase: m.to_string(),
        })
    }

    /// The normalized phrase text. Handle with care.
    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    /// Number of words.
    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// Recover the entropy this phrase encodes.
    pub fn to_entropy(&self) -> Result<Entropy, WalletError> {
        phrase_to_entropy(&self.phrase)
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}

/// Raw phrase entropy (16–32 bytes), zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Entropy {
    bytes: Vec<u8>,
}

impl Entropy {
    /// Wrap raw entropy bytes. Length must be 16, 20, 24, 28 or 32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if !(16..=32).contains(&bytes.len()) || bytes.len() % 4 != 0 {
            return Err(WalletError::InvalidPhrase(format!(
                "entropy must be 16-32 bytes in steps of 4, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Get the raw entropy bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entropy")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh phrase of `word_count` words.
pub fn generate_phrase(word_count: usize) -> Result<RecoveryPhrase, WalletError> {
    RecoveryPhrase::generate(word_count)
}

/// Validate a phrase and extract its entropy.
///
/// Fails with [`WalletError::InvalidPhrase`] on an unknown word, a checksum
/// mismatch or an unsupported word count.
pub fn phrase_to_entropy(phrase: &str) -> Result<Entropy, WalletError> {
    let parsed = RecoveryPhrase::parse(phrase)?;
    let m = Mnemonic::parse_in(Language::English, parsed.as_str())
        .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
    let mut raw = m.to_entropy();
    let entropy = Entropy::from_bytes(&raw);
    raw.zeroize();
    entropy
}

/// Derive the 96-byte Icarus seed from entropy and an optional passphrase.
///
/// Pure and deterministic: the same inputs always give the same seed.
pub fn entropy_to_seed(entropy: &Entropy, passphrase: &str) -> Seed {
    let mut bytes = [0u8; SEED_LEN];
    pbkdf2_hmac::<Sha512>(
        passphrase.as_bytes(),
        entropy.as_bytes(),
        PBKDF2_ROUNDS,
        &mut bytes,
    );
    let seed = Seed::from_bytes(bytes);
    bytes.zeroize();
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON_12: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn abandon_about_is_zero_entropy() {
        let e = phrase_to_entropy(ABANDON_12).unwrap();
        assert_eq!(e.as_bytes(), &[0u8; 16]);
    }

    #[test]
    fn zero_entropy_encodes_to_abandon_about() {
        let e = Entropy::from_bytes(&[0u8; 16]).unwrap();
        assert_eq!(RecoveryPhrase::from_entropy(&e).unwrap().as_str(), ABANDON_12);
    }

    #[test]
    fn seed_known_answer_for_zero_entropy() {
        // PBKDF2-HMAC-SHA512("", 16 zero bytes, 4096, 96)
        let e = Entropy::from_bytes(&[0u8; 16]).unwrap();
        let seed = entropy_to_seed(&e, "");
        assert_eq!(
            hex::encode(&seed.as_bytes()[..32]),
            "61ce7dbec3616e9fc17e0c32578b3f380337b1b61a1f3cb9651aee30670e6fb3"
        );
        assert_eq!(
            hex::encode(&seed.as_bytes()[64..]),
            "072310084784c7308182dbbdb1449b2706586f1ff5cbf13d15e9b6e78c15f067"
        );
    }

    #[test]
    fn seed_is_deterministic() {
        let e = phrase_to_entropy(ABANDON_12).unwrap();
        assert_eq!(entropy_to_seed(&e, "").as_bytes(), entropy_to_seed(&e, "").as_bytes());
    }

    #[test]
    fn passphrase_changes_seed() {
        let e = phrase_to_entropy(ABANDON_12).unwrap();
        assert_ne!(
            entropy_to_seed(&e, "").as_bytes(),
            entropy_to_seed(&e, "TREZOR").as_bytes()
        );
    }

    #[test]
    fn generate_all_word_counts() {
        for count in VALID_WORD_COUNTS {
            let p = RecoveryPhrase::generate(count).unwrap();
            assert_eq!(p.word_count(), count);
            let e = p.to_entropy().unwrap();
            assert_eq!(e.as_bytes().len(), count / 3 * 4);
        }
    }

    #[test]
    fn generate_phrase_default_count() {
        let p = generate_phrase(DEFAULT_WORD_COUNT).unwrap();
        assert_eq!(p.word_count(), 24);
        assert!(RecoveryPhrase::parse(p.as_str()).is_ok());
    }

    #[test]
    fn generate_is_random() {
        let a = RecoveryPhrase::generate(DEFAULT_WORD_COUNT).unwrap();
        let b = RecoveryPhrase::generate(DEFAULT_WORD_COUNT).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generate_rejects_odd_word_count() {
        assert!(RecoveryPhrase::generate(13).is_err());
        assert!(RecoveryPhrase::generate(0).is_err());
    }

    #[test]
    fn invalid_word_rejected() {
        let phrase = ABANDON_12.replace("about", "aboot");
        let err = phrase_to_entropy(&phrase).unwrap_err();
        assert!(matches!(err, WalletError::InvalidPhrase(_)));
    }

    #[test]
    fn bad_checksum_rejected() {
        let phrase = ABANDON_12.replace("about", "abandon");
        assert!(matches!(
            phrase_to_entropy(&phrase),
            Err(WalletError::InvalidPhrase(_))
        ));
    }

    #[test]
    fn wrong_word_count_rejected() {
        assert!(phrase_to_entropy("abandon abandon").is_err());
        assert!(phrase_to_entropy("").is_err());
    }

    #[test]
    fn whitespace_and_case_normalized() {
        let messy = format!("  {}\t", ABANDON_12.to_uppercase().replace(' ', "   "));
        let p = RecoveryPhrase::parse(&messy).unwrap();
        assert_eq!(p.as_str(), ABANDON_12);
    }

    #[test]
    fn debug_hides_words() {
        let p = RecoveryPhrase::parse(ABANDON_12).unwrap();
        let debug = format!("{p:?}");
        assert!(!debug.contains("abandon"));
        let e = p.to_entropy().unwrap();
        assert!(format!("{e:?}").contains("REDACTED"));
    }

    #[test]
    fn entropy_length_checked() {
        assert!(Entropy::from_bytes(&[0u8; 15]).is_err());
        assert!(Entropy::from_bytes(&[0u8; 18]).is_err());
        assert!(Entropy::from_bytes(&[0u8; 36]).is_err());
        assert!(Entropy::from_bytes(&[0u8; 20]).is_ok());
    }
}
