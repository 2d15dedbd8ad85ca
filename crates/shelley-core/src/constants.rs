//! Protocol constants. All monetary values in lovelace (1 ADA = 10^6 lovelace).

pub const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Offset added to a child index to mark hardened derivation.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// CIP-1852 purpose index (hardened).
pub const PURPOSE: u32 = 1852;

/// SLIP-44 coin type for ADA (hardened).
pub const COIN_TYPE: u32 = 1815;

/// Length of a Blake2b-224 key hash (payment and stake credentials).
pub const KEY_HASH_LEN: usize = 28;

/// Length of a Blake2b-256 transaction id.
pub const TX_ID_LEN: usize = 32;

/// Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;

// --- Default protocol parameters (Shelley mainnet values) ---

/// Linear fee coefficient `a`, lovelace per byte of serialized transaction.
///
/// # Examples
///
/// ```
/// use shelley_core::constants::{DEFAULT_MIN_FEE_A, DEFAULT_MIN_FEE_B};
/// // fee for a 300 byte transaction
/// assert_eq!(DEFAULT_MIN_FEE_A * 300 + DEFAULT_MIN_FEE_B, 168_581);
/// ```
pub const DEFAULT_MIN_FEE_A: u64 = 44;

/// Linear fee constant `b`, in lovelace.
pub const DEFAULT_MIN_FEE_B: u64 = 155_381;

/// Smallest output value the ledger accepts.
pub const DEFAULT_MIN_UTXO_VALUE: u64 = 1_000_000;

/// Maximum serialized transaction size in bytes.
pub const DEFAULT_MAX_TX_SIZE: u64 = 16_384;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardened_offset_is_high_bit() {
        assert_eq!(HARDENED_OFFSET, 1 << 31);
        assert_eq!(PURPOSE | HARDENED_OFFSET, 0x8000_073C);
        assert_eq!(COIN_TYPE | HARDENED_OFFSET, 0x8000_0717);
    }

    #[test]
    fn min_utxo_is_one_ada() {
        assert_eq!(DEFAULT_MIN_UTXO_VALUE, LOVELACE_PER_ADA);
    }
}
