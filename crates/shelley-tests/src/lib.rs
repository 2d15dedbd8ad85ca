//! Integration test suite for the Shelley wallet.
//!
//! The tests drive the wallet engine end to end against in-memory ledger
//! collaborators, and check the recovery, vault and fee invariants under
//! randomized inputs.

pub mod helpers;
