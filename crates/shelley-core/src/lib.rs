//! # shelley-core
//! Foundation types and traits for the Shelley wallet: addresses, keys,
//! transaction encoding and the ledger collaborator interfaces.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;
