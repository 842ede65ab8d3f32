#![deny(missing_docs)]

//! Paymail SPV toolkit - Complete SDK.
//!
//! Re-exports all toolkit components for convenient single-crate usage.

pub use paymail_primitives as primitives;
pub use paymail_transaction as transaction;
pub use paymail_spv as spv;
