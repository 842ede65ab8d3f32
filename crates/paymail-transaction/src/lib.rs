/// Paymail SPV toolkit - Transaction wire type.
///
/// Provides the Transaction type with inputs, outputs and scripts, lossless
/// binary/hex serialization, and transaction ID computation.

pub mod transaction;
pub mod input;
pub mod output;
pub mod script;

mod error;
pub use error::TransactionError;
pub use transaction::Transaction;
pub use input::{TransactionInput, MAX_SEQUENCE_NUMBER};
pub use output::TransactionOutput;
pub use script::Script;
