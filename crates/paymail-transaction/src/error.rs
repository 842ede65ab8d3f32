/// Error types for transaction parsing and serialization.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The wire bytes do not form a transaction (truncation, trailing data).
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// A count field promises more elements than the remaining bytes could
    /// possibly encode.
    #[error("{field} count {count} cannot fit in {remaining} remaining bytes")]
    ImplausibleCount {
        field: &'static str,
        count: u64,
        remaining: usize,
    },
    /// An underlying primitives error (forwarded from `paymail-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] paymail_primitives::PrimitivesError),
}
