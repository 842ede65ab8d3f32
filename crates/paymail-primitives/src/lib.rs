/// Paymail SPV toolkit - Hashing and binary encoding primitives.
///
/// This crate provides the foundational building blocks shared by the
/// transaction and SPV crates:
/// - Hash functions (SHA-256, SHA-256d)
/// - Chain hash type for transaction IDs and Merkle tree nodes
/// - Variable-length integer encoding
/// - Bounds-checked binary reader and writer

pub mod hash;
pub mod chainhash;
pub mod util;

mod error;
pub use error::PrimitivesError;
