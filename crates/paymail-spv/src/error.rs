//! Error types for envelope decoding, Merkle proofs and SPV certification.

use paymail_primitives::chainhash::Hash;

use crate::script_verifier::ScriptVerificationError;

/// Broad class of an [`SpvError`].
///
/// Every class is permanent: retrying the same input yields the same error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The envelope bytes are corrupt, truncated or adversarial.
    MalformedInput,
    /// The bundle decodes but does not prove what it claims.
    StructuralInconsistency,
    /// A transaction in the bundle is invalid (script or finality failure).
    InvalidTransaction,
    /// The external header view rejected or could not confirm a Merkle root.
    ChainView,
}

/// Error types for SPV operations.
#[derive(Debug, thiserror::Error)]
pub enum SpvError {
    // -- malformed input --------------------------------------------------
    #[error("invalid BEEF hex stream: {0}")]
    InvalidHexStream(String),

    #[error("BEEF envelope of {len} bytes is shorter than version and marker")]
    EnvelopeTooShort { len: usize },

    #[error("BEEF envelope of {len} bytes exceeds the configured limit of {max} bytes")]
    EnvelopeTooLarge { len: usize, max: usize },

    #[error("invalid BEEF marker {found:02x?}, expected [be, ef]")]
    InvalidMarker { found: [u8; 2] },

    #[error("cannot decode BUMPs: no bytes after the BEEF marker")]
    NoBytesForBumps,

    #[error("invalid BEEF: bump count is zero")]
    NoBumps,

    #[error("bump {bump_index}: insufficient bytes for block height")]
    InsufficientBytesBlockHeight { bump_index: usize },

    #[error("bump {bump_index}: insufficient bytes for tree height")]
    InsufficientBytesTreeHeight { bump_index: usize },

    #[error("bump {bump_index}: tree height {tree_height} exceeds the maximum of 64")]
    InvalidTreeHeight { bump_index: usize, tree_height: u8 },

    #[error("proof has {levels} levels, more than the maximum of 64")]
    TooManyLevels { levels: usize },

    #[error("level {level}: leaf at offset {offset} must be a hashless duplicate or carry a hash")]
    MalformedLeaf { level: usize, offset: u64 },

    #[error("bump {bump_index} level {level}: insufficient bytes for leaf count")]
    InsufficientBytesLeafCount { bump_index: usize, level: usize },

    #[error("bump {bump_index} level {level}: leaf count {count} cannot fit in {remaining} remaining bytes")]
    ImplausibleLeafCount {
        bump_index: usize,
        level: usize,
        count: u64,
        remaining: usize,
    },

    #[error("bump {bump_index} level {level}: insufficient bytes for offset of leaf {leaf}")]
    InsufficientBytesOffset { bump_index: usize, level: usize, leaf: usize },

    #[error("bump {bump_index} level {level}: insufficient bytes for flag of leaf {leaf}")]
    InsufficientBytesFlag { bump_index: usize, level: usize, leaf: usize },

    #[error("bump {bump_index} level {level}: invalid flag {flag} for leaf {leaf}")]
    InvalidLeafFlag {
        bump_index: usize,
        level: usize,
        leaf: usize,
        flag: u8,
    },

    #[error("bump {bump_index} level {level}: insufficient bytes for hash of leaf {leaf}")]
    InsufficientBytesHash { bump_index: usize, level: usize, leaf: usize },

    #[error("{field} value {value} exceeds the maximum safe conversion range")]
    IntegerOverflow { field: &'static str, value: u64 },

    #[error("insufficient bytes for transaction count")]
    InsufficientBytesTxCount,

    #[error("invalid BEEF: {count} transactions provided, at least 2 are required")]
    InsufficientTransactions { count: u64 },

    #[error("transaction count {count} cannot fit in {remaining} remaining bytes")]
    ImplausibleTxCount { count: u64, remaining: usize },

    #[error("transaction {tx_index}: {source}")]
    InvalidTransactionData {
        tx_index: usize,
        #[source]
        source: paymail_transaction::TransactionError,
    },

    #[error("transaction {tx_index}: insufficient bytes for has-bump flag")]
    InsufficientBytesHasBump { tx_index: usize },

    #[error("transaction {tx_index}: invalid has-bump flag {flag}")]
    InvalidHasBumpFlag { tx_index: usize, flag: u8 },

    #[error("transaction {tx_index}: insufficient bytes for bump index")]
    InsufficientBytesBumpIndex { tx_index: usize },

    #[error("{count} trailing bytes after the last record")]
    TrailingBytes { count: usize },

    // -- structural inconsistency -------------------------------------------
    #[error("child not found at level {level}, offset {offset}")]
    ChildNotFound { level: usize, offset: u64 },

    #[error("bump at block {block_height} climbs to two different roots: {first} and {second}")]
    MerkleRootMismatch {
        block_height: u64,
        first: Hash,
        second: Hash,
    },

    #[error("no matching transaction in the bundle for input {input_index} of {txid} (spends {source_txid})")]
    NoMatchingTransactionForInput {
        txid: Hash,
        input_index: usize,
        source_txid: Hash,
    },

    #[error("input {input_index} of {txid} spends output {vout} of {source_txid}, which does not exist")]
    MissingFundingOutput {
        txid: Hash,
        input_index: usize,
        source_txid: Hash,
        vout: u32,
    },

    #[error("transaction {txid} refers to bump {bump_index}, but the bundle has {bump_count}")]
    BumpIndexOutOfRange {
        txid: Hash,
        bump_index: usize,
        bump_count: usize,
    },

    #[error("transaction {txid} not found among the level-0 leaves of bump {bump_index}")]
    TransactionNotInBump { txid: Hash, bump_index: usize },

    // -- invalid transaction -----------------------------------------------
    #[error("transaction {txid} has lock time {lock_time} but input {input_index} has non-final sequence {sequence:#010x}")]
    LockTimeNotFinal {
        txid: Hash,
        lock_time: u32,
        input_index: usize,
        sequence: u32,
    },

    #[error("invalid script for input {input_index} of {txid}: {source}")]
    InvalidScript {
        txid: Hash,
        input_index: usize,
        #[source]
        source: ScriptVerificationError,
    },

    // -- chain view ---------------------------------------------------------
    #[error("merkle root {root} is not valid for block {block_height}")]
    InvalidMerkleRoot { block_height: u64, root: Hash },

    #[error("chain tracker error: {0}")]
    ChainTracker(String),
}

impl SpvError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        use SpvError::*;
        match self {
            InvalidHexStream(_)
            | EnvelopeTooShort { .. }
            | EnvelopeTooLarge { .. }
            | InvalidMarker { .. }
            | NoBytesForBumps
            | NoBumps
            | InsufficientBytesBlockHeight { .. }
            | InsufficientBytesTreeHeight { .. }
            | InvalidTreeHeight { .. }
            | TooManyLevels { .. }
            | MalformedLeaf { .. }
            | InsufficientBytesLeafCount { .. }
            | ImplausibleLeafCount { .. }
            | InsufficientBytesOffset { .. }
            | InsufficientBytesFlag { .. }
            | InvalidLeafFlag { .. }
            | InsufficientBytesHash { .. }
            | IntegerOverflow { .. }
            | InsufficientBytesTxCount
            | InsufficientTransactions { .. }
            | ImplausibleTxCount { .. }
            | InvalidTransactionData { .. }
            | InsufficientBytesHasBump { .. }
            | InvalidHasBumpFlag { .. }
            | InsufficientBytesBumpIndex { .. }
            | TrailingBytes { .. } => ErrorCategory::MalformedInput,

            ChildNotFound { .. }
            | MerkleRootMismatch { .. }
            | NoMatchingTransactionForInput { .. }
            | MissingFundingOutput { .. }
            | BumpIndexOutOfRange { .. }
            | TransactionNotInBump { .. } => ErrorCategory::StructuralInconsistency,

            LockTimeNotFinal { .. } | InvalidScript { .. } => ErrorCategory::InvalidTransaction,

            InvalidMerkleRoot { .. } | ChainTracker(_) => ErrorCategory::ChainView,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(SpvError::NoBumps.category(), ErrorCategory::MalformedInput);
        assert_eq!(
            SpvError::ChildNotFound { level: 0, offset: 1 }.category(),
            ErrorCategory::StructuralInconsistency
        );
        assert_eq!(
            SpvError::LockTimeNotFinal {
                txid: Hash::default(),
                lock_time: 1,
                input_index: 0,
                sequence: 0,
            }
            .category(),
            ErrorCategory::InvalidTransaction
        );
        assert_eq!(
            SpvError::InvalidMerkleRoot { block_height: 1, root: Hash::default() }.category(),
            ErrorCategory::ChainView
        );
    }

    #[test]
    fn test_messages_pinpoint_location() {
        let err = SpvError::InvalidLeafFlag { bump_index: 0, level: 2, leaf: 5, flag: 3 };
        assert_eq!(err.to_string(), "bump 0 level 2: invalid flag 3 for leaf 5");

        let err = SpvError::InvalidMarker { found: [0xbe, 0xee] };
        assert_eq!(err.to_string(), "invalid BEEF marker [be, ee], expected [be, ef]");
    }
}
