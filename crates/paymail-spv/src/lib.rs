//! Paymail SPV toolkit - BEEF envelopes and SPV certification.
//!
//! Provides Merkle tree primitives, BUMP Merkle proofs (BRC-74), the BEEF
//! envelope codec (BRC-62) and a validator that certifies the envelope's
//! target transaction from the ancestors and proofs it ships with.
//! Script execution and block-header lookups are supplied by the caller
//! through the [`ScriptVerifier`] and [`ChainTracker`] traits.

pub mod error;
pub mod merkle_tree_parent;
pub mod bump;
pub mod beef;
pub mod chain_tracker;
pub mod config;
pub mod script_verifier;
pub mod validator;

pub use error::{ErrorCategory, SpvError};
pub use merkle_tree_parent::{merkle_tree_parent, merkle_tree_parent_bytes, merkle_tree_parent_str};
pub use bump::{find_leaf, pair_offset, prepare_nodes, Bump, BumpLeaf, MAX_TREE_HEIGHT};
pub use beef::{decode_beef_hex, DecodedBeef, TxData, BEEF_MARKER, BEEF_V1_VERSION};
pub use chain_tracker::ChainTracker;
pub use config::SpvConfig;
pub use script_verifier::{ScriptFlags, ScriptVerificationError, ScriptVerifier};
pub use validator::{exists_in_bumps, validate_lock_time, Anchor, Certification, SpvValidator};
