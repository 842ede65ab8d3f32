//! Merkle tree parent computation.
//!
//! A parent node is the double SHA-256 of its two children concatenated
//! in internal byte order. Absent children count as the all-zero hash.

use paymail_primitives::chainhash::{double_hash_h, Hash};
use paymail_primitives::PrimitivesError;

/// Compute the Merkle tree parent of two `Hash` values in internal order.
pub fn merkle_tree_parent(left: &Hash, right: &Hash) -> Hash {
    let mut concatenated = [0u8; 64];
    concatenated[..32].copy_from_slice(left.as_bytes());
    concatenated[32..].copy_from_slice(right.as_bytes());
    double_hash_h(&concatenated)
}

/// Compute the Merkle tree parent of two children given in display order.
///
/// Each side must be empty (treated as the all-zero hash) or exactly 32
/// bytes. The result is returned in display order.
pub fn merkle_tree_parent_bytes(left: &[u8], right: &[u8]) -> Result<[u8; 32], PrimitivesError> {
    let l = Hash::from_display_bytes(left)?;
    let r = Hash::from_display_bytes(right)?;
    Ok(merkle_tree_parent(&l, &r).to_display_bytes())
}

/// Compute the Merkle tree parent of two display-order hex strings.
///
/// Empty strings are the all-zero hash. Non-hex characters, odd length or
/// a decoded length other than 32 bytes are errors.
pub fn merkle_tree_parent_str(left: &str, right: &str) -> Result<String, PrimitivesError> {
    let l = Hash::from_hex(left)?;
    let r = Hash::from_hex(right)?;
    Ok(merkle_tree_parent(&l, &r).to_string())
}
