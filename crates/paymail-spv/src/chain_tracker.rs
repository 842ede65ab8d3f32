//! Chain tracker trait for confirming Merkle roots against block headers.

use paymail_primitives::chainhash::Hash;

use crate::error::SpvError;

/// Access to trusted block headers.
///
/// The validator only proves that a bundle is self-consistent. Comparing
/// each computed Merkle root with the header at the proof's block height
/// is delegated to an implementor of this trait.
pub trait ChainTracker {
    /// Return the Merkle root of the block at `height`, or `None` if the
    /// height is unknown to this tracker.
    fn merkle_root_for_height(&self, height: u64) -> Result<Option<Hash>, SpvError>;

    /// Check that `root` is the Merkle root of the block at `height`.
    ///
    /// # Returns
    /// `Ok(true)` if the root matches, `Ok(false)` if it differs or the
    /// height is unknown.
    fn is_valid_root_for_height(&self, root: &Hash, height: u64) -> Result<bool, SpvError> {
        Ok(self.merkle_root_for_height(height)? == Some(*root))
    }
}

impl ChainTracker for std::collections::HashMap<u64, Hash> {
    fn merkle_root_for_height(&self, height: u64) -> Result<Option<Hash>, SpvError> {
        Ok(self.get(&height).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_in_memory_tracker() {
        let root = Hash::new([7; 32]);
        let headers: HashMap<u64, Hash> = [(100, root)].into_iter().collect();

        assert_eq!(headers.merkle_root_for_height(100).unwrap(), Some(root));
        assert_eq!(headers.merkle_root_for_height(101).unwrap(), None);
        assert!(headers.is_valid_root_for_height(&root, 100).unwrap());
        assert!(!headers.is_valid_root_for_height(&Hash::default(), 100).unwrap());
        assert!(!headers.is_valid_root_for_height(&root, 101).unwrap());
    }
}
