//! BUMP (BRC-74) Merkle proofs.
//!
//! A [`Bump`] lists, level by level from the transactions upward, the
//! nodes needed to climb from one or more level-0 leaves to the block's
//! Merkle root. Sibling nodes that are omitted at a level above 0 may be
//! rebuilt from their two children one level below (compound proofs).

use std::collections::HashMap;

use paymail_primitives::chainhash::Hash;
use paymail_primitives::util::{BsvReader, BsvWriter, VarInt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SpvError;
use crate::merkle_tree_parent::merkle_tree_parent;

/// Highest tree a proof may describe (a block of 2^64 transactions).
pub const MAX_TREE_HEIGHT: u8 = 64;

/// Leaf flag: plain intermediate hash.
pub const DATA_FLAG: u8 = 0;
/// Leaf flag: no hash follows, the leaf copies its sibling.
pub const DUPLICATE_FLAG: u8 = 1;
/// Leaf flag: the hash is the ID of a transaction this proof is for.
pub const TXID_FLAG: u8 = 2;

/// Smallest encoded leaf: a one-byte offset followed by a duplicate flag.
const MIN_LEAF_SIZE: usize = 2;

/// One node of a proof level.
///
/// A leaf is either a duplicate (no hash of its own) or carries exactly
/// one 32-byte hash. Deserialization rejects any other shape, and
/// [`Bump::new`] rejects one built by hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLeaf")]
pub struct BumpLeaf {
    /// Position within the level.
    pub offset: u64,
    /// Node hash in internal byte order, serialized in display order.
    /// `None` for duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    /// The hash is a transaction ID this proof anchors.
    #[serde(default, skip_serializing_if = "is_false")]
    pub txid: bool,
    /// The leaf stands in for a missing right-hand node at an odd-width level.
    #[serde(default, skip_serializing_if = "is_false")]
    pub duplicate: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Unchecked serde shape of a [`BumpLeaf`].
#[derive(Deserialize)]
struct RawLeaf {
    offset: u64,
    #[serde(default)]
    hash: Option<Hash>,
    #[serde(default)]
    txid: bool,
    #[serde(default)]
    duplicate: bool,
}

impl TryFrom<RawLeaf> for BumpLeaf {
    type Error = String;

    fn try_from(raw: RawLeaf) -> Result<Self, Self::Error> {
        let leaf = BumpLeaf { offset: raw.offset, hash: raw.hash, txid: raw.txid, duplicate: raw.duplicate };
        if !leaf.is_well_formed() {
            return Err(format!("leaf at offset {} must be a hashless duplicate or carry a hash", leaf.offset));
        }
        Ok(leaf)
    }
}

impl BumpLeaf {
    /// A plain intermediate node.
    pub fn new_data(offset: u64, hash: Hash) -> Self {
        BumpLeaf { offset, hash: Some(hash), txid: false, duplicate: false }
    }

    /// A level-0 leaf holding the ID of a transaction the proof is for.
    pub fn new_txid(offset: u64, hash: Hash) -> Self {
        BumpLeaf { offset, hash: Some(hash), txid: true, duplicate: false }
    }

    /// A duplicate leaf with no hash of its own.
    pub fn new_duplicate(offset: u64) -> Self {
        BumpLeaf { offset, hash: None, txid: false, duplicate: true }
    }

    /// A duplicate without hash or txid flag, or a non-duplicate with a hash.
    pub fn is_well_formed(&self) -> bool {
        if self.duplicate {
            self.hash.is_none() && !self.txid
        } else {
            self.hash.is_some()
        }
    }

    /// The wire flag for this leaf.
    pub fn flag(&self) -> u8 {
        if self.duplicate {
            DUPLICATE_FLAG
        } else if self.txid {
            TXID_FLAG
        } else {
            DATA_FLAG
        }
    }
}

/// Offset of the node paired with `offset` in the same level.
pub fn pair_offset(offset: u64) -> u64 {
    offset ^ 1
}

/// Find the leaf at `offset` within one level.
pub fn find_leaf(offset: u64, level: &[BumpLeaf]) -> Option<&BumpLeaf> {
    level.iter().find(|leaf| leaf.offset == offset)
}

/// Order a pair of nodes into `(left, right)` hashes.
///
/// The node at the even offset is the left one. A duplicate takes the
/// other node's hash; if both are duplicates each copies the other's
/// missing hash, so both sides are the all-zero hash.
pub fn prepare_nodes(
    base: &BumpLeaf,
    base_offset: u64,
    sibling: &BumpLeaf,
    sibling_offset: u64,
) -> (Hash, Hash) {
    debug_assert_eq!(pair_offset(base_offset), sibling_offset);

    let base_hash = if base.duplicate { sibling.hash } else { base.hash };
    let sibling_hash = if sibling.duplicate { base.hash } else { sibling.hash };
    let base_hash = base_hash.unwrap_or_default();
    let sibling_hash = sibling_hash.unwrap_or_default();

    if base_offset % 2 == 0 {
        (base_hash, sibling_hash)
    } else {
        (sibling_hash, base_hash)
    }
}

/// The synthetic node one level above a pair.
fn parent_of(base: &BumpLeaf, sibling: &BumpLeaf) -> BumpLeaf {
    let (left, right) = prepare_nodes(base, base.offset, sibling, sibling.offset);
    BumpLeaf::new_data(base.offset / 2, merkle_tree_parent(&left, &right))
}

/// A Merkle proof anchoring transactions in the block at `block_height`.
///
/// Every constructor checks that the path has at most [`MAX_TREE_HEIGHT`]
/// levels and that every leaf is a duplicate or carries a hash, so a
/// `Bump` always encodes to bytes that decode back to itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBump")]
pub struct Bump {
    block_height: u64,
    path: Vec<Vec<BumpLeaf>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBump {
    block_height: u64,
    path: Vec<Vec<BumpLeaf>>,
}

impl TryFrom<RawBump> for Bump {
    type Error = SpvError;

    fn try_from(raw: RawBump) -> Result<Self, Self::Error> {
        Bump::new(raw.block_height, raw.path)
    }
}

/// Per-level offset index over a proof, caching every node it derives.
struct IndexedPath<'a> {
    levels: Vec<HashMap<u64, &'a BumpLeaf>>,
    derived: HashMap<(usize, u64), BumpLeaf>,
}

impl<'a> IndexedPath<'a> {
    fn new(bump: &'a Bump) -> Self {
        let levels = bump
            .path
            .iter()
            .map(|level| {
                let mut map = HashMap::with_capacity(level.len());
                for leaf in level {
                    // First occurrence wins, matching `find_leaf`.
                    map.entry(leaf.offset).or_insert(leaf);
                }
                map
            })
            .collect();
        IndexedPath { levels, derived: HashMap::new() }
    }

    /// The node at `offset` in level `height`, derived from the level
    /// below when the proof omits it.
    fn node(&mut self, height: usize, offset: u64) -> Result<BumpLeaf, SpvError> {
        let not_found = SpvError::ChildNotFound { level: height, offset };
        let level = self.levels.get(height).ok_or(not_found)?;
        if let Some(leaf) = level.get(&offset) {
            return Ok((*leaf).clone());
        }
        if let Some(leaf) = self.derived.get(&(height, offset)) {
            return Ok(leaf.clone());
        }
        if height == 0 {
            return Err(SpvError::ChildNotFound { level: 0, offset });
        }

        let left_offset = offset
            .checked_mul(2)
            .ok_or(SpvError::ChildNotFound { level: height - 1, offset })?;
        let left = self.node(height - 1, left_offset)?;
        let right = self.node(height - 1, left_offset + 1)?;
        let node = parent_of(&left, &right);
        trace!(height, offset, hash = %node.hash.unwrap_or_default(), "derived node from children");

        self.derived.insert((height, offset), node.clone());
        Ok(node)
    }

    fn climb_one_level(&mut self, base: &BumpLeaf, height: usize) -> Result<BumpLeaf, SpvError> {
        let sibling = self.node(height, pair_offset(base.offset))?;
        Ok(parent_of(base, &sibling))
    }

    fn root_from(&mut self, leaf: &BumpLeaf) -> Result<Hash, SpvError> {
        let mut current = leaf.clone();
        for height in 0..self.levels.len() {
            current = self.climb_one_level(&current, height)?;
            trace!(height, offset = current.offset, "climbed one level");
        }
        Ok(current.hash.unwrap_or_default())
    }
}

impl Bump {
    /// Create a new proof.
    ///
    /// # Errors
    /// `TooManyLevels` if `path` has more than [`MAX_TREE_HEIGHT`] levels,
    /// `MalformedLeaf` if a leaf is neither a hashless duplicate nor a
    /// hashed node.
    pub fn new(block_height: u64, path: Vec<Vec<BumpLeaf>>) -> Result<Self, SpvError> {
        if path.len() > MAX_TREE_HEIGHT as usize {
            return Err(SpvError::TooManyLevels { levels: path.len() });
        }
        for (level, leaves) in path.iter().enumerate() {
            if let Some(leaf) = leaves.iter().find(|leaf| !leaf.is_well_formed()) {
                return Err(SpvError::MalformedLeaf { level, offset: leaf.offset });
            }
        }
        Ok(Bump { block_height, path })
    }

    /// Height of the block the proof is for.
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Levels from the transactions (index 0) toward the root.
    pub fn path(&self) -> &[Vec<BumpLeaf>] {
        &self.path
    }

    /// Number of levels in the proof.
    pub fn tree_height(&self) -> usize {
        self.path.len()
    }

    /// Level-0 leaves flagged as transaction IDs.
    pub fn txid_leaves(&self) -> impl Iterator<Item = &BumpLeaf> {
        self.path.first().into_iter().flatten().filter(|leaf| leaf.txid)
    }

    /// Find the level-0 leaf whose hash is `txid`.
    pub fn find_level0_leaf(&self, txid: &Hash) -> Option<&BumpLeaf> {
        self.path
            .first()?
            .iter()
            .find(|leaf| !leaf.duplicate && leaf.hash.as_ref() == Some(txid))
    }

    /// Climb from the node at `offset` in level `height` to the next level.
    ///
    /// # Returns
    /// The offset one level up and the synthetic node found there, or
    /// `ChildNotFound` if either member of the pair is missing and cannot
    /// be derived (including when the level itself does not exist).
    pub fn climb_one_level(&self, offset: u64, height: usize) -> Result<(u64, BumpLeaf), SpvError> {
        let mut indexed = IndexedPath::new(self);
        let base = indexed.node(height, offset)?;
        let next = indexed.climb_one_level(&base, height)?;
        Ok((next.offset, next))
    }

    /// Merkle root reached by climbing from the level-0 leaf at `offset`.
    pub fn root_for_leaf(&self, offset: u64) -> Result<Hash, SpvError> {
        let mut indexed = IndexedPath::new(self);
        let leaf = indexed.node(0, offset)?;
        indexed.root_from(&leaf)
    }

    /// Merkle root reached by climbing from `leaf`, a level-0 node of this
    /// proof.
    pub fn root_from_leaf(&self, leaf: &BumpLeaf) -> Result<Hash, SpvError> {
        IndexedPath::new(self).root_from(leaf)
    }

    /// Compute the Merkle root proven for the transaction-ID leaves.
    ///
    /// Every leaf flagged as a transaction ID is climbed to the top of the
    /// path. Sibling targets share most of the climb and must agree.
    ///
    /// # Returns
    /// `Ok(None)` when no leaf is a transaction ID (the proof anchors
    /// nothing), `Ok(Some(root))` otherwise, or an error if a required node
    /// is missing or two targets reach different roots.
    pub fn compute_merkle_root(&self) -> Result<Option<Hash>, SpvError> {
        let mut indexed = IndexedPath::new(self);
        let mut root: Option<Hash> = None;

        for leaf in self.txid_leaves() {
            let candidate = indexed.root_from(leaf)?;
            match root {
                None => root = Some(candidate),
                Some(first) if first != candidate => {
                    return Err(SpvError::MerkleRootMismatch {
                        block_height: self.block_height,
                        first,
                        second: candidate,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(root)
    }

    // -----------------------------------------------------------------
    // Binary codec
    // -----------------------------------------------------------------

    /// Parse a single proof from a hex string, rejecting trailing data.
    pub fn from_hex(hex_str: &str) -> Result<Self, SpvError> {
        let bytes = hex::decode(hex_str).map_err(|e| SpvError::InvalidHexStream(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a single proof from bytes, rejecting trailing data.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        let mut reader = BsvReader::new(data);
        let bump = Self::read_from(&mut reader, 0)?;
        if !reader.is_empty() {
            return Err(SpvError::TrailingBytes { count: reader.remaining() });
        }
        Ok(bump)
    }

    /// Parse a proof from a reader. `bump_index` is the proof's position in
    /// its envelope and only labels errors.
    pub fn read_from(reader: &mut BsvReader, bump_index: usize) -> Result<Self, SpvError> {
        let block_height = reader
            .read_varint()
            .map_err(|_| SpvError::InsufficientBytesBlockHeight { bump_index })?
            .value();

        let tree_height = reader
            .read_u8()
            .map_err(|_| SpvError::InsufficientBytesTreeHeight { bump_index })?;
        if tree_height > MAX_TREE_HEIGHT {
            return Err(SpvError::InvalidTreeHeight { bump_index, tree_height });
        }

        let mut path = Vec::with_capacity(tree_height as usize);
        for level in 0..tree_height as usize {
            path.push(read_level(reader, bump_index, level)?);
        }

        Ok(Bump { block_height, path })
    }

    /// Serialize into a writer (BRC-74).
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_varint(VarInt(self.block_height));
        // At most MAX_TREE_HEIGHT, checked on construction.
        writer.write_u8(self.path.len() as u8);

        for level in &self.path {
            writer.write_varint(VarInt::from(level.len()));
            for leaf in level {
                writer.write_varint(VarInt(leaf.offset));
                writer.write_u8(leaf.flag());
                if let (false, Some(hash)) = (leaf.duplicate, &leaf.hash) {
                    writer.write_bytes(hash.as_bytes());
                }
            }
        }
    }

    /// Serialize to BRC-74 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialize to a BRC-74 hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn read_level(reader: &mut BsvReader, bump_index: usize, level: usize) -> Result<Vec<BumpLeaf>, SpvError> {
    let count = reader
        .read_varint()
        .map_err(|_| SpvError::InsufficientBytesLeafCount { bump_index, level })?;
    let leaf_count = count.to_usize().map_err(|_| SpvError::IntegerOverflow {
        field: "leaf count",
        value: count.value(),
    })?;
    if leaf_count > reader.remaining() / MIN_LEAF_SIZE {
        return Err(SpvError::ImplausibleLeafCount {
            bump_index,
            level,
            count: count.value(),
            remaining: reader.remaining(),
        });
    }

    let mut leaves = Vec::with_capacity(leaf_count);
    for leaf in 0..leaf_count {
        let offset = reader
            .read_varint()
            .map_err(|_| SpvError::InsufficientBytesOffset { bump_index, level, leaf })?
            .value();
        let flag = reader
            .read_u8()
            .map_err(|_| SpvError::InsufficientBytesFlag { bump_index, level, leaf })?;

        let node = match flag {
            DUPLICATE_FLAG => BumpLeaf::new_duplicate(offset),
            DATA_FLAG | TXID_FLAG => {
                let bytes = reader
                    .read_array::<32>()
                    .map_err(|_| SpvError::InsufficientBytesHash { bump_index, level, leaf })?;
                if flag == TXID_FLAG {
                    BumpLeaf::new_txid(offset, Hash::new(bytes))
                } else {
                    BumpLeaf::new_data(offset, Hash::new(bytes))
                }
            }
            _ => return Err(SpvError::InvalidLeafFlag { bump_index, level, leaf, flag }),
        };
        leaves.push(node);
    }

    Ok(leaves)
}
