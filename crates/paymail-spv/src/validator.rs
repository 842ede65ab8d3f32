//! SPV certification of a decoded BEEF envelope.
//!
//! A transaction is certified when its lock time is final, every input's
//! script is satisfied by a funding output shipped in the same bundle, and
//! every unmined ancestor passes the same checks down to transactions
//! anchored by a BUMP proof. Whether each anchor's Merkle root belongs to
//! the chain is a separate question answered by a [`ChainTracker`].

use std::collections::{HashMap, HashSet};

use paymail_primitives::chainhash::Hash;
use paymail_transaction::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::beef::{decode_beef_hex, DecodedBeef, TxData};
use crate::bump::Bump;
use crate::chain_tracker::ChainTracker;
use crate::config::SpvConfig;
use crate::error::SpvError;
use crate::script_verifier::ScriptVerifier;

/// A mined transaction proven by a BUMP in the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub txid: Hash,
    pub bump_index: usize,
    pub block_height: u64,
    /// Position of the transaction among the block's transactions.
    pub offset: u64,
    /// Root recomputed from the transaction's leaf.
    pub merkle_root: Hash,
}

/// Result of a successful certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub target_txid: Hash,
    /// Transactions whose lock time and input scripts were checked, in
    /// visiting order starting with the target.
    pub validated_txids: Vec<Hash>,
    /// Proven Merkle anchors, one per mined transaction reached.
    pub anchors: Vec<Anchor>,
}

impl Certification {
    /// Distinct `(block height, Merkle root)` pairs that still need to be
    /// confirmed against block headers.
    pub fn roots_to_confirm(&self) -> Vec<(u64, Hash)> {
        let mut seen = HashSet::new();
        self.anchors
            .iter()
            .map(|anchor| (anchor.block_height, anchor.merkle_root))
            .filter(|pair| seen.insert(*pair))
            .collect()
    }
}

/// Check lock-time finality without any view of the chain tip.
///
/// A zero lock time always passes. A nonzero lock time passes only if every
/// input carries the final sequence number, which makes the lock time
/// irrelevant; anything else depends on chain state and is rejected.
pub fn validate_lock_time(tx: &Transaction) -> Result<(), SpvError> {
    if tx.lock_time == 0 {
        return Ok(());
    }
    for (input_index, input) in tx.inputs.iter().enumerate() {
        if !input.is_final() {
            return Err(SpvError::LockTimeNotFinal {
                txid: tx.tx_id(),
                lock_time: tx.lock_time,
                input_index,
                sequence: input.sequence_number,
            });
        }
    }
    Ok(())
}

/// Whether `tx` is mined and its ID is a level-0 leaf of the proof it
/// points at. Missing or out-of-range proofs are simply "not found".
pub fn exists_in_bumps(tx: &TxData, bumps: &[Bump]) -> bool {
    tx.bump_index()
        .and_then(|index| bumps.get(index))
        .is_some_and(|bump| bump.find_level0_leaf(&tx.txid()).is_some())
}

/// Locate and prove the anchor of a mined transaction.
fn prove_anchor(tx: &TxData, bump_index: usize, bumps: &[Bump]) -> Result<Anchor, SpvError> {
    let txid = tx.txid();
    let bump = bumps.get(bump_index).ok_or(SpvError::BumpIndexOutOfRange {
        txid,
        bump_index,
        bump_count: bumps.len(),
    })?;
    let leaf = bump
        .find_level0_leaf(&txid)
        .ok_or(SpvError::TransactionNotInBump { txid, bump_index })?;
    let merkle_root = bump.root_from_leaf(leaf)?;

    Ok(Anchor {
        txid,
        bump_index,
        block_height: bump.block_height(),
        offset: leaf.offset,
        merkle_root,
    })
}

/// Certifies transactions carried in BEEF envelopes.
#[derive(Debug, Clone)]
pub struct SpvValidator<V> {
    config: SpvConfig,
    verifier: V,
}

impl<V: ScriptVerifier> SpvValidator<V> {
    /// Create a validator with the default configuration.
    pub fn new(verifier: V) -> Self {
        Self::with_config(verifier, SpvConfig::default())
    }

    pub fn with_config(verifier: V, config: SpvConfig) -> Self {
        SpvValidator { config, verifier }
    }

    pub fn config(&self) -> &SpvConfig {
        &self.config
    }

    /// Decode a hex envelope under this validator's configuration and
    /// certify its target.
    pub fn certify_hex(&self, beef_hex: &str) -> Result<Certification, SpvError> {
        let beef = decode_beef_hex(beef_hex, &self.config)?;
        self.certify(&beef)
    }

    /// Certify the target of `beef` and confirm every anchor's Merkle root
    /// with `tracker`.
    pub fn certify_with_chain_tracker<T>(&self, beef: &DecodedBeef, tracker: &T) -> Result<Certification, SpvError>
    where
        T: ChainTracker + ?Sized,
    {
        let certification = self.certify(beef)?;
        for (block_height, root) in certification.roots_to_confirm() {
            if !tracker.is_valid_root_for_height(&root, block_height)? {
                debug!(block_height, %root, "merkle root rejected by chain tracker");
                return Err(SpvError::InvalidMerkleRoot { block_height, root });
            }
        }
        Ok(certification)
    }

    /// Certify the target of `beef` from the data the bundle ships with.
    ///
    /// The target must have a final lock time and valid input scripts. If
    /// it is unmined its parents are checked the same way, recursively,
    /// until mined transactions are reached; each of those must be proven
    /// by its BUMP. The target's Merkle proof is checked too when it has one.
    pub fn certify(&self, beef: &DecodedBeef) -> Result<Certification, SpvError> {
        let target_txid = beef.target().txid();
        debug!(target = %target_txid, transactions = beef.transactions().len(), "certifying transaction");

        let result = self.walk(beef);
        match &result {
            Ok(cert) => debug!(
                target = %target_txid,
                validated = cert.validated_txids.len(),
                anchors = cert.anchors.len(),
                "transaction certified"
            ),
            Err(e) => debug!(target = %target_txid, error = %e, "certification failed"),
        }
        result
    }

    fn walk(&self, beef: &DecodedBeef) -> Result<Certification, SpvError> {
        let transactions = beef.transactions();
        let index = beef.txid_index();
        let target_position = transactions.len() - 1;

        let mut certification = Certification {
            target_txid: beef.target().txid(),
            validated_txids: Vec::new(),
            anchors: Vec::new(),
        };
        let mut visited = HashSet::new();
        let mut pending = vec![target_position];

        while let Some(position) = pending.pop() {
            let tx = &transactions[position];
            if !visited.insert(tx.txid()) {
                continue;
            }

            let is_target = position == target_position;
            if is_target || !tx.is_mined() {
                let parents = self.check_transaction(tx, transactions, &index)?;
                certification.validated_txids.push(tx.txid());
                if !tx.is_mined() {
                    pending.extend(parents);
                }
            }

            if let Some(bump_index) = tx.bump_index() {
                let anchor = prove_anchor(tx, bump_index, beef.bumps())?;
                trace!(txid = %anchor.txid, block_height = anchor.block_height, offset = anchor.offset, "anchor proven");
                certification.anchors.push(anchor);
            }
        }

        Ok(certification)
    }

    /// Lock time and script checks for one transaction. Returns the
    /// positions of its parents within the bundle.
    fn check_transaction(
        &self,
        tx: &TxData,
        transactions: &[TxData],
        index: &HashMap<Hash, usize>,
    ) -> Result<Vec<usize>, SpvError> {
        let txid = tx.txid();
        let transaction = tx.transaction();
        validate_lock_time(transaction)?;

        let mut parents = Vec::with_capacity(transaction.inputs.len());
        for (input_index, input) in transaction.inputs.iter().enumerate() {
            let source_txid = input.source_txid;
            let position = *index.get(&source_txid).ok_or(SpvError::NoMatchingTransactionForInput {
                txid,
                input_index,
                source_txid,
            })?;

            let vout = input.source_tx_out_index;
            let funding_output = transactions[position]
                .transaction()
                .outputs
                .get(vout as usize)
                .ok_or(SpvError::MissingFundingOutput { txid, input_index, source_txid, vout })?;

            self.verifier
                .verify(transaction, input_index, funding_output, self.config.script_flags)
                .map_err(|source| SpvError::InvalidScript { txid, input_index, source })?;
            trace!(%txid, input_index, %source_txid, vout, "input script verified");

            parents.push(position);
        }

        Ok(parents)
    }
}
