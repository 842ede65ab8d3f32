//! BEEF (Background Evaluation Extended Format) envelopes.
//!
//! An envelope carries the transaction under certification together with
//! its ancestors and the BUMP proofs that anchor the mined ones:
//!
//! ```text
//! [2 bytes version][0xBE 0xEF]
//! [varint bump count] { bump }*
//! [varint tx count]   { raw tx [has-bump 0|1] [varint bump index]? }*
//! ```
//!
//! Transactions are ordered ancestors first; the last one is the target.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use paymail_primitives::chainhash::Hash;
use paymail_primitives::util::{BsvReader, BsvWriter, VarInt};
use paymail_transaction::Transaction;
use tracing::debug;

use crate::bump::Bump;
use crate::config::SpvConfig;
use crate::error::SpvError;

/// The two marker bytes following the version.
pub const BEEF_MARKER: [u8; 2] = [0xbe, 0xef];

/// Version written by [`DecodedBeef::new`].
pub const BEEF_V1_VERSION: u16 = 1;

/// Smallest encoded bump: a one-byte height and a tree height of zero.
const MIN_BUMP_SIZE: usize = 2;

/// Smallest encoded transaction record: an empty 10-byte transaction and
/// its has-bump flag.
const MIN_TX_RECORD_SIZE: usize = 11;

const HAS_BUMP: u8 = 1;
const NO_BUMP: u8 = 0;

/// One transaction of an envelope.
///
/// The transaction ID is computed from the serialized transaction on first
/// use and cached. Fields are read-only so the cache can never go stale.
#[derive(Clone)]
pub struct TxData {
    transaction: Transaction,
    bump_index: Option<usize>,
    txid: OnceLock<Hash>,
}

impl TxData {
    /// Wrap a transaction. `bump_index` marks it as mined in that proof.
    pub fn new(transaction: Transaction, bump_index: Option<usize>) -> Self {
        TxData { transaction, bump_index, txid: OnceLock::new() }
    }

    /// A transaction without a proof.
    pub fn unmined(transaction: Transaction) -> Self {
        Self::new(transaction, None)
    }

    /// A transaction anchored by the proof at `bump_index`.
    pub fn mined(transaction: Transaction, bump_index: usize) -> Self {
        Self::new(transaction, Some(bump_index))
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn bump_index(&self) -> Option<usize> {
        self.bump_index
    }

    pub fn is_mined(&self) -> bool {
        self.bump_index.is_some()
    }

    /// The transaction ID, computed once.
    pub fn txid(&self) -> Hash {
        *self.txid.get_or_init(|| self.transaction.tx_id())
    }
}

impl fmt::Debug for TxData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxData")
            .field("txid", &self.txid())
            .field("bump_index", &self.bump_index)
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl PartialEq for TxData {
    fn eq(&self, other: &Self) -> bool {
        self.bump_index == other.bump_index && self.transaction == other.transaction
    }
}

impl Eq for TxData {}

/// A fully decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBeef {
    version: u16,
    bumps: Vec<Bump>,
    transactions: Vec<TxData>,
}

/// Decode a hex envelope, applying the limits in `config`.
pub fn decode_beef_hex(hex_str: &str, config: &SpvConfig) -> Result<DecodedBeef, SpvError> {
    let bytes = hex::decode(hex_str).map_err(|e| SpvError::InvalidHexStream(e.to_string()))?;
    DecodedBeef::from_bytes_with_config(&bytes, config)
}

impl DecodedBeef {
    /// Assemble an envelope from parts. At least two transactions are
    /// required, the last one being the target.
    pub fn new(bumps: Vec<Bump>, transactions: Vec<TxData>) -> Result<Self, SpvError> {
        Self::with_version(BEEF_V1_VERSION, bumps, transactions)
    }

    /// Like [`DecodedBeef::new`] with an explicit version field.
    pub fn with_version(version: u16, bumps: Vec<Bump>, transactions: Vec<TxData>) -> Result<Self, SpvError> {
        if transactions.len() < 2 {
            return Err(SpvError::InsufficientTransactions { count: transactions.len() as u64 });
        }
        Ok(DecodedBeef { version, bumps, transactions })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn bumps(&self) -> &[Bump] {
        &self.bumps
    }

    /// Transactions, ancestors first.
    pub fn transactions(&self) -> &[TxData] {
        &self.transactions
    }

    /// The transaction under certification (always the last one).
    pub fn target(&self) -> &TxData {
        // `with_version` and the decoder both guarantee two or more entries.
        &self.transactions[self.transactions.len() - 1]
    }

    /// Find a transaction by ID.
    pub fn find_transaction(&self, txid: &Hash) -> Option<&TxData> {
        self.transactions.iter().find(|tx| tx.txid() == *txid)
    }

    /// Map every transaction ID to its position. The first occurrence wins
    /// if an ID repeats.
    pub fn txid_index(&self) -> HashMap<Hash, usize> {
        let mut index = HashMap::with_capacity(self.transactions.len());
        for (position, tx) in self.transactions.iter().enumerate() {
            index.entry(tx.txid()).or_insert(position);
        }
        index
    }

    /// `(block height, Merkle root)` for every bump that anchors at least
    /// one transaction ID, without duplicates and in bump order.
    ///
    /// These are the roots a caller must confirm against trusted headers.
    pub fn merkle_roots(&self) -> Result<Vec<(u64, Hash)>, SpvError> {
        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for bump in &self.bumps {
            if let Some(root) = bump.compute_merkle_root()? {
                if seen.insert((bump.block_height(), root)) {
                    roots.push((bump.block_height(), root));
                }
            }
        }
        Ok(roots)
    }

    // -----------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------

    /// Decode a hex envelope with the default configuration.
    pub fn from_hex(hex_str: &str) -> Result<Self, SpvError> {
        decode_beef_hex(hex_str, &SpvConfig::default())
    }

    /// Decode an envelope with the default configuration.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        Self::from_bytes_with_config(data, &SpvConfig::default())
    }

    /// Decode an envelope, rejecting it if it exceeds
    /// `config.max_envelope_size`.
    pub fn from_bytes_with_config(data: &[u8], config: &SpvConfig) -> Result<Self, SpvError> {
        let result = decode(data, config);
        match &result {
            Ok(beef) => debug!(
                len = data.len(),
                bumps = beef.bumps.len(),
                transactions = beef.transactions.len(),
                target = %beef.target().txid(),
                "decoded BEEF envelope"
            ),
            Err(e) => debug!(len = data.len(), error = %e, "rejected BEEF envelope"),
        }
        result
    }

    // -----------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------

    /// Serialize into a writer.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_u16_le(self.version);
        writer.write_bytes(&BEEF_MARKER);

        writer.write_varint(VarInt::from(self.bumps.len()));
        for bump in &self.bumps {
            bump.write_to(writer);
        }

        writer.write_varint(VarInt::from(self.transactions.len()));
        for tx in &self.transactions {
            tx.transaction.write_to(writer);
            match tx.bump_index {
                Some(index) => {
                    writer.write_u8(HAS_BUMP);
                    writer.write_varint(VarInt::from(index));
                }
                None => writer.write_u8(NO_BUMP),
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn decode(data: &[u8], config: &SpvConfig) -> Result<DecodedBeef, SpvError> {
    if let Some(max) = config.max_envelope_size {
        if data.len() > max {
            return Err(SpvError::EnvelopeTooLarge { len: data.len(), max });
        }
    }
    if data.len() < 4 {
        return Err(SpvError::EnvelopeTooShort { len: data.len() });
    }

    let mut reader = BsvReader::new(data);
    let version = reader
        .read_u16_le()
        .map_err(|_| SpvError::EnvelopeTooShort { len: data.len() })?;
    let marker = reader
        .read_array::<2>()
        .map_err(|_| SpvError::EnvelopeTooShort { len: data.len() })?;
    if marker != BEEF_MARKER {
        return Err(SpvError::InvalidMarker { found: marker });
    }

    let bumps = read_bumps(&mut reader)?;
    let transactions = read_transactions(&mut reader)?;

    if !reader.is_empty() {
        return Err(SpvError::TrailingBytes { count: reader.remaining() });
    }

    Ok(DecodedBeef { version, bumps, transactions })
}

fn read_bumps(reader: &mut BsvReader) -> Result<Vec<Bump>, SpvError> {
    if reader.is_empty() {
        return Err(SpvError::NoBytesForBumps);
    }
    let count = reader.read_varint().map_err(|_| SpvError::NoBytesForBumps)?;
    let bump_count = count.to_usize().map_err(|_| SpvError::IntegerOverflow {
        field: "bump count",
        value: count.value(),
    })?;
    if bump_count == 0 {
        return Err(SpvError::NoBumps);
    }

    let mut bumps = Vec::with_capacity(bump_count.min(reader.remaining() / MIN_BUMP_SIZE));
    for bump_index in 0..bump_count {
        bumps.push(Bump::read_from(reader, bump_index)?);
    }
    Ok(bumps)
}

fn read_transactions(reader: &mut BsvReader) -> Result<Vec<TxData>, SpvError> {
    let count = reader.read_varint().map_err(|_| SpvError::InsufficientBytesTxCount)?;
    if count.value() < 2 {
        return Err(SpvError::InsufficientTransactions { count: count.value() });
    }
    let tx_count = count.to_usize().map_err(|_| SpvError::IntegerOverflow {
        field: "transaction count",
        value: count.value(),
    })?;
    if tx_count > reader.remaining() / MIN_TX_RECORD_SIZE {
        return Err(SpvError::ImplausibleTxCount {
            count: count.value(),
            remaining: reader.remaining(),
        });
    }

    let mut transactions = Vec::with_capacity(tx_count);
    for tx_index in 0..tx_count {
        let transaction = Transaction::read_from(reader)
            .map_err(|source| SpvError::InvalidTransactionData { tx_index, source })?;

        let flag = reader
            .read_u8()
            .map_err(|_| SpvError::InsufficientBytesHasBump { tx_index })?;
        let bump_index = match flag {
            NO_BUMP => None,
            HAS_BUMP => {
                let index = reader
                    .read_varint()
                    .map_err(|_| SpvError::InsufficientBytesBumpIndex { tx_index })?;
                let index = index.to_usize().map_err(|_| SpvError::IntegerOverflow {
                    field: "bump index",
                    value: index.value(),
                })?;
                Some(index)
            }
            _ => return Err(SpvError::InvalidHasBumpFlag { tx_index, flag }),
        };

        transactions.push(TxData::new(transaction, bump_index));
    }
    Ok(transactions)
}
