//! Transaction input referencing a previous output.
//!
//! Contains the source transaction ID, output index, unlocking script and
//! sequence number, with binary serialization following the Bitcoin wire
//! format.

use paymail_primitives::chainhash::Hash;
use paymail_primitives::util::{BsvReader, BsvWriter, VarInt};

use crate::script::Script;
use crate::TransactionError;

/// Sequence number marking an input as final. A transaction whose inputs
/// all carry it is final regardless of its lock time.
pub const MAX_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// Smallest possible encoded input: txid, index, empty script, sequence.
pub(crate) const MIN_INPUT_SIZE: usize = 32 + 4 + 1 + 4;

/// A single input in a transaction.
///
/// Each input references an output from a previous transaction by its
/// transaction ID (`source_txid`) and output index (`source_tx_out_index`).
///
/// # Wire format
///
/// | Field              | Size             |
/// |--------------------|------------------|
/// | source_txid        | 32 bytes (LE)    |
/// | source_tx_out_index| 4 bytes (LE)     |
/// | script length      | VarInt           |
/// | unlocking_script   | variable         |
/// | sequence_number    | 4 bytes (LE)     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// ID of the transaction whose output is being spent, in internal
    /// byte order.
    pub source_txid: Hash,

    /// Index of the output within the source transaction.
    pub source_tx_out_index: u32,

    /// Sequence number. Defaults to `MAX_SEQUENCE_NUMBER` (final).
    pub sequence_number: u32,

    /// The unlocking script (scriptSig).
    pub unlocking_script: Script,
}

impl TransactionInput {
    /// Create an input spending `source_tx_out_index` of `source_txid`,
    /// with an empty unlocking script and a final sequence number.
    pub fn new(source_txid: Hash, source_tx_out_index: u32) -> Self {
        TransactionInput {
            source_txid,
            source_tx_out_index,
            sequence_number: MAX_SEQUENCE_NUMBER,
            unlocking_script: Script::new(),
        }
    }

    /// Deserialize a `TransactionInput` from a `BsvReader`.
    ///
    /// # Arguments
    /// * `reader` - The reader positioned at the start of an encoded input.
    ///
    /// # Returns
    /// `Ok(TransactionInput)` on success, or a `TransactionError` if the
    /// data is truncated or malformed.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_array::<32>().map_err(|e| {
            TransactionError::SerializationError(format!("reading source txid: {}", e))
        })?;

        let source_tx_out_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;

        let script_len = reader.read_varint_usize().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;

        let script_bytes = reader.read_bytes(script_len).map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;

        let sequence_number = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence number: {}", e))
        })?;

        Ok(TransactionInput {
            source_txid: Hash::new(txid_bytes),
            source_tx_out_index,
            sequence_number,
            unlocking_script: Script::from_bytes(script_bytes),
        })
    }

    /// Serialize this `TransactionInput` into a `BsvWriter`.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_bytes(self.source_txid.as_bytes());
        writer.write_u32_le(self.source_tx_out_index);
        let script_bytes = self.unlocking_script.to_bytes();
        writer.write_varint(VarInt::from(script_bytes.len()));
        writer.write_bytes(script_bytes);
        writer.write_u32_le(self.sequence_number);
    }

    /// `true` when the sequence number is `MAX_SEQUENCE_NUMBER`.
    pub fn is_final(&self) -> bool {
        self.sequence_number == MAX_SEQUENCE_NUMBER
    }
}
