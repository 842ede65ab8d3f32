//! Core transaction type.
//!
//! Represents a complete transaction with version, inputs, outputs and lock
//! time. `to_bytes` reproduces the bytes read as long as every count and
//! script length was encoded as a minimal varint, which is how the network
//! serializes transactions. A non-minimal varint parses, but serializing
//! writes the minimal form, so the bytes and the transaction ID change.

use paymail_primitives::chainhash::{double_hash_h, Hash};
use paymail_primitives::util::{BsvReader, BsvWriter, VarInt};

use crate::input::{TransactionInput, MIN_INPUT_SIZE};
use crate::output::{TransactionOutput, MIN_OUTPUT_SIZE};
use crate::TransactionError;

/// A transaction consisting of a version, a set of inputs, a set of
/// outputs, and a lock time.
///
/// # Wire format
///
/// | Field        | Size                      |
/// |--------------|---------------------------|
/// | version      | 4 bytes (LE)              |
/// | input count  | VarInt                    |
/// | inputs       | variable (per input)      |
/// | output count | VarInt                    |
/// | outputs      | variable (per output)     |
/// | lock_time    | 4 bytes (LE)              |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u32,

    /// Ordered list of transaction inputs.
    pub inputs: Vec<TransactionInput>,

    /// Ordered list of transaction outputs.
    pub outputs: Vec<TransactionOutput>,

    /// Lock time. If non-zero, the transaction is not final until the
    /// specified block height or Unix timestamp, unless every input is final.
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new empty transaction with version 1 and lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str).map_err(|e| {
            TransactionError::SerializationError(format!("invalid hex: {}", e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a transaction from raw bytes.
    ///
    /// The byte slice must contain exactly one complete transaction with no
    /// trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = BsvReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(TransactionError::SerializationError(
                format!("trailing {} bytes after transaction", reader.remaining()),
            ));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a `BsvReader`, leaving the reader
    /// positioned on the first byte after the lock time.
    ///
    /// Input and output counts are checked against the bytes left in the
    /// reader before anything is allocated, so a spoofed count cannot
    /// trigger a large allocation.
    ///
    /// # Arguments
    /// * `reader` - The reader positioned at the start of a serialized transaction.
    ///
    /// # Returns
    /// `Ok(Transaction)` on success, or a `TransactionError` on truncated
    /// or implausible data.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading version: {}", e))
        })?;

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading input count: {}", e))
        })?;
        let input_count = bounded_count(reader, input_count, MIN_INPUT_SIZE, "input")?;

        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TransactionInput::read_from(reader)?);
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading output count: {}", e))
        })?;
        let output_count = bounded_count(reader, output_count, MIN_OUTPUT_SIZE, "output")?;

        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading lock time: {}", e))
        })?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Write this transaction into a `BsvWriter`.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_u32_le(self.version);

        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(writer);
        }

        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(writer);
        }

        writer.write_u32_le(self.lock_time);
    }

    /// Serialize this transaction to raw bytes:
    /// version(4) + varint(n_in) + inputs + varint(n_out) + outputs + locktime(4).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::with_capacity(256);
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialize this transaction to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    // -----------------------------------------------------------------
    // Transaction ID
    // -----------------------------------------------------------------

    /// Compute the transaction ID (double SHA-256 of serialized bytes).
    ///
    /// The returned hash is in internal byte order; its `Display` form is
    /// the conventional txid string. It is taken over the canonical
    /// minimal-varint encoding, not over whatever bytes were parsed.
    pub fn tx_id(&self) -> Hash {
        double_hash_h(&self.to_bytes())
    }

    // -----------------------------------------------------------------
    // Inputs and outputs
    // -----------------------------------------------------------------

    /// Append a `TransactionInput` to this transaction.
    pub fn add_input(&mut self, input: TransactionInput) {
        self.inputs.push(input);
    }

    /// Append a `TransactionOutput` to this transaction.
    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.push(output);
    }
}

/// Widen a count field and reject it if `remaining` bytes could not hold
/// that many elements of at least `min_size` bytes each.
fn bounded_count(
    reader: &BsvReader,
    count: VarInt,
    min_size: usize,
    field: &'static str,
) -> Result<usize, TransactionError> {
    let remaining = reader.remaining();
    let implausible = TransactionError::ImplausibleCount {
        field,
        count: count.value(),
        remaining,
    };
    let count = count.to_usize().map_err(|_| implausible)?;
    if count > remaining / min_size {
        return Err(TransactionError::ImplausibleCount {
            field,
            count: count as u64,
            remaining,
        });
    }
    Ok(count)
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Transaction {
    /// Display the transaction as its hex-encoded serialization.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
