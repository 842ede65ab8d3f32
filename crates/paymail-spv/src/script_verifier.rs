//! Script verification capability consumed by the validator.
//!
//! The validator never executes scripts itself. It pairs each input with
//! its funding output and hands both to a [`ScriptVerifier`], which is
//! expected to wrap a full script interpreter.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use paymail_transaction::{Transaction, TransactionOutput};

/// Script verification flags passed through to the interpreter (bitmask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptFlags(pub u32);

impl ScriptFlags {
    pub const NONE: ScriptFlags = ScriptFlags(0);
    /// Signatures commit to the fork-id sighash algorithm.
    pub const ENABLE_SIGHASH_FORKID: ScriptFlags = ScriptFlags(1 << 11);
    /// Evaluate under the post-Genesis rule set.
    pub const UTXO_AFTER_GENESIS: ScriptFlags = ScriptFlags(1 << 14);

    pub fn has_flag(self, flag: ScriptFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn add_flag(&mut self, flag: ScriptFlags) {
        self.0 |= flag.0;
    }
}

impl BitOr for ScriptFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ScriptFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScriptFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ScriptFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        ScriptFlags(self.0 & rhs.0)
    }
}

/// A script failure reported by a [`ScriptVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptVerificationError {
    pub description: String,
}

impl ScriptVerificationError {
    pub fn new(description: impl Into<String>) -> Self {
        ScriptVerificationError { description: description.into() }
    }
}

impl fmt::Display for ScriptVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl std::error::Error for ScriptVerificationError {}

/// Verifies that an input's unlocking script satisfies its funding output.
pub trait ScriptVerifier {
    /// Execute input `input_index` of `tx` against `funding_output` under
    /// `flags`.
    ///
    /// # Returns
    /// `Ok(())` if the scripts evaluate to true, otherwise the interpreter's
    /// failure.
    fn verify(
        &self,
        tx: &Transaction,
        input_index: usize,
        funding_output: &TransactionOutput,
        flags: ScriptFlags,
    ) -> Result<(), ScriptVerificationError>;
}

impl<F> ScriptVerifier for F
where
    F: Fn(&Transaction, usize, &TransactionOutput, ScriptFlags) -> Result<(), ScriptVerificationError>,
{
    fn verify(
        &self,
        tx: &Transaction,
        input_index: usize,
        funding_output: &TransactionOutput,
        flags: ScriptFlags,
    ) -> Result<(), ScriptVerificationError> {
        self(tx, input_index, funding_output, flags)
    }
}
