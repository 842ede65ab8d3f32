//! SPV validator configuration.

use crate::script_verifier::ScriptFlags;

/// Configuration for decoding and certifying BEEF envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpvConfig {
    /// Flags handed to the script verifier for every input.
    pub script_flags: ScriptFlags,
    /// Upper bound on envelope size in bytes. `None` accepts any size.
    pub max_envelope_size: Option<usize>,
}

impl Default for SpvConfig {
    fn default() -> Self {
        SpvConfig {
            script_flags: ScriptFlags::ENABLE_SIGHASH_FORKID | ScriptFlags::UTXO_AFTER_GENESIS,
            max_envelope_size: None,
        }
    }
}

impl SpvConfig {
    /// Replace the script verification flags.
    pub fn with_script_flags(mut self, flags: ScriptFlags) -> Self {
        self.script_flags = flags;
        self
    }

    /// Reject envelopes larger than `max` bytes.
    pub fn with_max_envelope_size(mut self, max: usize) -> Self {
        self.max_envelope_size = Some(max);
        self
    }
}
