//! Checkpoint detection.
//!
//! A checkpoint is an instruction occurrence that delimits a [`GasBlock`](crate::GasBlock).
//! Which occurrences count is not derived from the bytecode: the constants below describe the
//! relay hub contract that is being calibrated and have to be re-derived whenever that contract
//! changes.

use crate::session::GasBlockKind;
use alloc::{vec, vec::Vec};
use revm::bytecode::OpCode;

/// Instructions that hand control to another context or terminate the current one.
pub const RELAY_HUB_YIELDING: [OpCode; 4] =
    [OpCode::CALL, OpCode::STATICCALL, OpCode::RETURN, OpCode::STOP];

/// Occurrences of `GAS` that mark the boundaries the relay hub calibration measures.
pub const RELAY_HUB_GAS_OCCURRENCES: [u64; 5] = [0, 2, 4, 5, 6];

/// Configures which instruction occurrences are checkpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Instructions that always close the current block.
    yielding: Vec<OpCode>,
    /// Zero-based occurrences of `GAS` that are checkpoints.
    gas_occurrences: Vec<u64>,
    /// Call instruction whose leading occurrences are ignored, and how many of them.
    ///
    /// The first `STATICCALL` of a relayed call goes to the ecrecover precompile during
    /// signature verification and does not delimit anything.
    skipped_call: Option<(OpCode, u64)>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::relay_hub()
    }
}

impl CheckpointConfig {
    /// The checkpoints of the relay hub's `relayCall`.
    pub fn relay_hub() -> Self {
        Self {
            yielding: RELAY_HUB_YIELDING.to_vec(),
            gas_occurrences: RELAY_HUB_GAS_OCCURRENCES.to_vec(),
            skipped_call: Some((OpCode::STATICCALL, 1)),
        }
    }

    /// A configuration without any checkpoints.
    ///
    /// Only the implicit begin block is recorded, which is never closed.
    pub const fn none() -> Self {
        Self { yielding: Vec::new(), gas_occurrences: Vec::new(), skipped_call: None }
    }

    /// Sets the yielding instructions.
    pub fn with_yielding(mut self, yielding: impl IntoIterator<Item = OpCode>) -> Self {
        self.yielding = yielding.into_iter().collect();
        self
    }

    /// Sets the `GAS` occurrences that are checkpoints.
    pub fn with_gas_occurrences(mut self, occurrences: impl IntoIterator<Item = u64>) -> Self {
        self.gas_occurrences = occurrences.into_iter().collect();
        self
    }

    /// Ignores the first `count` occurrences of `opcode`.
    pub fn with_skipped_call(mut self, opcode: OpCode, count: u64) -> Self {
        self.skipped_call = Some((opcode, count));
        self
    }

    /// Stops ignoring any call occurrence.
    pub fn without_skipped_call(mut self) -> Self {
        self.skipped_call = None;
        self
    }

    /// Returns the yielding instructions.
    pub fn yielding(&self) -> &[OpCode] {
        &self.yielding
    }

    /// Returns the `GAS` occurrences that are checkpoints.
    pub fn gas_occurrences(&self) -> &[u64] {
        &self.gas_occurrences
    }

    /// Returns true if the given occurrence of `opcode` is a checkpoint.
    ///
    /// `occurrence` is zero-based and counts earlier occurrences of the same instruction within
    /// the current transaction.
    pub fn is_checkpoint(&self, opcode: OpCode, occurrence: u64) -> bool {
        if let Some((skipped, count)) = self.skipped_call {
            if opcode == skipped && occurrence < count {
                return false;
            }
        }

        if self.yielding.contains(&opcode) {
            return true;
        }

        opcode == OpCode::GAS && self.gas_occurrences.contains(&occurrence)
    }

    /// Returns the kind of block opened right after a checkpoint on `opcode`.
    #[inline]
    pub fn kind_after(&self, opcode: OpCode) -> GasBlockKind {
        if opcode == OpCode::GAS {
            GasBlockKind::Gas
        } else {
            GasBlockKind::Yield
        }
    }
}

/// Returns true if the given occurrence of `opcode` is a relay hub checkpoint.
///
/// Shorthand for [`CheckpointConfig::relay_hub`] followed by
/// [`CheckpointConfig::is_checkpoint`].
pub fn is_checkpoint(opcode: OpCode, occurrence: u64) -> bool {
    // mirrors `CheckpointConfig::relay_hub` without allocating
    if opcode == OpCode::STATICCALL && occurrence == 0 {
        return false;
    }
    if RELAY_HUB_YIELDING.contains(&opcode) {
        return true;
    }
    opcode == OpCode::GAS && RELAY_HUB_GAS_OCCURRENCES.contains(&occurrence)
}

/// Returns the occurrences in `0..len` at which `opcode` is a checkpoint under `config`.
pub fn checkpoint_occurrences(config: &CheckpointConfig, opcode: OpCode, len: u64) -> Vec<u64> {
    let mut out = vec![];
    for occurrence in 0..len {
        if config.is_checkpoint(opcode, occurrence) {
            out.push(occurrence);
        }
    }
    out
}
