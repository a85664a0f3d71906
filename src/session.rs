use crate::{checkpoint::CheckpointConfig, report::GasReport};
use alloc::vec::Vec;
use alloy_primitives::map::HashMap;
use core::{fmt, mem};
use revm::bytecode::OpCode;
use thiserror::Error;
use tracing::trace;

/// A single executed instruction, as seen right before it executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionEvent {
    /// The instruction.
    pub opcode: OpCode,
    /// Gas charged for the instruction before any dynamic surcharge.
    pub static_fee: u64,
    /// Gas available in the executing frame before the instruction.
    pub gas_remaining: u64,
}

impl InstructionEvent {
    /// Creates a new event.
    pub const fn new(opcode: OpCode, static_fee: u64, gas_remaining: u64) -> Self {
        Self { opcode, static_fee, gas_remaining }
    }

    /// Returns the instruction mnemonic.
    pub const fn name(&self) -> &'static str {
        self.opcode.as_str()
    }
}

/// What opened a [`GasBlock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GasBlockKind {
    /// The start of the transaction.
    Begin,
    /// A `GAS` checkpoint.
    Gas,
    /// A yielding instruction: a call or the end of a context.
    Yield,
}

impl GasBlockKind {
    /// Returns the lowercase name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Gas => "gas",
            Self::Yield => "yield",
        }
    }
}

impl fmt::Display for GasBlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A segment of execution between two checkpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct GasBlock {
    /// What opened the block.
    pub kind: GasBlockKind,
    /// Gas remaining when the block opened.
    pub begin_gas: u64,
    /// Gas remaining when the block closed, `None` while open.
    pub yield_gas: Option<u64>,
    /// `begin_gas - yield_gas`, `None` while open.
    ///
    /// This is signed: a block opened in a callee and closed in its caller compares gas of two
    /// different frames.
    pub used_gas: Option<i64>,
}

impl GasBlock {
    /// Opens a block.
    pub const fn open(kind: GasBlockKind, begin_gas: u64) -> Self {
        Self { kind, begin_gas, yield_gas: None, used_gas: None }
    }

    /// Returns true if the block has been closed.
    pub const fn is_closed(&self) -> bool {
        self.yield_gas.is_some()
    }

    fn close(&mut self, yield_gas: u64) {
        self.yield_gas = Some(yield_gas);
        let used = i128::from(self.begin_gas) - i128::from(yield_gas);
        // saturates for gas limits beyond `i64::MAX`
        let saturated = if used < 0 { i64::MIN } else { i64::MAX };
        self.used_gas = Some(i64::try_from(used).unwrap_or(saturated));
    }
}

/// Errors raised by [`GasCheckpointSession`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A transaction began while another one was still being traced.
    #[error("a transaction began while another one is still being traced")]
    Reentrant,
    /// A checkpoint tried to close a block but no block was open.
    #[error("checkpoint {opcode} #{occurrence} has no open gas block to close")]
    UnknownCheckpointState {
        /// The closing instruction.
        opcode: OpCode,
        /// Its zero-based occurrence in the transaction.
        occurrence: u64,
    },
}

/// Whether a session is inside a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a transaction.
    #[default]
    Idle,
    /// Between the begin and end of a transaction.
    Tracing,
}

/// Splits the gas of a transaction into [`GasBlock`]s.
///
/// The session is driven by three signals: [`on_begin`](Self::on_begin) when a transaction
/// starts, [`on_step`](Self::on_step) before every instruction and [`on_end`](Self::on_end) when
/// the transaction is done. A block is closed by a checkpoint instruction and the next one is
/// opened by the instruction that follows it, because only then the gas remaining after the
/// checkpoint is known.
#[derive(Clone, Debug, Default)]
pub struct GasCheckpointSession {
    config: CheckpointConfig,
    state: SessionState,
    blocks: Vec<GasBlock>,
    previous: Option<OpCode>,
    counters: HashMap<OpCode, u64>,
}

// === impl GasCheckpointSession ===

impl GasCheckpointSession {
    /// Creates a session with the given checkpoints.
    pub fn new(config: CheckpointConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Returns the checkpoint configuration.
    pub const fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Returns true while a transaction is being traced.
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Tracing
    }

    /// Returns the current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the blocks of the current or last traced transaction.
    pub fn blocks(&self) -> &[GasBlock] {
        &self.blocks
    }

    /// Returns the blocks of the current or last traced transaction as a report.
    pub fn report(&self) -> GasReport {
        GasReport::new(self.blocks.clone())
    }

    /// Moves the blocks out of the session.
    pub fn take_report(&mut self) -> GasReport {
        GasReport::new(mem::take(&mut self.blocks))
    }

    /// Returns how often `opcode` has been seen in the current transaction.
    pub fn occurrences(&self, opcode: OpCode) -> u64 {
        self.counters.get(&opcode).copied().unwrap_or_default()
    }

    /// Starts tracing a transaction with the given gas limit.
    pub fn on_begin(&mut self, gas_limit: u64) -> Result<(), TraceError> {
        if self.is_running() {
            return Err(TraceError::Reentrant);
        }

        self.state = SessionState::Tracing;
        self.counters.clear();
        self.previous = None;
        self.blocks.clear();
        self.blocks.push(GasBlock::open(GasBlockKind::Begin, gas_limit));

        trace!(target: "gas_checkpoints::session", gas_limit, "begin transaction");
        Ok(())
    }

    /// Records an instruction that is about to execute.
    pub fn on_step(&mut self, event: &InstructionEvent) -> Result<(), TraceError> {
        let occurrence = self.occurrences(event.opcode);

        // the instruction after a checkpoint opens the next block
        if let Some(previous) = self.previous {
            let previous_occurrence = self.occurrences(previous).saturating_sub(1);
            if self.config.is_checkpoint(previous, previous_occurrence) {
                let kind = self.config.kind_after(previous);
                trace!(
                    target: "gas_checkpoints::session",
                    %kind,
                    after = %previous,
                    begin_gas = event.gas_remaining,
                    "open block"
                );
                self.blocks.push(GasBlock::open(kind, event.gas_remaining));
            }
        }

        if self.config.is_checkpoint(event.opcode, occurrence) {
            let yield_gas = event.gas_remaining.saturating_sub(event.static_fee);
            let block = self
                .blocks
                .last_mut()
                .filter(|block| !block.is_closed())
                .ok_or(TraceError::UnknownCheckpointState { opcode: event.opcode, occurrence })?;
            block.close(yield_gas);
            trace!(
                target: "gas_checkpoints::session",
                opcode = %event.opcode,
                occurrence,
                yield_gas,
                used_gas = block.used_gas,
                "close block"
            );
        }

        *self.counters.entry(event.opcode).or_default() += 1;
        self.previous = Some(event.opcode);
        Ok(())
    }

    /// Finishes the current transaction.
    ///
    /// The blocks stay available until the next [`on_begin`](Self::on_begin).
    pub fn on_end(&mut self) {
        self.state = SessionState::Idle;
        trace!(target: "gas_checkpoints::session", blocks = self.blocks.len(), "end transaction");
    }

    /// Resets the session to the state of [`Self::new`], keeping the configuration.
    pub fn fuse(&mut self) {
        let Self {
            state,
            blocks,
            previous,
            counters,
            // kept
            config: _,
        } = self;
        *state = SessionState::Idle;
        blocks.clear();
        previous.take();
        counters.clear();
    }
}
