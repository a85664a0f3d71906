use crate::{
    checkpoint::CheckpointConfig,
    fee::StaticFees,
    report::GasReport,
    session::{GasCheckpointSession, InstructionEvent, TraceError},
};
use alloy_primitives::Bytes;
use revm::{
    bytecode::OpCode,
    context::JournalTr,
    context_interface::{Cfg, ContextTr, Transaction},
    interpreter::{
        interpreter_types::{Jumps, LoopControl},
        CallInputs, CallOutcome, CreateInputs, CreateOutcome, Gas, InstructionResult,
        Interpreter, InterpreterAction, InterpreterResult,
    },
    primitives::hardfork::SpecId,
    Inspector,
};
use tracing::warn;

/// An [Inspector] that records [`GasBlock`](crate::GasBlock)s of every executed transaction.
///
/// The transaction begins with the root frame's [Inspector::call] or [Inspector::create] and
/// ends with the matching [Inspector::call_end] or [Inspector::create_end]. Every
/// [Inspector::step] in between, at any depth, is fed to the [GasCheckpointSession].
///
/// Inspector callbacks can't fail, so a [TraceError] reverts the transaction and is kept until
/// [`take_error`](Self::take_error) is called. Steps are ignored while an error is pending.
#[derive(Clone, Debug)]
pub struct GasCheckpointInspector {
    session: GasCheckpointSession,
    /// Static fees of the active hardfork.
    ///
    /// Rebuilt when a transaction begins under a different hardfork.
    fees: StaticFees,
    error: Option<TraceError>,
}

impl Default for GasCheckpointInspector {
    fn default() -> Self {
        Self::new(CheckpointConfig::default())
    }
}

// === impl GasCheckpointInspector ===

impl GasCheckpointInspector {
    /// Returns a new instance for the given checkpoints.
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            session: GasCheckpointSession::new(config),
            fees: StaticFees::default(),
            error: None,
        }
    }

    /// Returns the underlying session.
    pub const fn session(&self) -> &GasCheckpointSession {
        &self.session
    }

    /// Returns the blocks of the current or last transaction.
    pub fn report(&self) -> GasReport {
        self.session.report()
    }

    /// Moves the blocks of the last transaction out of the inspector.
    pub fn take_report(&mut self) -> GasReport {
        self.session.take_report()
    }

    /// Returns the pending error, if any.
    pub const fn error(&self) -> Option<&TraceError> {
        self.error.as_ref()
    }

    /// Takes the pending error.
    pub fn take_error(&mut self) -> Option<TraceError> {
        self.error.take()
    }

    /// Resets the inspector so it can trace the next transaction.
    ///
    /// This also clears a transaction that began but never ended, for example because the EVM
    /// returned an error mid-execution.
    pub fn fuse(&mut self) {
        self.session.fuse();
        self.error = None;
    }

    fn record(&mut self, err: TraceError) {
        warn!(target: "gas_checkpoints::inspector", %err, "gas checkpoint trace failed");
        self.error.get_or_insert(err);
    }

    /// Starts a transaction, returning the revert result if it can't be traced.
    fn begin<CTX: ContextTr>(&mut self, context: &CTX, gas: u64) -> Option<InterpreterResult> {
        let spec: SpecId = context.cfg().spec().into();
        if self.fees.spec() != spec {
            self.fees = StaticFees::new(spec);
        }
        match self.session.on_begin(context.tx().gas_limit()) {
            Ok(()) => None,
            Err(err) => {
                let output = Bytes::copy_from_slice(err.to_string().as_bytes());
                self.record(err);
                Some(InterpreterResult {
                    result: InstructionResult::Revert,
                    output,
                    gas: Gas::new(gas),
                })
            }
        }
    }
}

impl<CTX> Inspector<CTX> for GasCheckpointInspector
where
    CTX: ContextTr,
{
    fn step(&mut self, interp: &mut Interpreter, _context: &mut CTX) {
        if self.error.is_some() {
            return;
        }

        let op = interp.bytecode.opcode();
        // SAFETY: the opcode is only used as a counter key and for its static fee
        let opcode = OpCode::new(op).unwrap_or_else(|| unsafe { OpCode::new_unchecked(op) });
        let event = InstructionEvent::new(opcode, self.fees.fee(op), interp.gas.remaining());

        if let Err(err) = self.session.on_step(&event) {
            self.record(err);
            interp
                .bytecode
                .set_action(InterpreterAction::new_halt(InstructionResult::Revert, interp.gas));
        }
    }

    fn call(&mut self, context: &mut CTX, inputs: &mut CallInputs) -> Option<CallOutcome> {
        if context.journal_ref().depth() != 0 {
            return None;
        }
        self.begin(context, inputs.gas_limit)
            .map(|result| CallOutcome::new(result, inputs.return_memory_offset.clone()))
    }

    fn call_end(&mut self, context: &mut CTX, _inputs: &CallInputs, _outcome: &mut CallOutcome) {
        if context.journal_ref().depth() == 0 {
            self.session.on_end();
        }
    }

    fn create(&mut self, context: &mut CTX, inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        if context.journal_ref().depth() != 0 {
            return None;
        }
        self.begin(context, inputs.gas_limit()).map(|result| CreateOutcome::new(result, None))
    }

    fn create_end(
        &mut self,
        context: &mut CTX,
        _inputs: &CreateInputs,
        _outcome: &mut CreateOutcome,
    ) {
        if context.journal_ref().depth() == 0 {
            self.session.on_end();
        }
    }
}
