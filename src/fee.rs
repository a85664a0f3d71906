//! Static instruction fees.
//!
//! The static fee is the part of an instruction's cost that is known before it executes, as
//! charged by revm's instruction table for the active hardfork. Dynamic surcharges (memory
//! expansion, cold account and slot access, value transfers, log data, copy words) are not
//! included.

use revm::{
    database::EmptyDB,
    handler::MainnetContext,
    interpreter::{instructions::instruction_table_gas_changes_spec, interpreter::EthInterpreter},
    primitives::hardfork::SpecId,
};

/// Host the instruction table is instantiated for. Static fees don't depend on it.
type TableHost = MainnetContext<EmptyDB>;

/// The static fee of every opcode under one hardfork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticFees {
    spec: SpecId,
    fees: [u64; 256],
}

impl Default for StaticFees {
    fn default() -> Self {
        Self::new(SpecId::default())
    }
}

impl StaticFees {
    /// Builds the fees of `spec` from revm's instruction table.
    pub fn new(spec: SpecId) -> Self {
        let table = instruction_table_gas_changes_spec::<EthInterpreter, TableHost>(spec);
        Self { spec, fees: core::array::from_fn(|op| table[op].static_gas()) }
    }

    /// Returns the hardfork the fees belong to.
    pub const fn spec(&self) -> SpecId {
        self.spec
    }

    /// Returns the static fee of `op`. Undefined opcodes have none.
    #[inline]
    pub const fn fee(&self, op: u8) -> u64 {
        self.fees[op as usize]
    }
}

/// Returns the static fee of `op` under `spec`.
///
/// This builds the whole table, prefer [`StaticFees`] for repeated lookups.
pub fn static_fee(op: u8, spec: SpecId) -> u64 {
    StaticFees::new(spec).fee(op)
}
