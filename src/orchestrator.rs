//! Deploys contracts and submits calls against an in-memory revm instance with a
//! [`GasCheckpointInspector`] attached.

use crate::{
    checkpoint::CheckpointConfig,
    inspector::GasCheckpointInspector,
    report::GasReport,
    session::TraceError,
};
use alloc::{string::String, vec::Vec};
use alloy_primitives::{hex, keccak256, map::HashMap, Address, Bytes, Log, U256};
use alloy_sol_types::{Revert, SolCall, SolError};
use core::{convert::Infallible, fmt};
use revm::{
    context::TxEnv,
    context_interface::{
        result::{EVMError, ExecutionResult, HaltReason, Output},
        ContextTr, TransactTo,
    },
    database::{AccountState, CacheDB, EmptyDB},
    handler::{EvmTr, MainnetContext, MainnetEvm},
    inspector::InspectorEvmTr,
    primitives::hardfork::SpecId,
    Context, DatabaseCommit, InspectEvm, MainBuilder, MainContext,
};
use thiserror::Error;
use tracing::debug;

/// Gas limit of every submitted transaction, high enough that gas never runs out while
/// calibrating.
pub const CALIBRATION_GAS_LIMIT: u64 = 0x8000_0000_0000;

/// The EVM driven by the [`Orchestrator`].
pub type CheckpointEvm = MainnetEvm<MainnetContext<CacheDB<EmptyDB>>, GasCheckpointInspector>;

/// Configures the [`Orchestrator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Hardfork to execute under.
    pub spec: SpecId,
    /// Gas limit of every transaction.
    pub gas_limit: u64,
    /// Checkpoints recorded by the attached inspector.
    pub checkpoints: CheckpointConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            spec: SpecId::CANCUN,
            gas_limit: CALIBRATION_GAS_LIMIT,
            checkpoints: CheckpointConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Sets the hardfork.
    pub const fn with_spec(mut self, spec: SpecId) -> Self {
        self.spec = spec;
        self
    }

    /// Sets the transaction gas limit.
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the recorded checkpoints.
    pub fn with_checkpoints(mut self, checkpoints: CheckpointConfig) -> Self {
        self.checkpoints = checkpoints;
        self
    }
}

/// Per-transaction options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Sender of the transaction, a fresh account if `None`.
    pub from: Option<Address>,
    /// Value transferred with the transaction. The sender is credited with it beforehand.
    pub value: U256,
}

impl TxOptions {
    /// Sets the sender.
    pub const fn sender(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the transferred value.
    pub const fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Errors raised while submitting a transaction.
#[derive(Debug, Error)]
pub enum TxError {
    /// The transaction reverted.
    ///
    /// The reason is the decoded `Error(string)` message if the return data has that shape, and
    /// the hex-encoded return data otherwise.
    #[error("transaction reverted ({reason})")]
    Reverted {
        /// Why the transaction reverted.
        reason: String,
    },
    /// The transaction halted exceptionally, for example out of gas or on an invalid opcode.
    #[error("transaction halted ({reason:?})")]
    Halted {
        /// Why the transaction halted.
        reason: HaltReason,
    },
    /// The checkpoint trace failed.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// The EVM rejected the transaction.
    #[error("evm error: {0}")]
    Evm(EVMError<Infallible>),
    /// The return data didn't match the function's outputs.
    #[error(transparent)]
    Decode(#[from] alloy_sol_types::Error),
    /// A successful deployment returned no address.
    #[error("deployment succeeded without a created address")]
    MissingCreatedAddress,
}

/// Outcome of a successfully executed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Sender of the transaction.
    pub from: Address,
    /// Gas used by the transaction.
    pub gas_used: u64,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
    /// Return data, or the deployed code for deployments.
    pub output: Bytes,
    /// Gas blocks recorded while executing.
    pub report: GasReport,
}

/// A deployed contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// Address of the new contract.
    pub address: Address,
    /// The deployment transaction.
    pub receipt: Receipt,
}

/// A successful call with its decoded return value.
#[derive(Clone, Debug)]
pub struct CallReceipt<T> {
    /// The decoded return value.
    pub value: T,
    /// The call transaction.
    pub receipt: Receipt,
}

/// Builds, funds and submits transactions, recording the gas blocks of each one.
pub struct Orchestrator {
    evm: CheckpointEvm,
    config: OrchestratorConfig,
    /// Next nonce of every sender that submitted through this orchestrator.
    nonces: HashMap<Address, u64>,
    /// Number of accounts handed out by [`Self::new_account`].
    accounts: u64,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("nonces", &self.nonces)
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

// === impl Orchestrator ===

impl Orchestrator {
    /// Creates an orchestrator with an empty state and the default config.
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Creates an orchestrator with an empty state.
    pub fn with_config(config: OrchestratorConfig) -> Self {
        let spec = config.spec;
        let evm = Context::mainnet()
            .with_db(CacheDB::new(EmptyDB::default()))
            .modify_cfg_chained(|cfg| cfg.spec = spec)
            .build_mainnet_with_inspector(GasCheckpointInspector::new(config.checkpoints.clone()));
        Self { evm, config, nonces: HashMap::default(), accounts: 0 }
    }

    /// Returns the config.
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the attached inspector.
    pub const fn inspector(&self) -> &GasCheckpointInspector {
        &self.evm.inspector
    }

    /// Returns a fresh account address.
    ///
    /// Addresses are derived from a counter, so every orchestrator hands out the same sequence.
    pub fn new_account(&mut self) -> Address {
        self.accounts += 1;
        let mut seed = Vec::with_capacity(32);
        seed.extend_from_slice(b"gas-checkpoints/account/");
        seed.extend_from_slice(&self.accounts.to_be_bytes());
        Address::from_word(keccak256(seed))
    }

    /// Returns the nonce to use for the next transaction of `sender` and reserves it.
    ///
    /// The nonce is consumed even if the transaction later fails.
    pub fn next_nonce(&mut self, sender: Address) -> u64 {
        let nonce = self.nonces.get(&sender).copied().unwrap_or_default();
        self.nonces.insert(sender, nonce + 1);
        nonce
    }

    /// Credits `amount` to the balance of `address`.
    pub fn add_balance(&mut self, address: Address, amount: U256) {
        let Ok(account) = self.evm.ctx().db_mut().load_account(address);
        account.info.balance = account.info.balance.saturating_add(amount);
        if matches!(account.account_state, AccountState::NotExisting) {
            account.account_state = AccountState::None;
        }
    }

    /// Returns the balance of `address`.
    pub fn balance(&mut self, address: Address) -> U256 {
        let Ok(account) = self.evm.ctx().db_mut().load_account(address);
        account.info.balance
    }

    /// Returns the on-chain nonce of `address`.
    pub fn nonce_of(&mut self, address: Address) -> u64 {
        let Ok(account) = self.evm.ctx().db_mut().load_account(address);
        account.info.nonce
    }

    /// Deploys a contract from its creation code.
    pub fn deploy(&mut self, code: Bytes, options: TxOptions) -> Result<Deployment, TxError> {
        let (output, receipt) = self.submit(TransactTo::Create, code, options)?;
        let address = output.address().copied().ok_or(TxError::MissingCreatedAddress)?;
        debug!(target: "gas_checkpoints::orchestrator", %address, "deployed contract");
        Ok(Deployment { address, receipt })
    }

    /// Calls a contract function and decodes its return value.
    pub fn call<C: SolCall>(
        &mut self,
        to: Address,
        call: &C,
        options: TxOptions,
    ) -> Result<CallReceipt<C::Return>, TxError> {
        let receipt = self.call_raw(to, call.abi_encode().into(), options)?;
        let value = C::abi_decode_returns(&receipt.output)?;
        Ok(CallReceipt { value, receipt })
    }

    /// Calls a contract with raw call data.
    pub fn call_raw(
        &mut self,
        to: Address,
        data: Bytes,
        options: TxOptions,
    ) -> Result<Receipt, TxError> {
        self.submit(TransactTo::Call(to), data, options).map(|(_, receipt)| receipt)
    }

    fn submit(
        &mut self,
        kind: TransactTo,
        data: Bytes,
        options: TxOptions,
    ) -> Result<(Output, Receipt), TxError> {
        let TxOptions { from, value } = options;
        let from = match from {
            Some(from) => from,
            None => self.new_account(),
        };
        let nonce = self.next_nonce(from);
        self.add_balance(from, value);

        debug!(
            target: "gas_checkpoints::orchestrator",
            %from,
            nonce,
            ?kind,
            %value,
            "submitting transaction"
        );

        let tx = TxEnv {
            caller: from,
            gas_limit: self.config.gas_limit,
            gas_price: 0,
            kind,
            value,
            data,
            nonce,
            ..Default::default()
        };

        let res = self.evm.inspect_tx(tx).map_err(TxError::Evm)?;
        self.evm.ctx().db_mut().commit(res.state);

        if let Some(err) = self.evm.inspector().take_error() {
            return Err(err.into());
        }
        let report = self.evm.inspector().take_report();

        let gas_used = res.result.tx_gas_used();
        match res.result {
            ExecutionResult::Success { output, logs, .. } => {
                debug!(
                    target: "gas_checkpoints::orchestrator",
                    gas_used,
                    blocks = report.len(),
                    "transaction succeeded"
                );
                let receipt =
                    Receipt { from, gas_used, logs, output: output.data().clone(), report };
                Ok((output, receipt))
            }
            ExecutionResult::Revert { output, .. } => {
                Err(TxError::Reverted { reason: revert_reason(&output) })
            }
            ExecutionResult::Halt { reason, .. } => Err(TxError::Halted { reason }),
        }
    }
}

/// Wraps runtime code in a constructor that returns it unchanged.
///
/// Returns `None` if the runtime code is longer than `u16::MAX` bytes.
pub fn creation_code(runtime: &[u8]) -> Option<Bytes> {
    // PUSH2 len, DUP1, PUSH2 offset, PUSH1 0, CODECOPY, PUSH1 0, RETURN
    const PREFIX_LEN: u16 = 13;
    let [len_hi, len_lo] = u16::try_from(runtime.len()).ok()?.to_be_bytes();
    let [offset_hi, offset_lo] = PREFIX_LEN.to_be_bytes();

    let mut code = Vec::with_capacity(PREFIX_LEN as usize + runtime.len());
    code.extend_from_slice(&[
        0x61, len_hi, len_lo, 0x80, 0x61, offset_hi, offset_lo, 0x60, 0x00, 0x39, 0x60, 0x00, 0xf3,
    ]);
    code.extend_from_slice(runtime);
    Some(code.into())
}

/// Decodes the reason of a reverted execution.
///
/// Return data starting with the `Error(string)` selector is decoded to its message, anything
/// else is hex-encoded.
pub fn revert_reason(output: &[u8]) -> String {
    if output.starts_with(&Revert::SELECTOR) {
        if let Ok(revert) = Revert::abi_decode(output) {
            return revert.reason;
        }
    }
    hex::encode(output)
}
