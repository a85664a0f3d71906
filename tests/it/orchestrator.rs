//! Transaction submission and error reporting.

use crate::utils::{deploy, CHECKPOINTS_RUNTIME, INVALID_RUNTIME, RAW_REVERT_RUNTIME};
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{Revert, SolError};
use gas_checkpoints::{
    orchestrator::creation_code, Orchestrator, OrchestratorConfig, TxError, TxOptions,
};
use revm::context_interface::result::HaltReason;

/// Runtime code that reverts with the given return data.
fn reverting_runtime(data: &[u8]) -> Vec<u8> {
    // PUSH2 len, DUP1, PUSH2 offset, PUSH1 0, CODECOPY, PUSH1 0, REVERT
    let mut code = creation_code(data).unwrap().to_vec();
    code[12] = 0xfd;
    code
}

#[test]
fn decodes_error_string_reverts() {
    let mut orchestrator = Orchestrator::new();
    let reason = Revert { reason: "relay worker only".into() }.abi_encode();
    let contract = deploy(&mut orchestrator, &reverting_runtime(&reason));

    let err = orchestrator.call_raw(contract, Bytes::new(), TxOptions::default()).unwrap_err();
    assert!(
        matches!(&err, TxError::Reverted { reason } if reason == "relay worker only"),
        "{err:?}"
    );
    assert_eq!(err.to_string(), "transaction reverted (relay worker only)");
}

#[test]
fn hex_encodes_other_reverts() {
    let mut orchestrator = Orchestrator::new();
    let contract = deploy(&mut orchestrator, &RAW_REVERT_RUNTIME);

    let err = orchestrator.call_raw(contract, Bytes::new(), TxOptions::default()).unwrap_err();
    assert!(matches!(&err, TxError::Reverted { reason } if reason == "dead"), "{err:?}");
}

#[test]
fn reports_halts() {
    let mut orchestrator = Orchestrator::new();
    let contract = deploy(&mut orchestrator, &INVALID_RUNTIME);

    let err = orchestrator.call_raw(contract, Bytes::new(), TxOptions::default()).unwrap_err();
    assert!(
        matches!(err, TxError::Halted { reason: HaltReason::InvalidFEOpcode }),
        "{err:?}"
    );
}

#[test]
fn failed_transactions_consume_nonces() {
    let mut orchestrator = Orchestrator::new();
    let contract = deploy(&mut orchestrator, &RAW_REVERT_RUNTIME);
    let target = deploy(&mut orchestrator, &CHECKPOINTS_RUNTIME);
    let sender = orchestrator.new_account();

    let options = TxOptions::default().sender(sender);
    assert!(orchestrator.call_raw(contract, Bytes::new(), options.clone()).is_err());
    assert_eq!(orchestrator.nonce_of(sender), 1);

    let receipt = orchestrator.call_raw(target, Bytes::new(), options).unwrap();
    assert_eq!(receipt.from, sender);
    assert_eq!(orchestrator.nonce_of(sender), 2);
    assert_eq!(orchestrator.next_nonce(sender), 2);
}

#[test]
fn value_is_funded_and_transferred() {
    let mut orchestrator = Orchestrator::new();
    let contract = deploy(&mut orchestrator, &CHECKPOINTS_RUNTIME);
    let sender = orchestrator.new_account();
    let value = U256::from(1_000);

    orchestrator
        .call_raw(contract, Bytes::new(), TxOptions::default().sender(sender).value(value))
        .unwrap();
    assert_eq!(orchestrator.balance(contract), value);
    assert_eq!(orchestrator.balance(sender), U256::ZERO);
}

#[test]
fn decode_errors_are_reported() {
    let mut orchestrator = Orchestrator::new();
    // returns nothing
    let contract = deploy(&mut orchestrator, &[0x00]);

    let err = orchestrator
        .call(contract, &crate::utils::checkpointsCall {}, TxOptions::default())
        .unwrap_err();
    assert!(matches!(err, TxError::Decode(_)), "{err:?}");
}

#[test]
fn evm_rejections_are_reported() {
    let config = OrchestratorConfig::default().with_gas_limit(1_000);
    let mut orchestrator = Orchestrator::with_config(config);

    let err = orchestrator
        .deploy(creation_code(&CHECKPOINTS_RUNTIME).unwrap(), TxOptions::default())
        .unwrap_err();
    assert!(matches!(err, TxError::Evm(_)), "{err:?}");

    // the inspector never saw the transaction and is ready for the next one
    assert!(!orchestrator.inspector().session().is_running());
}
