use alloy_primitives::{hex, Address};
use alloy_sol_types::sol;
use gas_checkpoints::{orchestrator::creation_code, Orchestrator, TxOptions};

sol! {
    function checkpoints() external returns (uint256);
}

/// `GAS` seven times, with the ecrecover `STATICCALL` between occurrences 1 and 2 and a second
/// `STATICCALL` after occurrence 6, then returns 42.
pub const CHECKPOINTS_RUNTIME: [u8; 54] = hex!(
    "5a505a50"
    "6000600060006000600161fffffa50"
    "5a505a505a505a505a50"
    "6000600060006000600161fffffa50"
    "602a60005260206000f3"
);

/// Reverts with `0xdead`.
pub const RAW_REVERT_RUNTIME: [u8; 11] = hex!("61dead6000526002601efd");

/// Emits an empty LOG0 and stops.
pub const LOG_RUNTIME: [u8; 6] = hex!("60006000a000");

/// Hits the designated invalid instruction.
pub const INVALID_RUNTIME: [u8; 1] = hex!("fe");

/// Deploys the given runtime code from a fresh account.
pub fn deploy(orchestrator: &mut Orchestrator, runtime: &[u8]) -> Address {
    let code = creation_code(runtime).expect("runtime fits");
    orchestrator.deploy(code, TxOptions::default()).expect("deployment succeeds").address
}
