//! Traces a call through a small contract that hits every kind of checkpoint and prints its gas
//! blocks.

use alloy_primitives::hex;
use alloy_sol_types::sol;
use gas_checkpoints::{
    orchestrator::creation_code, ColorChoice, Orchestrator, ReportWriter, TxOptions,
};
use std::{error::Error, io};
use tracing_subscriber::EnvFilter;

sol! {
    function checkpoints() external returns (uint256);
}

/// Runtime code of the demo contract.
///
/// `GAS` seven times, with the ecrecover `STATICCALL` between occurrences 1 and 2 and a second
/// `STATICCALL` after occurrence 6, then returns 42 for any call data.
const RUNTIME: [u8; 54] = hex!(
    "5a505a50"
    "6000600060006000600161fffffa50"
    "5a505a505a505a505a50"
    "6000600060006000600161fffffa50"
    "602a60005260206000f3"
);

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut orchestrator = Orchestrator::new();
    let code = creation_code(&RUNTIME).ok_or("runtime code too long")?;
    let deployment = orchestrator.deploy(code, TxOptions::default())?;
    println!("deployed at {}", deployment.address);

    let relayer = orchestrator.new_account();
    let call = orchestrator.call(
        deployment.address,
        &checkpointsCall {},
        TxOptions::default().sender(relayer),
    )?;
    println!("returned {} using {} gas", call.value, call.receipt.gas_used);

    ReportWriter::new(io::stdout())
        .use_colors(ColorChoice::Auto)
        .write_report(&call.receipt.report)?;
    Ok(())
}
