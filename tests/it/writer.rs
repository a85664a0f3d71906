use crate::utils::{deploy, CHECKPOINTS_RUNTIME};
use alloy_primitives::Bytes;
use gas_checkpoints::{
    CheckpointConfig, ColorChoice, GasBlock, GasBlockKind, GasReport, Orchestrator,
    OrchestratorConfig, ReportWriter, TxOptions,
};
use snapbox::assert_data_eq;

fn render(report: &GasReport) -> String {
    let mut writer = ReportWriter::new(Vec::new()).use_colors(ColorChoice::Never);
    writer.write_report(report).unwrap();
    String::from_utf8(writer.into_writer()).unwrap()
}

#[test]
fn writes_open_begin_block() {
    let config = OrchestratorConfig::default().with_checkpoints(CheckpointConfig::none());
    let mut orchestrator = Orchestrator::with_config(config);
    let contract = deploy(&mut orchestrator, &CHECKPOINTS_RUNTIME);
    let receipt = orchestrator.call_raw(contract, Bytes::new(), TxOptions::default()).unwrap();

    assert_data_eq!(
        render(&receipt.report),
        "#0   begin begin=140737488355328 <open>\ntotal used: 0\n"
    );
}

#[test]
fn writes_negative_usage() {
    let report = GasReport::new(vec![
        GasBlock {
            kind: GasBlockKind::Gas,
            begin_gas: 1_000,
            yield_gas: Some(1_100),
            used_gas: Some(-100),
        },
        GasBlock {
            kind: GasBlockKind::Yield,
            begin_gas: 900,
            yield_gas: Some(880),
            used_gas: Some(20),
        },
    ]);

    assert_data_eq!(
        render(&report),
        "#0   gas   begin=1000 yield=1100 used=-100\n\
         #1   yield begin=900 yield=880 used=20\n\
         total used: -80\n"
    );
}

#[test]
fn writes_empty_report() {
    assert_data_eq!(render(&GasReport::default()), "total used: 0\n");
}
