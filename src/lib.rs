//! revm [Inspector](revm::Inspector) that splits the gas of a transaction into checkpoint
//! delimited blocks
//!
//! ## Feature Flags
//!
//! - `serde`: Implements `Serialize` and `Deserialize` for the gas report types and enables
//!   [`GasReport::to_json`].
//! - `cli`: Builds the `gas-checkpoints` demo binary.

#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

extern crate alloc;

/// Checkpoint detection.
pub mod checkpoint;
pub use checkpoint::{is_checkpoint, CheckpointConfig};

/// Static instruction fees.
pub mod fee;

mod inspector;
pub use inspector::GasCheckpointInspector;

/// Builds and submits transactions against revm.
pub mod orchestrator;
pub use orchestrator::{Orchestrator, OrchestratorConfig, TxError, TxOptions};

/// Gas reports and their text rendering.
pub mod report;
pub use report::{GasReport, ReportWriter};

mod session;
pub use session::{
    GasBlock, GasBlockKind, GasCheckpointSession, InstructionEvent, SessionState, TraceError,
};

pub use colorchoice::ColorChoice;
