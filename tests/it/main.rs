#![allow(missing_docs)]
pub mod utils;

mod orchestrator;
mod writer;
