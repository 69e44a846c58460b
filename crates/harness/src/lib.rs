//! Harness: glue between persistence, the simulation/evaluation engines,
//! and the event pipeline.
//!
//! The services here load configuration records, drive the engines, commit
//! results to the JSONL-backed stores, and emit pipeline events. The three
//! concrete consumers route those events to the next stage until a run is
//! marked completed.

pub mod cli;
pub mod consumers;
pub mod evaluation;
pub mod simulation;
pub mod state;
pub mod stores;
