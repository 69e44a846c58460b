//! Shared domain types for the Colloquy evaluation platform.
//!
//! Every other crate in the workspace depends on these types and on the
//! shared [`error::Error`] enum. Nothing here performs I/O.

pub mod config;
pub mod environment;
pub mod error;
pub mod eval;
pub mod persona;
pub mod rubric;
pub mod run;
pub mod scenario;
pub mod tool;
pub mod turn;
