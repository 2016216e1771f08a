//! Result/fault state machine and run aggregation.
//!
//! Core modules hold no I/O. They operate on in-memory records and are fully
//! testable in isolation; the [`engine`](crate::engine) drives them.

pub mod context;
pub mod descriptor;
pub mod errors;
pub mod fault;
pub mod result;
pub mod run;
pub mod types;
