//! Side-effecting helpers kept out of the core.

pub mod config;
