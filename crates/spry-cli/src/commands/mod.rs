//! Command implementations.
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod start;

pub use start::execute as start_execute;
