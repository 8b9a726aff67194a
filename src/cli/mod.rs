//! CLI command handlers

pub mod commands;

pub use commands::{audit, export, recalc};
