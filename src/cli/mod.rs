//! Command-line interface for the `hoops` binary

pub mod commands;
pub mod error;
