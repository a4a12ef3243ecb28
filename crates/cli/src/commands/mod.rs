//! Subcommand implementations.

pub mod migrate;
pub mod table;
pub mod user;
