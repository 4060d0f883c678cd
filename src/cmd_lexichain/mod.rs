//! Subcommand modules for the `lexichain` binary.

pub mod chain;
pub mod compare;
