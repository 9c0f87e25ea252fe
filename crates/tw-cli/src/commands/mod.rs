//! Subcommand implementations.

pub mod report;
pub mod show;
pub mod util;
