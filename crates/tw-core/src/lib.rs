//! Core mark log for timewell.
//!
//! This crate contains the fundamental types and logic for:
//! - The mark log: an append-only event sequence partitioned into groups,
//!   with implicit duration chaining
//! - Acquisition passes: distilling a navigation-timing snapshot and
//!   resource entries into marks
//!
//! Everything here is synchronous and infallible by design: malformed input
//! degrades to defaults, and duplicate acquisition passes are no-ops.

pub mod log;
pub mod mark;
pub mod timing;

pub use log::MarkLog;
pub use mark::{
    GROUP_AUDITS, GROUP_DEFAULT, GROUP_PAINT, GROUP_PERFORMANCE, GROUP_RESOURCES, Mark,
    MarkOptions, SeedMark,
};
pub use timing::{NavigationTiming, TimingEntry, run_audits, run_performance, run_resources};
