//! Marks: named, timestamped, durationed events.

use serde::{Deserialize, Serialize};

/// Group that marks land in when the caller names none.
pub const GROUP_DEFAULT: &str = "default";
/// Group receiving the raw navigation-timing snapshot.
pub const GROUP_PERFORMANCE: &str = "performance";
/// Group receiving derived audit intervals.
pub const GROUP_AUDITS: &str = "audits";
/// Group receiving per-domain resource maxima.
pub const GROUP_RESOURCES: &str = "resources";
/// Group receiving paint milestones.
pub const GROUP_PAINT: &str = "paint";

/// A single timing event.
///
/// `time` is wall-clock milliseconds; `0` is a sentinel meaning the source
/// had no value. `duration` is either supplied by the caller or the distance
/// to the previous mark in the same group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    /// Event name. May be empty; not required to be unique.
    pub name: String,
    /// The series this mark belongs to.
    pub group: String,
    /// When the event occurred, in milliseconds. `0` = unavailable.
    pub time: i64,
    /// Interval in milliseconds; `0` when either endpoint is unavailable.
    pub duration: i64,
    /// Free-form annotation, never interpreted by the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Delivery state. Flips `false -> true` once, never back.
    #[serde(default)]
    pub reported: bool,
}

/// Optional fields accepted by [`MarkLog::mark`](crate::MarkLog::mark).
///
/// Anything left unset degrades to a default; a mark call never fails.
#[derive(Debug, Clone, Default)]
pub struct MarkOptions {
    pub group: Option<String>,
    pub time: Option<i64>,
    pub duration: Option<i64>,
    pub context: Option<serde_json::Value>,
}

impl MarkOptions {
    /// Options targeting the given group.
    pub fn in_group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            ..Self::default()
        }
    }

    /// Sets an explicit time. `0` is passed through verbatim.
    #[must_use]
    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets an explicit duration, suppressing the implicit computation.
    #[must_use]
    pub fn lasting(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attaches a context annotation.
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// A mark supplied before the log was initialized.
///
/// Missing fields are back-filled on load: group falls back to the default
/// group, name to the empty string, time to the `0` sentinel, and duration
/// to the implicit computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedMark {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}
