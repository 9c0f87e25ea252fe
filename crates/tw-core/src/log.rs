//! Append-only mark log partitioned into named groups.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::mark::{GROUP_DEFAULT, Mark, MarkOptions, SeedMark};

/// Per-group bookkeeping: positions into the global log plus the counter
/// backing auto-named sequence marks.
#[derive(Debug, Clone)]
struct GroupState {
    indices: Vec<usize>,
    tick: i64,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            tick: -1,
        }
    }
}

/// The in-memory event log.
///
/// Marks are stored once in a flat sequence; groups index into it. Within a
/// group, insertion order is the only ordering relation; explicit times may
/// arrive out of order and are kept as given. Groups are created lazily on
/// first mark and removed only by [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct MarkLog {
    marks: Vec<Mark>,
    groups: BTreeMap<String, GroupState>,
}

impl MarkLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log pre-seeded from entries supplied before initialization.
    ///
    /// Entries load in the given order. Absent fields are back-filled: the
    /// default group, an empty name, the `0` time sentinel (the load time is
    /// never substituted), and the implicit duration rule.
    pub fn with_seed<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = SeedMark>,
    {
        let mut log = Self::new();
        for entry in seed {
            let options = MarkOptions {
                group: entry.group,
                time: Some(entry.time.unwrap_or(0)),
                duration: entry.duration,
                context: entry.context,
            };
            log.mark(&entry.name.unwrap_or_default(), options);
        }
        log
    }

    /// Appends a mark. Never fails; unset options degrade to defaults.
    ///
    /// Without an explicit duration, the mark's duration is the distance to
    /// the previous mark in the same group, or `0` when either endpoint
    /// carries the `0` sentinel or the group was empty.
    pub fn mark(&mut self, name: &str, options: MarkOptions) {
        let group = options.group.unwrap_or_else(|| GROUP_DEFAULT.to_string());
        let time = options.time.unwrap_or_else(now_ms);

        let state = self.groups.entry(group.clone()).or_default();
        let previous_time = state.indices.last().map_or(0, |&i| self.marks[i].time);
        let duration = match options.duration {
            Some(duration) => duration,
            None if time > 0 && previous_time > 0 => time - previous_time,
            None => 0,
        };

        state.indices.push(self.marks.len());
        self.marks.push(Mark {
            name: name.to_string(),
            group,
            time,
            duration,
            context: options.context,
            reported: false,
        });
    }

    /// Marks `"start"` in the given group.
    pub fn start(&mut self, group: &str) {
        self.mark("start", MarkOptions::in_group(group));
    }

    /// Marks `"stop"` in the given group.
    pub fn stop(&mut self, group: &str) {
        self.mark("stop", MarkOptions::in_group(group));
    }

    /// Appends an auto-named sequence mark: `tick0`, `tick1`, ...
    ///
    /// The counter is per group, starts below zero, and resets only on
    /// [`clear`](Self::clear).
    pub fn tick(&mut self, group: &str) {
        let state = self.groups.entry(group.to_string()).or_default();
        state.tick += 1;
        let name = format!("tick{}", state.tick);
        self.mark(&name, MarkOptions::in_group(group));
    }

    /// The group's marks in insertion order; empty for an unknown group.
    pub fn group(&self, name: &str) -> Vec<&Mark> {
        self.groups
            .get(name)
            .map(|state| state.indices.iter().map(|&i| &self.marks[i]).collect())
            .unwrap_or_default()
    }

    /// Whether the group exists and holds at least one mark.
    pub fn has_group(&self, name: &str) -> bool {
        self.groups
            .get(name)
            .is_some_and(|state| !state.indices.is_empty())
    }

    /// All groups in name order, each with its marks in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, Vec<&Mark>)> {
        self.groups.iter().map(|(name, state)| {
            let marks: Vec<&Mark> = state.indices.iter().map(|&i| &self.marks[i]).collect();
            (name.as_str(), marks)
        })
    }

    /// The flat log in append order.
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Positions of every mark not yet handed to the transport, in append
    /// order. Recomputed from the full log on each call.
    pub fn unreported(&self) -> Vec<usize> {
        self.marks
            .iter()
            .enumerate()
            .filter(|(_, mark)| !mark.reported)
            .map(|(i, _)| i)
            .collect()
    }

    /// Flags the given positions as delivered. Idempotent; the flag never
    /// reverts. Out-of-range positions are ignored.
    pub fn set_reported(&mut self, indices: &[usize]) {
        for &i in indices {
            if let Some(mark) = self.marks.get_mut(i) {
                mark.reported = true;
            }
        }
    }

    /// Empties the log, drops all groups, and resets every tick counter.
    pub fn clear(&mut self) {
        self.marks.clear();
        self.groups.clear();
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::GROUP_DEFAULT;

    #[test]
    fn marks_preserve_insertion_order_per_group() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g").at(10));
        log.mark("b", MarkOptions::in_group("h").at(20));
        log.mark("c", MarkOptions::in_group("g").at(30));

        let names: Vec<&str> = log.group("g").iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);

        let flat: Vec<&str> = log.marks().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(flat, ["a", "b", "c"]);
    }

    #[test]
    fn implicit_duration_chains_within_group() {
        let mut log = MarkLog::new();
        log.mark("start", MarkOptions::in_group("g").at(1000));
        log.mark("x", MarkOptions::in_group("g").at(1500));

        let marks = log.group("g");
        assert_eq!(marks[0].duration, 0);
        assert_eq!(marks[1].duration, 500);
    }

    #[test]
    fn explicit_duration_wins_over_computation() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g").at(100));
        log.mark("b", MarkOptions::in_group("g").at(700).lasting(42));
        assert_eq!(log.group("g")[1].duration, 42);
    }

    #[test]
    fn zero_sentinel_suppresses_duration() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g").at(0));
        log.mark("b", MarkOptions::in_group("g").at(500));
        // Previous time unavailable: no interval.
        assert_eq!(log.group("g")[1].duration, 0);

        log.mark("c", MarkOptions::in_group("g").at(0));
        // Own time unavailable: no interval either.
        assert_eq!(log.group("g")[2].duration, 0);
    }

    #[test]
    fn out_of_order_times_are_kept_verbatim() {
        let mut log = MarkLog::new();
        log.mark("late", MarkOptions::in_group("g").at(2000));
        log.mark("early", MarkOptions::in_group("g").at(1500));
        // Insertion order rules: the "later" mark gets a negative interval.
        assert_eq!(log.group("g")[1].duration, -500);
    }

    #[test]
    fn unnamed_mark_lands_in_default_group_with_current_time() {
        let mut log = MarkLog::new();
        log.mark("", MarkOptions::default());
        let marks = log.group(GROUP_DEFAULT);
        assert_eq!(marks.len(), 1);
        assert!(marks[0].name.is_empty());
        assert!(marks[0].time > 0);
    }

    #[test]
    fn start_stop_are_ordinary_marks() {
        let mut log = MarkLog::new();
        log.start("g");
        log.stop("g");
        let names: Vec<&str> = log.group("g").iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["start", "stop"]);
    }

    #[test]
    fn tick_names_follow_the_counter() {
        let mut log = MarkLog::new();
        for _ in 0..3 {
            log.tick("g");
        }
        let names: Vec<&str> = log.group("g").iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["tick0", "tick1", "tick2"]);
    }

    #[test]
    fn tick_counter_resets_only_on_clear() {
        let mut log = MarkLog::new();
        log.tick("g");
        log.tick("g");
        log.mark("other", MarkOptions::in_group("g"));
        log.tick("g");
        assert_eq!(log.group("g").last().unwrap().name, "tick2");

        log.clear();
        log.tick("g");
        assert_eq!(log.group("g")[0].name, "tick0");
    }

    #[test]
    fn unreported_recomputes_from_full_log() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g").at(1));
        log.mark("b", MarkOptions::in_group("g").at(2));

        let first = log.unreported();
        assert_eq!(first, [0, 1]);
        log.set_reported(&first);
        assert!(log.unreported().is_empty());

        log.mark("c", MarkOptions::in_group("g").at(3));
        assert_eq!(log.unreported(), [2]);
    }

    #[test]
    fn set_reported_is_idempotent_and_ignores_bad_indices() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g").at(1));
        log.set_reported(&[0, 0, 99]);
        assert!(log.marks()[0].reported);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn clear_resets_groups_and_log() {
        let mut log = MarkLog::new();
        log.mark("a", MarkOptions::in_group("g"));
        log.clear();
        assert!(log.is_empty());
        assert!(!log.has_group("g"));
        assert!(log.group("g").is_empty());
    }

    #[test]
    fn seeded_entries_back_fill_missing_fields() {
        let log = MarkLog::with_seed(vec![
            SeedMark {
                name: Some("boot".to_string()),
                time: Some(100),
                ..SeedMark::default()
            },
            SeedMark {
                time: Some(250),
                ..SeedMark::default()
            },
            SeedMark::default(),
        ]);

        let marks = log.group(GROUP_DEFAULT);
        assert_eq!(marks.len(), 3);
        assert_eq!(marks[0].name, "boot");
        // Implicit duration applies across seeded entries too.
        assert_eq!(marks[1].duration, 150);
        // No time supplied: sentinel, not the load time.
        assert_eq!(marks[2].time, 0);
        assert_eq!(marks[2].duration, 0);
    }

    #[test]
    fn groups_iterates_in_name_order() {
        let mut log = MarkLog::new();
        log.mark("x", MarkOptions::in_group("zeta"));
        log.mark("y", MarkOptions::in_group("alpha"));
        let names: Vec<&str> = log.groups().map(|(name, _)| name).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }
}
