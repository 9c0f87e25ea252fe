//! Show command: render the grouped timeline from a snapshot.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use tw_core::{Mark, MarkLog, run_audits, run_performance, run_resources};

use crate::Config;
use crate::commands::util;

pub fn run(snapshot_path: &Path, json: bool, config: &Config) -> Result<()> {
    let snapshot = util::load_snapshot(snapshot_path)?;

    let mut log = MarkLog::new();
    if config.enable_performance {
        run_performance(&mut log, &snapshot.timing);
        run_audits(&mut log, &snapshot.timing);
        run_resources(&mut log, &snapshot.entries);
    }

    if json {
        let groups: BTreeMap<&str, Vec<&Mark>> = log.groups().collect();
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        print!("{}", render_table(&log));
    }
    Ok(())
}

/// Renders one aligned name/time/duration block per group.
pub fn render_table(log: &MarkLog) -> String {
    let mut out = String::new();
    for (group, marks) in log.groups() {
        let width = marks
            .iter()
            .map(|m| m.name.len())
            .max()
            .unwrap_or(0)
            .max("name".len());

        let _ = writeln!(out, "[{group}]");
        let _ = writeln!(out, "{:<width$}  {:>10}  {:>10}", "name", "time", "duration");
        for mark in marks {
            let _ = writeln!(
                out,
                "{:<width$}  {:>10}  {:>10}",
                mark.name, mark.time, mark.duration
            );
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use tw_core::{MarkOptions, NavigationTiming};

    use super::*;

    #[test]
    fn table_lists_each_group_once() {
        let mut log = MarkLog::new();
        let timing = NavigationTiming {
            navigation_start: 100,
            domain_lookup_start: 150,
            domain_lookup_end: 180,
            ..NavigationTiming::default()
        };
        run_performance(&mut log, &timing);
        run_audits(&mut log, &timing);

        let table = render_table(&log);
        assert!(table.contains("[performance]"));
        assert!(table.contains("[audits]"));
        assert!(table.contains("navigationStart"));
        assert!(table.contains("DNS"));
        assert_eq!(table.matches("[audits]").count(), 1);
    }

    #[test]
    fn table_rows_follow_insertion_order() {
        let mut log = MarkLog::new();
        log.mark("first", MarkOptions::in_group("g").at(10));
        log.mark("second", MarkOptions::in_group("g").at(20));

        let table = render_table(&log);
        let first = table.find("first").unwrap();
        let second = table.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_log_renders_nothing() {
        assert!(render_table(&MarkLog::new()).is_empty());
    }
}
