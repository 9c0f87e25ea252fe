//! One-shot readiness gate in front of the acquisition passes.
//!
//! Hosts that already have timing data hand it over directly; hosts that are
//! still loading fire a one-shot signal later. Either way the passes run at
//! most once and the caller resolves with the grouped view.

use std::collections::BTreeMap;

use tokio::sync::oneshot;

use tw_core::{Mark, NavigationTiming, TimingEntry, run_audits, run_performance, run_resources};

use crate::lock;
use crate::reporter::SharedLog;

/// Everything the host hands over once timing data is ready.
#[derive(Debug, Clone, Default)]
pub struct TimingData {
    pub timing: NavigationTiming,
    pub entries: Vec<TimingEntry>,
}

/// Where acquisition data stands when [`timing`] is called.
pub enum TimingSource {
    /// Data is available now; the passes run before `timing` resolves.
    Ready(TimingData),
    /// Data arrives later through the sender half of [`ready_signal`].
    Deferred(oneshot::Receiver<TimingData>),
    /// The host has no timing facility; nothing to acquire.
    Unavailable,
}

/// Creates the deferred source plus the handle the host fires on readiness.
/// The signal fires at most once.
pub fn ready_signal() -> (oneshot::Sender<TimingData>, TimingSource) {
    let (tx, rx) = oneshot::channel();
    (tx, TimingSource::Deferred(rx))
}

/// Runs the acquisition passes once data is ready, then resolves with the
/// grouped view of the whole log.
///
/// With `enable_performance` off, or an unavailable source, the passes are
/// skipped and the call resolves immediately. A dropped readiness sender
/// resolves with whatever the log already holds.
pub async fn timing(
    log: &SharedLog,
    source: TimingSource,
    enable_performance: bool,
) -> BTreeMap<String, Vec<Mark>> {
    if enable_performance {
        match source {
            TimingSource::Ready(data) => acquire(log, &data),
            TimingSource::Deferred(rx) => {
                if let Ok(data) = rx.await {
                    acquire(log, &data);
                } else {
                    tracing::debug!("readiness signal dropped without firing");
                }
            }
            TimingSource::Unavailable => {}
        }
    }

    let log = lock(log);
    log.groups()
        .map(|(name, marks)| (name.to_string(), marks.into_iter().cloned().collect()))
        .collect()
}

fn acquire(log: &SharedLog, data: &TimingData) {
    let mut log = lock(log);
    let snapshot = run_performance(&mut log, &data.timing);
    let audited = run_audits(&mut log, &data.timing);
    let resources = run_resources(&mut log, &data.entries);
    tracing::debug!(snapshot, audited, resources, "acquisition passes finished");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tw_core::{GROUP_AUDITS, GROUP_PERFORMANCE, MarkLog, MarkOptions};

    use super::*;

    fn shared() -> SharedLog {
        Arc::new(Mutex::new(MarkLog::new()))
    }

    fn snapshot() -> TimingData {
        TimingData {
            timing: NavigationTiming {
                navigation_start: 100,
                domain_lookup_start: 150,
                domain_lookup_end: 180,
                ..NavigationTiming::default()
            },
            entries: Vec::new(),
        }
    }

    #[tokio::test]
    async fn ready_source_resolves_synchronously() {
        let log = shared();
        let groups = timing(&log, TimingSource::Ready(snapshot()), true).await;

        assert_eq!(groups[GROUP_PERFORMANCE].len(), 21);
        let dns = groups[GROUP_AUDITS].iter().find(|m| m.name == "DNS").unwrap();
        assert_eq!(dns.time, 180);
        assert_eq!(dns.duration, 30);
    }

    #[tokio::test]
    async fn deferred_source_waits_for_the_signal() {
        let log = shared();
        let (tx, source) = ready_signal();

        let waiter = {
            let log = log.clone();
            tokio::spawn(async move { timing(&log, source, true).await })
        };

        tx.send(snapshot()).unwrap();
        let groups = waiter.await.unwrap();
        assert!(groups.contains_key(GROUP_PERFORMANCE));
    }

    #[tokio::test]
    async fn disabled_acquisition_resolves_without_passes() {
        let log = shared();
        lock(&log).mark("manual", MarkOptions::default());

        let groups = timing(&log, TimingSource::Ready(snapshot()), false).await;
        assert!(!groups.contains_key(GROUP_PERFORMANCE));
        assert_eq!(groups["default"].len(), 1);
    }

    #[tokio::test]
    async fn unavailable_source_degrades_to_the_existing_log() {
        let log = shared();
        let groups = timing(&log, TimingSource::Unavailable, true).await;
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn second_acquisition_is_a_no_op() {
        let log = shared();
        timing(&log, TimingSource::Ready(snapshot()), true).await;
        let groups = timing(&log, TimingSource::Ready(snapshot()), true).await;
        assert_eq!(groups[GROUP_PERFORMANCE].len(), 21);
    }

    #[tokio::test]
    async fn dropped_sender_still_resolves() {
        let log = shared();
        let (tx, source) = ready_signal();
        drop(tx);
        let groups = timing(&log, source, true).await;
        assert!(groups.is_empty());
    }
}
