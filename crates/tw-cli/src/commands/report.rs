//! Report command: deliver the derived timeline to a collector.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;

use tw_core::MarkLog;
use tw_report::{
    ReportOptions, Reporter, SharedLog, TimingData, TimingSource, Transport, TransportOptions,
    default_handler, timing,
};

use crate::Config;
use crate::commands::util;

pub async fn run(
    snapshot_path: &Path,
    url: Option<&str>,
    immediate: bool,
    config: &Config,
) -> Result<()> {
    let destination = url
        .or(config.endpoint.as_deref())
        .context("no collector URL: pass --url or set `endpoint` in the config")?;

    let snapshot = util::load_snapshot(snapshot_path)?;
    let log: SharedLog = Arc::new(Mutex::new(MarkLog::new()));
    let source = TimingSource::Ready(TimingData {
        timing: snapshot.timing,
        entries: snapshot.entries,
    });
    let groups = timing(&log, source, config.enable_performance).await;
    tracing::debug!(groups = groups.len(), "acquisition resolved");

    let transport = Transport::new(TransportOptions {
        enable_fire_and_forget: config.enable_fire_and_forget,
        enable_streaming: config.enable_streaming,
    })?;

    let unload = Arc::new(Notify::new());
    let reporter = Reporter::new(log.clone(), Arc::new(transport))
        .with_interval(Duration::from_millis(config.polling_interval_ms))
        .with_unload_signal(unload.clone());

    // Ctrl-C is the closest thing a process has to an unload signal.
    tokio::spawn({
        let unload = unload.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                unload.notify_one();
            }
        }
    });

    reporter
        .report_with(
            destination,
            default_handler(),
            ReportOptions {
                immediate,
                ..ReportOptions::default()
            },
        )
        .await;

    if !immediate {
        // One-shot run: give the debounce window time to elapse and flush.
        tokio::time::sleep(Duration::from_millis(config.polling_interval_ms) + Duration::from_millis(50))
            .await;
    }

    let sent = log
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .marks()
        .iter()
        .filter(|m| m.reported)
        .count();
    reporter.stop_report();
    println!("reported {sent} marks to {destination}");
    Ok(())
}
