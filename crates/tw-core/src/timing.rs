//! Acquisition of host timing data into marks.
//!
//! Two idempotent passes over a navigation-timing snapshot (the raw field
//! dump and the derived audit intervals) plus an optional pass over
//! resource/paint entries. Each pass runs at most once per log: a populated
//! target group turns the call into a no-op signaled by a `false` return.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::log::MarkLog;
use crate::mark::{GROUP_AUDITS, GROUP_PAINT, GROUP_PERFORMANCE, GROUP_RESOURCES, MarkOptions};

/// Raw navigation-timing snapshot.
///
/// Absent fields deserialize to the `0` sentinel. The field order below is
/// the emission order of the snapshot pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTiming {
    pub navigation_start: i64,
    pub unload_event_start: i64,
    pub unload_event_end: i64,
    pub redirect_start: i64,
    pub redirect_end: i64,
    pub fetch_start: i64,
    pub domain_lookup_start: i64,
    pub domain_lookup_end: i64,
    pub connect_start: i64,
    pub connect_end: i64,
    pub secure_connection_start: i64,
    pub request_start: i64,
    pub response_start: i64,
    pub response_end: i64,
    pub dom_loading: i64,
    pub dom_interactive: i64,
    pub dom_content_loaded_event_start: i64,
    pub dom_content_loaded_event_end: i64,
    pub dom_complete: i64,
    pub load_event_start: i64,
    pub load_event_end: i64,
}

impl NavigationTiming {
    /// The 21 snapshot fields in processing-model order.
    pub const fn fields(&self) -> [(&'static str, i64); 21] {
        [
            ("navigationStart", self.navigation_start),
            ("unloadEventStart", self.unload_event_start),
            ("unloadEventEnd", self.unload_event_end),
            ("redirectStart", self.redirect_start),
            ("redirectEnd", self.redirect_end),
            ("fetchStart", self.fetch_start),
            ("domainLookupStart", self.domain_lookup_start),
            ("domainLookupEnd", self.domain_lookup_end),
            ("connectStart", self.connect_start),
            ("connectEnd", self.connect_end),
            ("secureConnectionStart", self.secure_connection_start),
            ("requestStart", self.request_start),
            ("responseStart", self.response_start),
            ("responseEnd", self.response_end),
            ("domLoading", self.dom_loading),
            ("domInteractive", self.dom_interactive),
            ("domContentLoadedEventStart", self.dom_content_loaded_event_start),
            ("domContentLoadedEventEnd", self.dom_content_loaded_event_end),
            ("domComplete", self.dom_complete),
            ("loadEventStart", self.load_event_start),
            ("loadEventEnd", self.load_event_end),
        ]
    }
}

/// One resource or paint timing entry.
///
/// Resource-specific fields default to `0` for other entry kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingEntry {
    /// Entry kind: `"resource"`, `"paint"`, or anything else (ignored).
    pub entry_type: String,
    /// Resource URL, or the paint event name.
    pub name: String,
    pub start_time: i64,
    pub domain_lookup_start: i64,
    pub domain_lookup_end: i64,
    pub request_start: i64,
    pub response_start: i64,
    pub response_end: i64,
    pub transfer_size: i64,
    pub encoded_body_size: i64,
    pub decoded_body_size: i64,
}

/// Copies the raw snapshot into the `performance` group, one mark per field.
///
/// Returns `false` without touching the log when the group is already
/// populated.
pub fn run_performance(log: &mut MarkLog, timing: &NavigationTiming) -> bool {
    if log.has_group(GROUP_PERFORMANCE) {
        tracing::debug!("performance group already populated, skipping");
        return false;
    }
    for (name, time) in timing.fields() {
        log.mark(name, MarkOptions::in_group(GROUP_PERFORMANCE).at(time));
    }
    true
}

/// Derives the fixed audit intervals into the `audits` group.
///
/// Each mark's time is the interval's endpoint and its duration the computed
/// interval. The secure-connection interval is omitted entirely when the
/// snapshot reports no secure connection; other intervals are emitted even
/// when their natural value is zero or negative. Returns `false` when the
/// group is already populated.
pub fn run_audits(log: &mut MarkLog, timing: &NavigationTiming) -> bool {
    if log.has_group(GROUP_AUDITS) {
        tracing::debug!("audits group already populated, skipping");
        return false;
    }

    let audit = |log: &mut MarkLog, name: &str, time: i64, duration: i64| {
        log.mark(name, MarkOptions::in_group(GROUP_AUDITS).at(time).lasting(duration));
    };

    audit(
        log,
        "unload",
        timing.unload_event_end,
        timing.unload_event_end - timing.unload_event_start,
    );
    audit(
        log,
        "redirect",
        timing.redirect_end,
        timing.redirect_end - timing.redirect_start,
    );
    audit(
        log,
        "appCache",
        timing.domain_lookup_start,
        timing.domain_lookup_start - timing.fetch_start,
    );
    audit(
        log,
        "DNS",
        timing.domain_lookup_end,
        timing.domain_lookup_end - timing.domain_lookup_start,
    );
    audit(
        log,
        "connect",
        timing.connect_end,
        timing.connect_end - timing.connect_start,
    );
    if timing.secure_connection_start > 0 {
        audit(
            log,
            "SSL",
            timing.connect_end,
            timing.connect_end - timing.secure_connection_start,
        );
    }
    audit(
        log,
        "TTFB",
        timing.response_start,
        timing.response_start - timing.request_start,
    );
    audit(
        log,
        "transmission",
        timing.response_end,
        timing.response_end - timing.request_start,
    );
    audit(
        log,
        "DOMParse",
        timing.dom_interactive,
        timing.dom_interactive - timing.dom_loading,
    );
    audit(
        log,
        "DOMContentLoaded",
        timing.dom_content_loaded_event_start,
        timing.dom_content_loaded_event_start - timing.dom_loading,
    );
    audit(
        log,
        "DOMContentLoadedEvent",
        timing.dom_content_loaded_event_end,
        timing.dom_content_loaded_event_end - timing.dom_content_loaded_event_start,
    );
    audit(
        log,
        "DOMComplete",
        timing.dom_complete,
        timing.dom_complete - timing.dom_loading,
    );
    audit(
        log,
        "loadEvent",
        timing.load_event_end,
        timing.load_event_end - timing.load_event_start,
    );
    audit(
        log,
        "total",
        timing.load_event_end,
        timing.load_event_end - timing.navigation_start,
    );
    true
}

/// Paint event names worth a short mark.
const PAINT_MARKS: &[(&str, &str)] = &[
    ("first-paint", "FP"),
    ("first-contentful-paint", "FCP"),
];

/// Running per-domain maxima across resource entries.
#[derive(Debug, Default)]
struct DomainMax {
    dns: i64,
    dns_time: i64,
    exchange: i64,
    exchange_time: i64,
    url: String,
    size: i64,
    compressed: bool,
}

/// Distills paint milestones and per-domain resource maxima into marks.
///
/// Paint entries with a known name become short marks in the `paint` group.
/// Resource entries aggregate per domain: a monotonic running max of the
/// DNS-lookup duration and of the request-to-response exchange duration, at
/// most two marks per domain in the `resources` group, each emitted only when
/// its maximum is positive. The exchange mark carries url/size/compression
/// context from the slowest entry. Returns `false` when either target group
/// is already populated.
pub fn run_resources(log: &mut MarkLog, entries: &[TimingEntry]) -> bool {
    if log.has_group(GROUP_RESOURCES) || log.has_group(GROUP_PAINT) {
        tracing::debug!("resource groups already populated, skipping");
        return false;
    }

    let mut domains: BTreeMap<String, DomainMax> = BTreeMap::new();
    for entry in entries {
        match entry.entry_type.as_str() {
            "paint" => {
                if let Some((_, short)) = PAINT_MARKS.iter().find(|(name, _)| *name == entry.name) {
                    log.mark(short, MarkOptions::in_group(GROUP_PAINT).at(entry.start_time));
                }
            }
            "resource" => {
                let max = domains.entry(domain_of(&entry.name)).or_default();
                let dns = entry.domain_lookup_end - entry.domain_lookup_start;
                if dns > max.dns {
                    max.dns = dns;
                    max.dns_time = entry.domain_lookup_end;
                }
                let exchange = entry.response_end - entry.request_start;
                if exchange > max.exchange {
                    max.exchange = exchange;
                    max.exchange_time = entry.response_end;
                    max.url = entry.name.clone();
                    max.size = entry.transfer_size;
                    max.compressed = entry.encoded_body_size > 0
                        && entry.encoded_body_size != entry.decoded_body_size;
                }
            }
            _ => {}
        }
    }

    for (domain, max) in &domains {
        if max.dns > 0 {
            log.mark(
                &format!("dns:{domain}"),
                MarkOptions::in_group(GROUP_RESOURCES)
                    .at(max.dns_time)
                    .lasting(max.dns),
            );
        }
        if max.exchange > 0 {
            log.mark(
                &format!("load:{domain}"),
                MarkOptions::in_group(GROUP_RESOURCES)
                    .at(max.exchange_time)
                    .lasting(max.exchange)
                    .with_context(json!({
                        "url": max.url,
                        "size": max.size,
                        "compressed": max.compressed,
                    })),
            );
        }
    }
    true
}

/// Host part of a URL, without scheme, port, path, or query.
fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.trim_start_matches('/');
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    host.split(':').next().unwrap_or(host).to_string()
}
