//! Statistics tracking for the feed watcher.
//!
//! Counts polling cycles, upstream requests and announcements, and keeps an
//! HDR histogram of request latency.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::watcher::EntityKind;

/// Thread-safe statistics collector.
#[derive(Debug)]
pub struct WatchStats {
    /// Completed fetch-and-diff cycles
    pub polls: AtomicU64,

    /// Cycles whose snapshot fetch failed
    pub poll_failures: AtomicU64,

    /// Upstream HTTP requests that succeeded
    pub requests: AtomicU64,

    /// Upstream HTTP requests that failed
    pub request_failures: AtomicU64,

    /// METARs run through the decoder
    pub metars_decoded: AtomicU64,

    /// Announcements emitted by the watch loop
    pub announcements: AtomicU64,

    /// Entities currently remembered by the watch loop
    pub known_entities: AtomicU64,

    /// Histogram of request latency in milliseconds
    latency_histogram: RwLock<Histogram<u64>>,

    /// Announcements per entity kind
    announcements_by_kind: RwLock<HashMap<EntityKind, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl WatchStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            request_failures: AtomicU64::new(0),
            metars_decoded: AtomicU64::new(0),
            announcements: AtomicU64::new(0),
            known_entities: AtomicU64::new(0),
            // 1 ms to 2 minutes, 3 significant figures
            latency_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 120_000, 3)
                    .expect("Failed to create latency histogram"),
            ),
            announcements_by_kind: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful upstream request and its latency.
    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let millis = (latency.as_millis() as u64).clamp(1, 120_000);
        if let Ok(mut hist) = self.latency_histogram.write() {
            let _ = hist.record(millis);
        }
    }

    /// Record a failed upstream request.
    pub fn record_request_failure(&self) {
        self.request_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed watch cycle.
    pub fn record_poll(&self, known_entities: usize) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.known_entities
            .store(known_entities as u64, Ordering::Relaxed);
    }

    /// Record a watch cycle whose fetch failed.
    pub fn record_poll_failure(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an announcement for a newly seen entity.
    pub fn record_announcement(&self, kind: EntityKind) {
        self.announcements.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.announcements_by_kind.write() {
            *map.entry(kind).or_insert(0) += 1;
        }
    }

    /// Record a decoded METAR.
    pub fn record_metar(&self) {
        self.metars_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let latency_percentiles = self
            .latency_histogram
            .read()
            .ok()
            .filter(|h| h.len() > 0)
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        let announcements_by_kind = self
            .announcements_by_kind
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        StatsSummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
            metars_decoded: self.metars_decoded.load(Ordering::Relaxed),
            announcements: self.announcements.load(Ordering::Relaxed),
            known_entities: self.known_entities.load(Ordering::Relaxed),
            latency_percentiles,
            announcements_by_kind,
        }
    }
}

impl Default for WatchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub polls: u64,
    pub poll_failures: u64,
    pub requests: u64,
    pub request_failures: u64,
    pub metars_decoded: u64,
    pub announcements: u64,
    pub known_entities: u64,
    pub latency_percentiles: Option<HistogramPercentiles>,
    pub announcements_by_kind: HashMap<String, u64>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                 VATSIM WATCH STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(
            f,
            "Polls: {} ({} failed)",
            self.polls + self.poll_failures,
            self.poll_failures
        )?;
        writeln!(
            f,
            "Requests: {} ({} failed)",
            self.requests + self.request_failures,
            self.request_failures
        )?;
        writeln!(f, "METARs decoded: {}", self.metars_decoded)?;
        writeln!(f, "Known entities: {}", self.known_entities)?;
        writeln!(f, "Announcements: {}", self.announcements)?;
        writeln!(f)?;

        if let Some(ref p) = self.latency_percentiles {
            writeln!(f, "Request Latency (ms):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if !self.announcements_by_kind.is_empty() {
            writeln!(f, "Announcements by Kind:")?;
            let mut kinds: Vec<_> = self.announcements_by_kind.iter().collect();
            kinds.sort_by(|a, b| b.1.cmp(a.1));
            for (kind, count) in kinds {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}
