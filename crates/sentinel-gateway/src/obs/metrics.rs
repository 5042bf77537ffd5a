//! Minimal metrics registry for the sidecar.
//!
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in microseconds to avoid floating
//! point math.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Rows of a labelled map in label order, so scrapes diff cleanly.
fn sorted_rows<V, T>(map: &DashMap<LabelKey, V>, read: impl Fn(&V) -> T) -> Vec<(String, T)> {
    let mut rows: Vec<(LabelKey, T)> = map.iter().map(|e| (e.key().clone(), read(e.value()))).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.into_iter().map(|(k, v)| (render_labels(&k), v)).collect()
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for (labels, value) in sorted_rows(&self.map, |c| c.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{name}{{{labels}}} {value}");
        }
    }
}

// Upper bounds in microseconds: 10us .. 100ms.
const BUCKETS_MICROS: [u64; 9] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 100_000];

/// Per-bucket (non-cumulative) counts; the slot past the last bound holds
/// overflow. Cumulative values are produced at render time.
#[derive(Default)]
struct Histogram {
    slots: [AtomicU64; BUCKETS_MICROS.len() + 1],
    sum_micros: AtomicU64,
}

impl Histogram {
    fn record(&self, micros: u64) {
        let slot = BUCKETS_MICROS.partition_point(|&le| le < micros);
        self.slots[slot].fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn total(&self) -> u64 {
        self.slots.iter().map(|s| s.load(Ordering::Relaxed)).sum()
    }

    fn snapshot(&self) -> (Vec<u64>, u64) {
        let counts = self.slots.iter().map(|s| s.load(Ordering::Relaxed)).collect();
        (counts, self.sum_micros.load(Ordering::Relaxed))
    }
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, Histogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.map
            .entry(label_key(labels))
            .or_insert_with(Histogram::default)
            .record(micros);
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map.get(&label_key(labels)).map_or(0, |h| h.total())
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (labels, (counts, sum)) in sorted_rows(&self.map, Histogram::snapshot) {
            let sep = if labels.is_empty() { "" } else { "," };
            let mut running = 0u64;
            for (le, n) in BUCKETS_MICROS.iter().zip(&counts) {
                running += n;
                let _ = writeln!(out, "{name}_bucket{{{labels}{sep}le=\"{le}\"}} {running}");
            }
            let total: u64 = counts.iter().sum();
            let _ = writeln!(out, "{name}_bucket{{{labels}{sep}le=\"+Inf\"}} {total}");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {sum}");
            let _ = writeln!(out, "{name}_count{{{labels}}} {total}");
        }
    }
}

#[derive(Default)]
pub struct SentinelMetrics {
    /// Labels: outcome (allow|block), stage (rate_limit|budget|policy|granted).
    pub decisions: CounterVec,
    /// Labels: type (audit kind).
    pub audit_records: CounterVec,
    /// Labels: result (ok|error).
    pub snapshot_saves: CounterVec,
    pub evaluate_duration: HistogramVec,
    draining: AtomicBool,
}

impl SentinelMetrics {
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all registered metrics plus any extra gauge lines.
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.decisions.render("sentinel_decisions_total", &mut out);
        self.audit_records.render("sentinel_audit_records_total", &mut out);
        self.snapshot_saves.render("sentinel_snapshot_saves_total", &mut out);
        self.evaluate_duration
            .render("sentinel_evaluate_duration_micros", &mut out);

        let _ = writeln!(
            out,
            "# TYPE sentinel_draining gauge\nsentinel_draining {}",
            u8::from(self.is_draining())
        );
        for (k, v) in extra {
            let _ = writeln!(out, "{} {}", k, v);
        }
        out
    }
}
