use crate::gc::pause::GcStatistics;
use crate::jvm::types::{GcCollector, MetricSnapshot};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub suggestion: Option<String>,
}

impl Recommendation {
    fn new(severity: Severity, title: &str, description: String, suggestion: Option<&str>) -> Self {
        Self {
            severity,
            title: title.to_string(),
            description,
            suggestion: suggestion.map(str::to_string),
        }
    }
}

/// Trigger points of every advisor rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorThresholds {
    /// Below this many pauses the pause rules stay silent.
    pub min_pause_events: u64,
    pub avg_pause_warn_ms: u64,
    /// p99 above `variance_factor * avg` counts as high variance.
    pub variance_factor: f64,
    pub p99_warn_ms: u64,
    pub p99_critical_ms: u64,
    /// Pause rate is only judged above this many pauses.
    pub frequent_min_pauses: u64,
    pub frequent_pauses_per_second: f64,
    /// Share of the pause window spent paused.
    pub overhead_warn_fraction: f64,
    pub overhead_critical_fraction: f64,
    pub heap_warn_percent: f64,
    pub heap_critical_percent: f64,
    /// Consecutive newest snapshots that must all exceed the heap limit.
    pub sustain_samples: usize,
    pub heap_low_percent: f64,
    /// Longest pause under the Parallel collector worth suggesting G1 for.
    pub parallel_long_pause_ms: u64,
}

impl Default for AdvisorThresholds {
    fn default() -> Self {
        Self {
            min_pause_events: 10,
            avg_pause_warn_ms: 200,
            variance_factor: 3.0,
            p99_warn_ms: 500,
            p99_critical_ms: 1000,
            frequent_min_pauses: 100,
            frequent_pauses_per_second: 10.0,
            overhead_warn_fraction: 0.05,
            overhead_critical_fraction: 0.10,
            heap_warn_percent: 80.0,
            heap_critical_percent: 85.0,
            sustain_samples: 3,
            heap_low_percent: 30.0,
            parallel_long_pause_ms: 500,
        }
    }
}

/// Rule engine over pause statistics and recent resource snapshots.
///
/// Every rule is evaluated independently; all that match are returned.
pub struct TuningAdvisor {
    thresholds: AdvisorThresholds,
}

impl TuningAdvisor {
    pub fn new(thresholds: AdvisorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AdvisorThresholds {
        &self.thresholds
    }

    /// `snapshots` are oldest first.
    pub fn recommend(&self, stats: &GcStatistics, snapshots: &[MetricSnapshot]) -> Vec<Recommendation> {
        self.recommend_for(stats, snapshots, None)
    }

    /// Like [`recommend`](Self::recommend), adding advice specific to the
    /// collector in use when it is known.
    pub fn recommend_for(
        &self,
        stats: &GcStatistics,
        snapshots: &[MetricSnapshot],
        collector: Option<GcCollector>,
    ) -> Vec<Recommendation> {
        let t = &self.thresholds;
        let mut out = Vec::new();

        let enough_pauses = stats.total_pauses >= t.min_pause_events;
        if !enough_pauses {
            out.push(Recommendation::new(
                Severity::Info,
                "Insufficient Data",
                format!(
                    "Only {} GC pauses observed; at least {} are needed for pause analysis.",
                    stats.total_pauses, t.min_pause_events
                ),
                None,
            ));
        } else {
            self.pause_rules(stats, collector, &mut out);
        }

        self.heap_rules(snapshots, &mut out);

        if collector == Some(GcCollector::Serial) {
            out.push(Recommendation::new(
                Severity::Info,
                "Using Serial GC",
                "Serial GC is single-threaded. Not recommended for multi-core systems.".to_string(),
                Some("Switch to G1GC: -XX:+UseG1GC or Parallel GC: -XX:+UseParallelGC"),
            ));
        }

        if out.is_empty() {
            out.push(Recommendation::new(
                Severity::Info,
                "GC Performance Healthy",
                "No significant GC issues detected.".to_string(),
                None,
            ));
        }

        out
    }

    fn pause_rules(
        &self,
        stats: &GcStatistics,
        collector: Option<GcCollector>,
        out: &mut Vec<Recommendation>,
    ) {
        let t = &self.thresholds;

        if stats.avg_pause > t.avg_pause_warn_ms {
            out.push(Recommendation::new(
                Severity::Warning,
                "High Average GC Pause",
                format!(
                    "Average pause is {} ms (threshold {} ms).",
                    stats.avg_pause, t.avg_pause_warn_ms
                ),
                Some("Lower the pause target: -XX:MaxGCPauseMillis=200, or increase heap size"),
            ));
        }

        if stats.avg_pause > 0 && stats.p99_pause as f64 > t.variance_factor * stats.avg_pause as f64 {
            out.push(Recommendation::new(
                Severity::Warning,
                "High GC Pause Variance",
                format!(
                    "p99 pause {} ms is more than {:.1}x the average of {} ms.",
                    stats.p99_pause, t.variance_factor, stats.avg_pause
                ),
                Some("Look for full collections or humongous allocations causing outliers"),
            ));
        }

        if stats.p99_pause > t.p99_critical_ms {
            out.push(Recommendation::new(
                Severity::Critical,
                "Very Long GC Pauses",
                format!(
                    "99th percentile pause time is {} ms. This can cause severe application lag.",
                    stats.p99_pause
                ),
                Some(if collector == Some(GcCollector::G1) {
                    "-XX:MaxGCPauseMillis=200 (reduce target pause time)"
                } else {
                    "Consider switching to G1GC: -XX:+UseG1GC -XX:MaxGCPauseMillis=200"
                }),
            ));
        } else if stats.p99_pause > t.p99_warn_ms {
            out.push(Recommendation::new(
                Severity::Warning,
                "Long GC Pauses",
                format!(
                    "99th percentile pause time is {} ms. May impact responsiveness.",
                    stats.p99_pause
                ),
                Some("-XX:MaxGCPauseMillis=100 or increase heap size"),
            ));
        }

        let span = stats.window_span_ms();
        if span > 0 && stats.total_pauses > t.frequent_min_pauses {
            let per_second = stats.total_pauses as f64 * 1000.0 / span as f64;
            if per_second > t.frequent_pauses_per_second {
                out.push(Recommendation::new(
                    Severity::Warning,
                    "Frequent GC Events",
                    format!("GC occurring {:.1} times per second. High overhead.", per_second),
                    Some("Increase heap size: -Xmx<larger_value> or reduce allocation rate"),
                ));
            }
        }

        if span > 0 {
            let fraction = stats.total_pause_time as f64 / span as f64;
            if fraction > t.overhead_critical_fraction {
                out.push(Recommendation::new(
                    Severity::Critical,
                    "Excessive GC Overhead",
                    format!(
                        "{:.1}% of the last {} ms was spent in GC pauses.",
                        fraction * 100.0,
                        span
                    ),
                    Some("Increase heap size: -Xmx<larger_value>, or reduce allocation rate"),
                ));
            } else if fraction > t.overhead_warn_fraction {
                out.push(Recommendation::new(
                    Severity::Warning,
                    "High GC Overhead",
                    format!(
                        "{:.1}% of the last {} ms was spent in GC pauses.",
                        fraction * 100.0,
                        span
                    ),
                    Some("Consider increasing heap size: -Xmx<larger_value>"),
                ));
            }
        }

        if collector == Some(GcCollector::Parallel) && stats.longest_pause > t.parallel_long_pause_ms {
            out.push(Recommendation::new(
                Severity::Info,
                "Parallel GC Pause Times",
                format!(
                    "Longest pause was {} ms. Parallel GC trades pause time for throughput.",
                    stats.longest_pause
                ),
                Some("Switch to G1GC: -XX:+UseG1GC -XX:MaxGCPauseMillis=200"),
            ));
        }
    }

    fn heap_rules(&self, snapshots: &[MetricSnapshot], out: &mut Vec<Recommendation>) {
        let t = &self.thresholds;
        let known: Vec<f64> = snapshots
            .iter()
            .map(MetricSnapshot::heap_utilization)
            .filter(|u| *u >= 0.0)
            .collect();

        let window = t.sustain_samples.max(1);
        if known.len() >= window {
            let recent = &known[known.len() - window..];
            let latest = recent[recent.len() - 1];
            if recent.iter().all(|u| *u > t.heap_critical_percent) {
                out.push(Recommendation::new(
                    Severity::Critical,
                    "Critical Heap Pressure",
                    format!(
                        "Heap above {:.0}% for the last {} samples (now {:.1}%). Risk of OutOfMemoryError.",
                        t.heap_critical_percent, window, latest
                    ),
                    Some("Increase heap size immediately: -Xmx<larger_value>"),
                ));
            } else if recent.iter().all(|u| *u > t.heap_warn_percent) {
                out.push(Recommendation::new(
                    Severity::Warning,
                    "High Heap Utilization",
                    format!(
                        "Heap above {:.0}% for the last {} samples (now {:.1}%).",
                        t.heap_warn_percent, window, latest
                    ),
                    Some("Increase heap size: -Xmx<larger_value>"),
                ));
            }
        }

        if let Some(latest) = known.last() {
            if *latest < t.heap_low_percent {
                out.push(Recommendation::new(
                    Severity::Info,
                    "Low Heap Utilization",
                    format!("Heap only {:.1}% used. May be over-provisioned.", latest),
                    Some("Consider reducing heap size: -Xmx<smaller_value>"),
                ));
            }
        }
    }
}

impl Default for TuningAdvisor {
    fn default() -> Self {
        Self::new(AdvisorThresholds::default())
    }
}
