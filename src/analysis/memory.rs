use crate::jvm::types::{GcPauseEvent, GcType, MetricSnapshot};
use serde::Serialize;
use strum::Display;

/// Relative change of heap used beyond which the trend is not stable.
pub const TREND_THRESHOLD_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum HeapTrend {
    Growing,
    Stable,
    Shrinking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryTrend {
    pub samples: usize,
    pub heap_trend: HeapTrend,
    pub heap_change_percent: f64,
    pub average_gc_percent: f64,
    pub peak_gc_percent: f64,
    pub average_cpu_percent: f64,
    /// MB/s estimated from heap-used deltas between consecutive snapshots.
    pub average_allocation_rate_mb: f64,
    pub peak_allocation_rate_mb: f64,
    /// MB allocated over the whole window at the average rate.
    pub total_allocated_mb: f64,
    /// Collections counted from `gc_count` deltas.
    pub gc_event_count: u64,
    pub full_gc_count: u64,
    pub young_gc_per_minute: f64,
}

const MB: f64 = 1024.0 * 1024.0;

impl MemoryTrend {
    pub fn from_snapshots(snapshots: &[MetricSnapshot]) -> Self {
        Self::analyze(snapshots, &[])
    }

    /// `snapshots` oldest first; `pauses` supply the per-generation counts.
    pub fn analyze(snapshots: &[MetricSnapshot], pauses: &[GcPauseEvent]) -> Self {
        let samples = snapshots.len();
        let full_gc_count = pauses.iter().filter(|p| p.gc_type == GcType::Old).count() as u64;
        if samples == 0 {
            return Self {
                samples,
                heap_trend: HeapTrend::Stable,
                heap_change_percent: 0.0,
                average_gc_percent: 0.0,
                peak_gc_percent: 0.0,
                average_cpu_percent: 0.0,
                average_allocation_rate_mb: 0.0,
                peak_allocation_rate_mb: 0.0,
                total_allocated_mb: 0.0,
                gc_event_count: 0,
                full_gc_count,
                young_gc_per_minute: 0.0,
            };
        }

        let heap_change_percent = match (snapshots.first(), snapshots.last()) {
            (Some(first), Some(last)) if samples >= 2 && first.heap_used > 0 => {
                (last.heap_used as f64 - first.heap_used as f64) * 100.0 / first.heap_used as f64
            }
            _ => 0.0,
        };

        let heap_trend = if heap_change_percent > TREND_THRESHOLD_PERCENT {
            HeapTrend::Growing
        } else if heap_change_percent < -TREND_THRESHOLD_PERCENT {
            HeapTrend::Shrinking
        } else {
            HeapTrend::Stable
        };

        let rates: Vec<f64> = snapshots
            .windows(2)
            .filter_map(|pair| allocation_rate(&pair[0], &pair[1]))
            .collect();
        let average_allocation_rate_mb = if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        };

        let window_ms = snapshots[samples - 1].timestamp - snapshots[0].timestamp;
        let total_allocated_mb = if window_ms > 0 {
            average_allocation_rate_mb * window_ms as f64 / 1000.0
        } else {
            0.0
        };

        let gc_event_count = snapshots
            .windows(2)
            .map(|pair| pair[1].gc_count.saturating_sub(pair[0].gc_count))
            .sum();

        let young = pauses.iter().filter(|p| p.gc_type == GcType::Young).count();
        let young_gc_per_minute = if window_ms > 0 {
            young as f64 * 60_000.0 / window_ms as f64
        } else {
            0.0
        };

        let n = samples as f64;
        Self {
            samples,
            heap_trend,
            heap_change_percent,
            average_gc_percent: snapshots.iter().map(|s| s.gc_percent).sum::<f64>() / n,
            peak_gc_percent: snapshots.iter().map(|s| s.gc_percent).fold(0.0, f64::max),
            average_cpu_percent: snapshots.iter().map(|s| s.cpu_percent).sum::<f64>() / n,
            average_allocation_rate_mb,
            peak_allocation_rate_mb: rates.iter().copied().fold(0.0, f64::max),
            total_allocated_mb,
            gc_event_count,
            full_gc_count,
            young_gc_per_minute,
        }
    }
}

/// MB/s allocated between two snapshots. When a collection ran in between,
/// heap used may have dropped, so the magnitude of the change is taken.
fn allocation_rate(prev: &MetricSnapshot, cur: &MetricSnapshot) -> Option<f64> {
    let elapsed_ms = cur.timestamp - prev.timestamp;
    if elapsed_ms <= 0 {
        return None;
    }
    let delta = cur.heap_used as f64 - prev.heap_used as f64;
    let allocated = if cur.gc_count > prev.gc_count {
        delta.abs()
    } else {
        delta.max(0.0)
    };
    Some(allocated / MB / (elapsed_ms as f64 / 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(heap_used: u64, gc_percent: f64, cpu_percent: f64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp: 0,
            cpu_percent,
            gc_percent,
            gc_count: 0,
            gc_time_ms: 0,
            heap_used,
            heap_committed: heap_used,
            heap_max: 10_000,
            metaspace_used: 0,
            metaspace_committed: 0,
            metaspace_max: -1,
            thread_count: 1,
            daemon_thread_count: 0,
            peak_thread_count: 1,
            code_cache_used: 0,
            code_cache_max: -1,
        }
    }

    #[test]
    fn test_growing_heap() {
        let trend = MemoryTrend::from_snapshots(&[
            snapshot(1_000, 2.0, 10.0),
            snapshot(1_100, 4.0, 20.0),
            snapshot(1_500, 6.0, 30.0),
        ]);
        assert_eq!(trend.heap_trend, HeapTrend::Growing);
        assert_eq!(trend.heap_change_percent, 50.0);
        assert_eq!(trend.average_gc_percent, 4.0);
        assert_eq!(trend.peak_gc_percent, 6.0);
        assert_eq!(trend.average_cpu_percent, 20.0);
    }

    #[test]
    fn test_shrinking_and_stable() {
        let shrinking = MemoryTrend::from_snapshots(&[snapshot(1_000, 0.0, 0.0), snapshot(500, 0.0, 0.0)]);
        assert_eq!(shrinking.heap_trend, HeapTrend::Shrinking);

        let stable = MemoryTrend::from_snapshots(&[snapshot(1_000, 0.0, 0.0), snapshot(1_050, 0.0, 0.0)]);
        assert_eq!(stable.heap_trend, HeapTrend::Stable);
    }

    fn timed(timestamp: i64, heap_mb: u64, gc_count: u64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp,
            gc_count,
            ..snapshot(heap_mb * 1024 * 1024, 0.0, 0.0)
        }
    }

    #[test]
    fn test_allocation_rates() {
        let trend = MemoryTrend::from_snapshots(&[
            timed(0, 100, 5),
            // +4 MB in 1 s, no collection
            timed(1_000, 104, 5),
            // dropped 8 MB across 2 collections: counts as 8 MB in 1 s
            timed(2_000, 96, 7),
            // shrank without a collection: nothing allocated
            timed(3_000, 95, 7),
        ]);

        assert_eq!(trend.average_allocation_rate_mb, 4.0);
        assert_eq!(trend.peak_allocation_rate_mb, 8.0);
        assert_eq!(trend.total_allocated_mb, 12.0);
        assert_eq!(trend.gc_event_count, 2);
    }

    #[test]
    fn test_gc_counts_from_pauses() {
        let pause = |ts: i64, name: &str| GcPauseEvent::from_usage(ts, name, "", "", 5, 0, 0, 0);
        let pauses = vec![
            pause(0, "G1 Young Generation"),
            pause(10_000, "G1 Young Generation"),
            pause(20_000, "G1 Young Generation"),
            pause(25_000, "G1 Old Generation"),
        ];
        let trend = MemoryTrend::analyze(&[timed(0, 10, 0), timed(30_000, 10, 4)], &pauses);

        assert_eq!(trend.full_gc_count, 1);
        assert_eq!(trend.gc_event_count, 4);
        // 3 young collections in half a minute
        assert_eq!(trend.young_gc_per_minute, 6.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(MemoryTrend::from_snapshots(&[]).samples, 0);
        let single = MemoryTrend::from_snapshots(&[snapshot(1_000, 1.0, 1.0)]);
        assert_eq!(single.heap_trend, HeapTrend::Stable);
        let from_zero = MemoryTrend::from_snapshots(&[snapshot(0, 0.0, 0.0), snapshot(900, 0.0, 0.0)]);
        assert_eq!(from_zero.heap_trend, HeapTrend::Stable);

        let same_instant = MemoryTrend::from_snapshots(&[timed(0, 10, 0), timed(0, 50, 0)]);
        assert_eq!(same_instant.average_allocation_rate_mb, 0.0);
        assert_eq!(same_instant.total_allocated_mb, 0.0);
        assert_eq!(same_instant.young_gc_per_minute, 0.0);
    }
}
