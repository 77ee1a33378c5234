use crate::error::Result;
use crate::jvm::types::{GcPauseEvent, GcType};
use crate::metrics::history::BoundedHistory;
use serde::Serialize;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Summary of the retained pause window. Durations are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GcStatistics {
    pub total_pauses: u64,
    pub total_pause_time: u64,
    /// `total_pause_time / total_pauses`, truncated.
    pub avg_pause: u64,
    pub longest_pause: u64,
    pub longest_pause_event: Option<GcPauseEvent>,
    pub p50_pause: u64,
    pub p95_pause: u64,
    pub p99_pause: u64,
    /// Timestamp of the oldest retained event.
    pub window_start: i64,
    /// Timestamp of the newest retained event.
    pub window_end: i64,
}

impl GcStatistics {
    pub fn window_span_ms(&self) -> i64 {
        self.window_end - self.window_start
    }

    pub fn is_empty(&self) -> bool {
        self.total_pauses == 0
    }
}

/// Keeps a rolling window of pause events and derives statistics from it.
///
/// Statistics are recomputed from the full window on every call; events
/// older than the window are gone for good.
pub struct PauseAnalyzer {
    events: BoundedHistory<GcPauseEvent>,
}

impl PauseAnalyzer {
    pub fn new(max_events: usize) -> Result<Self> {
        Ok(Self {
            events: BoundedHistory::new(max_events)?,
        })
    }

    pub fn record(&self, event: GcPauseEvent) {
        self.events.push(event);
    }

    pub fn statistics(&self) -> GcStatistics {
        compute_statistics(&self.events.snapshot())
    }

    pub fn events(&self) -> Vec<GcPauseEvent> {
        self.events.snapshot()
    }

    pub fn recent(&self, count: usize) -> Vec<GcPauseEvent> {
        self.events.recent(count)
    }

    /// Every [`GcType`] is present in the result, possibly with no events.
    pub fn events_by_type(&self) -> BTreeMap<GcType, Vec<GcPauseEvent>> {
        let mut by_type: BTreeMap<GcType, Vec<GcPauseEvent>> =
            GcType::iter().map(|t| (t, Vec::new())).collect();
        self.events.for_each(|event| {
            by_type.entry(event.gc_type).or_default().push(event.clone());
        });
        by_type
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn clear(&self) {
        self.events.clear();
    }
}

/// Statistics over `events` in chronological order.
pub fn compute_statistics(events: &[GcPauseEvent]) -> GcStatistics {
    if events.is_empty() {
        return GcStatistics::default();
    }

    let total_pauses = events.len() as u64;
    let total_pause_time: u64 = events.iter().map(|e| e.pause_duration_ms).sum();

    // First of equal maxima wins so the reported event is stable.
    let longest = events
        .iter()
        .fold(None::<&GcPauseEvent>, |best, e| match best {
            Some(b) if b.pause_duration_ms >= e.pause_duration_ms => Some(b),
            _ => Some(e),
        });

    let mut durations: Vec<u64> = events.iter().map(|e| e.pause_duration_ms).collect();
    durations.sort_unstable();

    let window_start = events.iter().map(|e| e.timestamp).min().unwrap_or(0);
    let window_end = events.iter().map(|e| e.timestamp).max().unwrap_or(0);

    GcStatistics {
        total_pauses,
        total_pause_time,
        avg_pause: total_pause_time / total_pauses,
        longest_pause: longest.map(|e| e.pause_duration_ms).unwrap_or(0),
        longest_pause_event: longest.cloned(),
        p50_pause: nearest_rank(&durations, 0.50),
        p95_pause: nearest_rank(&durations, 0.95),
        p99_pause: nearest_rank(&durations, 0.99),
        window_start,
        window_end,
    }
}

/// Nearest-rank percentile over ascending `sorted`: the value at index
/// `ceil(p * n) - 1`, clamped to `[0, n - 1]`. Zero when empty.
pub fn nearest_rank(sorted: &[u64], percentile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (percentile * sorted.len() as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}
