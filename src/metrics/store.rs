use crate::analysis::heap::HeapHistogramSample;
use crate::analysis::leak::HeapSnapshot;
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::gc::pause::PauseAnalyzer;
use crate::jvm::types::{GcCollector, GcPauseEvent, MetricSnapshot, StackSample};
use crate::metrics::history::{BoundedHistory, HistoryStats};
use crate::session::{Session, SESSION_FORMAT_VERSION};
use parking_lot::Mutex;
use serde::Serialize;

/// All bounded histories of one profiling session.
///
/// Shared as `Arc<ProfilerStore>`; the sampler writes, analyses read
/// snapshots.
pub struct ProfilerStore {
    stacks: BoundedHistory<StackSample>,
    metrics: BoundedHistory<MetricSnapshot>,
    pauses: PauseAnalyzer,
    /// First histogram taken; never evicted.
    heap_baseline: Mutex<Option<HeapSnapshot>>,
    heap_snapshots: BoundedHistory<HeapSnapshot>,
    collector: Mutex<Option<GcCollector>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub stacks: HistoryStats,
    pub metrics: HistoryStats,
    pub pauses: usize,
    pub heap_snapshots: usize,
}

impl ProfilerStore {
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        Ok(Self {
            stacks: BoundedHistory::new(config.stack_capacity)?,
            metrics: BoundedHistory::new(config.metrics_capacity)?,
            pauses: PauseAnalyzer::new(config.pause_capacity)?,
            heap_baseline: Mutex::new(None),
            heap_snapshots: BoundedHistory::new(config.heap_snapshot_capacity)?,
            collector: Mutex::new(None),
        })
    }

    pub fn record_stack(&self, sample: StackSample) {
        self.stacks.push(sample);
    }

    pub fn record_metrics(&self, snapshot: MetricSnapshot) {
        self.metrics.push(snapshot);
    }

    pub fn record_pause(&self, event: GcPauseEvent) {
        self.pauses.record(event);
    }

    /// The first histogram becomes the baseline; later ones go into a
    /// bounded history.
    pub fn record_heap_histogram(&self, timestamp: i64, histogram: Vec<HeapHistogramSample>) {
        let snapshot = HeapSnapshot::new(timestamp, histogram);
        let mut baseline = self.heap_baseline.lock();
        if baseline.is_none() {
            *baseline = Some(snapshot);
        } else {
            self.heap_snapshots.push(snapshot);
        }
    }

    pub fn set_collector(&self, collector: GcCollector) {
        *self.collector.lock() = Some(collector);
    }

    pub fn collector(&self) -> Option<GcCollector> {
        *self.collector.lock()
    }

    pub fn stacks(&self) -> &BoundedHistory<StackSample> {
        &self.stacks
    }

    pub fn metrics(&self) -> &BoundedHistory<MetricSnapshot> {
        &self.metrics
    }

    pub fn pauses(&self) -> &PauseAnalyzer {
        &self.pauses
    }

    /// The most recent histogram.
    pub fn heap_histogram(&self) -> Option<Vec<HeapHistogramSample>> {
        self.heap_snapshots
            .latest()
            .or_else(|| self.heap_baseline.lock().clone())
            .map(|snapshot| snapshot.classes)
    }

    /// Baseline first, then every retained later histogram.
    pub fn heap_snapshots(&self) -> Vec<HeapSnapshot> {
        let mut all: Vec<HeapSnapshot> = self.heap_baseline.lock().iter().cloned().collect();
        all.extend(self.heap_snapshots.snapshot());
        all
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            stacks: self.stacks.stats(),
            metrics: self.metrics.stats(),
            pauses: self.pauses.len(),
            heap_snapshots: self.heap_snapshots.len() + usize::from(self.heap_baseline.lock().is_some()),
        }
    }

    pub fn clear(&self) {
        self.stacks.clear();
        self.metrics.clear();
        self.pauses.clear();
        self.heap_snapshots.clear();
        *self.heap_baseline.lock() = None;
        *self.collector.lock() = None;
    }

    pub fn to_session(&self, pid: Option<u32>, started_at: i64, ended_at: i64) -> Session {
        Session {
            version: SESSION_FORMAT_VERSION,
            pid,
            started_at,
            ended_at,
            stacks: self.stacks.snapshot(),
            metrics: self.metrics.snapshot(),
            pauses: self.pauses.events(),
            heap_snapshots: self.heap_snapshots(),
            collector: self.collector(),
        }
    }

    /// Replays a saved session. Histories smaller than the session keep
    /// only its newest entries.
    pub fn from_session(session: &Session, config: &HistoryConfig) -> Result<Self> {
        let store = Self::new(config)?;
        for sample in &session.stacks {
            store.record_stack(sample.clone());
        }
        for snapshot in &session.metrics {
            store.record_metrics(snapshot.clone());
        }
        for event in &session.pauses {
            store.record_pause(event.clone());
        }
        for snapshot in &session.heap_snapshots {
            store.record_heap_histogram(snapshot.timestamp, snapshot.classes.clone());
        }
        if let Some(collector) = session.collector {
            store.set_collector(collector);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::heap::HeapHistogram;
    use crate::jvm::types::{Frame, RawClassEntry, ThreadState};
    use pretty_assertions::assert_eq;

    fn small_config() -> HistoryConfig {
        HistoryConfig {
            stack_capacity: 2,
            metrics_capacity: 2,
            pause_capacity: 2,
            heap_snapshot_capacity: 2,
        }
    }

    fn stack(captured_at: i64) -> StackSample {
        StackSample {
            thread_id: 1,
            thread_name: "main".to_string(),
            thread_state: ThreadState::Runnable,
            captured_at,
            frames: vec![Frame::parse("a.Main.run")],
            cpu_time_ns: None,
        }
    }

    fn pause(timestamp: i64) -> GcPauseEvent {
        GcPauseEvent::from_usage(timestamp, "G1 Young Generation", "", "", 5, 0, 0, 0)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = HistoryConfig {
            stack_capacity: 0,
            ..HistoryConfig::default()
        };
        assert!(ProfilerStore::new(&config).is_err());
    }

    #[test]
    fn test_histories_are_bounded() {
        let store = ProfilerStore::new(&small_config()).unwrap();
        for t in 0..5 {
            store.record_stack(stack(t));
            store.record_pause(pause(t));
        }

        let stats = store.stats();
        assert_eq!(stats.stacks.len, 2);
        assert_eq!(stats.stacks.dropped, 3);
        assert_eq!(stats.pauses, 2);
        let kept: Vec<i64> = store.stacks().snapshot().iter().map(|s| s.captured_at).collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[test]
    fn test_session_round_trip_truncates_to_capacity() {
        let store = ProfilerStore::new(&HistoryConfig::default()).unwrap();
        for t in 0..4 {
            store.record_stack(stack(t));
        }
        store.record_pause(pause(10));
        store.record_heap_histogram(0, Vec::new());
        store.set_collector(GcCollector::G1);

        let session = store.to_session(Some(99), 0, 100);
        assert_eq!(session.stacks.len(), 4);
        assert_eq!(session.pid, Some(99));
        assert_eq!(session.collector, Some(GcCollector::G1));

        let replayed = ProfilerStore::from_session(&session, &small_config()).unwrap();
        let kept: Vec<i64> = replayed.stacks().snapshot().iter().map(|s| s.captured_at).collect();
        assert_eq!(kept, vec![2, 3]);
        assert_eq!(replayed.pauses().len(), 1);
        assert_eq!(replayed.heap_histogram(), Some(Vec::new()));
        assert_eq!(replayed.collector(), Some(GcCollector::G1));
    }

    #[test]
    fn test_heap_baseline_survives_eviction() {
        let store = ProfilerStore::new(&small_config()).unwrap();
        for t in 0..5 {
            store.record_heap_histogram(t * 1_000, HeapHistogram::build(&[RawClassEntry::new("a.A", t as u64 + 1, 16)]));
        }

        let timestamps: Vec<i64> = store.heap_snapshots().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![0, 3_000, 4_000]);
        assert_eq!(store.stats().heap_snapshots, 3);
        assert_eq!(store.heap_histogram().unwrap()[0].instance_count, 5);
    }

    #[test]
    fn test_clear() {
        let store = ProfilerStore::new(&small_config()).unwrap();
        store.record_stack(stack(0));
        store.record_heap_histogram(0, Vec::new());
        store.set_collector(GcCollector::Parallel);
        store.clear();
        assert!(store.stacks().is_empty());
        assert!(store.heap_histogram().is_none());
        assert!(store.heap_snapshots().is_empty());
        assert!(store.collector().is_none());
    }
}
