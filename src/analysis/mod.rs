pub mod flame;
pub mod heap;
pub mod hotspots;
pub mod leak;
pub mod memory;

pub use flame::{FlameGraph, FlameGraphBuilder};
pub use heap::{HeapHistogram, HeapHistogramSample};
pub use hotspots::{CpuAnalysis, HotspotAnalyzer};
pub use leak::{HeapSnapshot, LeakConfidence, LeakDetector, LeakKind, LeakSuspect};
pub use memory::MemoryTrend;

use crate::gc::advisor::{AdvisorThresholds, Recommendation, TuningAdvisor};
use crate::gc::pause::{compute_statistics, GcStatistics};
use crate::jvm::types::{GcCollector, GcType, MetricSnapshot};
use crate::metrics::store::ProfilerStore;
use serde::Serialize;
use std::collections::BTreeMap;

/// Every analysis of one store, computed from a single snapshot of each
/// history.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub cpu: CpuAnalysis,
    pub flame: FlameGraph,
    pub gc: GcStatistics,
    pub gc_by_type: BTreeMap<GcType, GcStatistics>,
    pub recommendations: Vec<Recommendation>,
    pub collector: Option<GcCollector>,
    pub heap: Option<Vec<HeapHistogramSample>>,
    pub leaks: Vec<LeakSuspect>,
    pub memory: MemoryTrend,
    pub latest: Option<MetricSnapshot>,
}

impl Analysis {
    pub fn from_store(store: &ProfilerStore, thresholds: &AdvisorThresholds) -> Self {
        let stacks = store.stacks().snapshot();
        let metrics = store.metrics().snapshot();
        let pauses = store.pauses().events();

        let collector = store.collector();

        let gc = compute_statistics(&pauses);
        let gc_by_type = store
            .pauses()
            .events_by_type()
            .into_iter()
            .map(|(gc_type, events)| (gc_type, compute_statistics(&events)))
            .collect();
        let recommendations =
            TuningAdvisor::new(thresholds.clone()).recommend_for(&gc, &metrics, collector);

        Self {
            cpu: HotspotAnalyzer::analyze(&stacks),
            flame: FlameGraphBuilder::from_samples(&stacks),
            gc,
            gc_by_type,
            recommendations,
            collector,
            heap: store.heap_histogram(),
            leaks: LeakDetector::analyze(&store.heap_snapshots()),
            memory: MemoryTrend::analyze(&metrics, &pauses),
            latest: metrics.last().cloned(),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::gc::advisor::Severity;
    use crate::jvm::types::{Frame, GcPauseEvent, RawClassEntry, StackSample, ThreadState};
    use pretty_assertions::assert_eq;

    fn populated_store() -> ProfilerStore {
        let store = ProfilerStore::new(&HistoryConfig::default()).unwrap();
        for i in 0..4 {
            store.record_stack(StackSample {
                thread_id: 1,
                thread_name: "main".to_string(),
                thread_state: ThreadState::Runnable,
                captured_at: i * 50,
                frames: vec![Frame::parse("a.Db.query"), Frame::parse("a.Main.run")],
                cpu_time_ns: None,
            });
        }
        store.record_pause(GcPauseEvent::from_usage(
            100,
            "G1 Young Generation",
            "end of minor GC",
            "G1 Evacuation Pause",
            20,
            0,
            0,
            0,
        ));
        store.record_pause(GcPauseEvent::from_usage(
            900,
            "G1 Old Generation",
            "end of major GC",
            "Allocation Failure",
            300,
            0,
            0,
            0,
        ));
        store.record_heap_histogram(0, HeapHistogram::build(&[RawClassEntry::new("[B", 1, 64)]));
        store.record_heap_histogram(60_000, HeapHistogram::build(&[RawClassEntry::new("[B", 500, 32_000)]));
        store.set_collector(GcCollector::G1);
        store
    }

    #[test]
    fn test_from_store() {
        let analysis = Analysis::from_store(&populated_store(), &AdvisorThresholds::default());

        assert_eq!(analysis.cpu.total_samples, 4);
        assert_eq!(analysis.flame.total_samples(), 4);
        assert_eq!(analysis.gc.total_pauses, 2);
        assert_eq!(analysis.gc.longest_pause, 300);
        assert_eq!(analysis.gc_by_type[&GcType::Young].total_pauses, 1);
        assert_eq!(analysis.gc_by_type[&GcType::Old].longest_pause, 300);
        assert!(analysis.gc_by_type[&GcType::Mixed].is_empty());
        assert_eq!(analysis.recommendations[0].title, "Insufficient Data");
        assert_eq!(analysis.recommendations[0].severity, Severity::Info);
        assert_eq!(analysis.heap.as_ref().map(|h| h[0].instance_count), Some(500));
        assert_eq!(analysis.collector, Some(GcCollector::G1));
        assert_eq!(analysis.leaks.len(), 1);
        assert_eq!(analysis.leaks[0].class_name, "[B");
        assert_eq!(analysis.leaks[0].growth_per_minute, 499.0);
        assert_eq!(analysis.memory.samples, 0);
        assert_eq!(analysis.memory.full_gc_count, 1);
        assert!(analysis.latest.is_none());
    }

    #[test]
    fn test_empty_store() {
        let store = ProfilerStore::new(&HistoryConfig::default()).unwrap();
        let analysis = Analysis::from_store(&store, &AdvisorThresholds::default());
        assert!(analysis.cpu.is_empty());
        assert!(analysis.flame.is_empty());
        assert!(analysis.gc.is_empty());
        assert!(analysis.heap.is_none());
        assert!(analysis.leaks.is_empty());
        assert!(analysis.collector.is_none());
    }

    #[test]
    fn test_json_shape() {
        let analysis = Analysis::from_store(&populated_store(), &AdvisorThresholds::default());
        let json: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();

        assert_eq!(json["cpu"]["total_samples"], 4);
        assert_eq!(json["flame"]["name"], "(root)");
        assert_eq!(json["gc"]["p99_pause"], 300);
        assert_eq!(json["gc_by_type"]["Old"]["total_pauses"], 1);
        assert_eq!(json["recommendations"][0]["severity"], "Info");
        assert_eq!(json["heap"][0]["class_name"], "[B");
        assert_eq!(json["collector"], "G1");
        assert_eq!(json["leaks"][0]["kind"], "Array");
    }
}
