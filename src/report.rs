use crate::analysis::heap::{HeapHistogram, HeapHistogramSample};
use crate::analysis::hotspots::CpuAnalysis;
use crate::analysis::leak::LeakSuspect;
use crate::analysis::memory::MemoryTrend;
use crate::analysis::Analysis;
use crate::gc::advisor::Recommendation;
use crate::gc::pause::GcStatistics;
use crate::jvm::types::MetricSnapshot;
use std::fmt::Write;

/// Renders every section of `analysis` as plain text, listing at most
/// `top` rows per table.
pub fn render(analysis: &Analysis, top: usize) -> String {
    let sections = [
        render_hotspots(&analysis.cpu, top),
        render_threads(&analysis.cpu, top),
        render_gc(&analysis.gc),
        render_memory(&analysis.memory, analysis.latest.as_ref()),
        render_heap(analysis.heap.as_deref(), top),
        render_leaks(&analysis.leaks, top),
        render_recommendations(&analysis.recommendations),
    ];
    sections.join("\n")
}

pub fn render_hotspots(cpu: &CpuAnalysis, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CPU Hotspots ({} samples)", cpu.total_samples);
    if cpu.is_empty() {
        let _ = writeln!(out, "  no stack samples");
        return out;
    }

    let _ = writeln!(out, "   Total    Self  Method");
    for method in cpu.top_methods(top) {
        let _ = writeln!(
            out,
            "  {:>5.1}%  {:>5.1}%  {}",
            method.total_time_percent, method.self_time_percent, method.method
        );
    }

    let _ = writeln!(out, "\nPackages");
    for package in cpu.top_packages(top) {
        let _ = writeln!(
            out,
            "  {:>6} total  {:>6} self  {} ({} methods)",
            package.total_samples, package.self_samples, package.package_name, package.method_count
        );
    }
    out
}

pub fn render_threads(cpu: &CpuAnalysis, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Threads");
    if cpu.thread_breakdown.is_empty() {
        let _ = writeln!(out, "  no stack samples");
        return out;
    }
    for thread in cpu.top_threads(top) {
        let states: Vec<String> = thread
            .states
            .iter()
            .map(|(state, count)| format!("{} {}", state, count))
            .collect();
        let _ = writeln!(
            out,
            "  #{:<5} {:<24} {:>6} samples  [{}]",
            thread.thread_id,
            thread.thread_name,
            thread.sample_count,
            states.join(", ")
        );
    }
    out
}

pub fn render_gc(stats: &GcStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "GC Pauses");
    if stats.is_empty() {
        let _ = writeln!(out, "  no pauses recorded");
        return out;
    }
    let _ = writeln!(
        out,
        "  count {}, total {} ms, avg {} ms",
        stats.total_pauses, stats.total_pause_time, stats.avg_pause
    );
    let _ = writeln!(
        out,
        "  p50 {} ms, p95 {} ms, p99 {} ms, max {} ms",
        stats.p50_pause, stats.p95_pause, stats.p99_pause, stats.longest_pause
    );
    if let Some(event) = &stats.longest_pause_event {
        let _ = writeln!(
            out,
            "  longest: {} ({}) at {}",
            event.gc_name, event.gc_cause, event.timestamp
        );
    }
    out
}

pub fn render_memory(trend: &MemoryTrend, latest: Option<&MetricSnapshot>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Memory ({} snapshots)", trend.samples);
    if let Some(snapshot) = latest {
        let utilization = snapshot.heap_utilization();
        let heap = if utilization < 0.0 {
            format!("heap {} used, max unknown", format_bytes(snapshot.heap_used))
        } else {
            format!(
                "heap {:.1}% used ({} of {})",
                utilization,
                format_bytes(snapshot.heap_used),
                format_bytes(snapshot.heap_max as u64)
            )
        };
        let _ = writeln!(out, "  {}, {} threads", heap, snapshot.thread_count);
    }
    let _ = writeln!(
        out,
        "  trend {} ({:+.1}%), gc {:.2}% avg / {:.2}% peak, cpu {:.1}% avg",
        trend.heap_trend,
        trend.heap_change_percent,
        trend.average_gc_percent,
        trend.peak_gc_percent,
        trend.average_cpu_percent
    );
    let _ = writeln!(
        out,
        "  allocation {:.2} MB/s avg / {:.2} MB/s peak, {:.1} MB total",
        trend.average_allocation_rate_mb, trend.peak_allocation_rate_mb, trend.total_allocated_mb
    );
    let _ = writeln!(
        out,
        "  {} collections, {} full, {:.1} young/min",
        trend.gc_event_count, trend.full_gc_count, trend.young_gc_per_minute
    );
    out
}

pub fn render_heap(histogram: Option<&[HeapHistogramSample]>, top: usize) -> String {
    let mut out = String::new();
    let Some(histogram) = histogram else {
        let _ = writeln!(out, "Heap Histogram\n  not captured");
        return out;
    };

    let _ = writeln!(
        out,
        "Heap Histogram ({} classes, {} total)",
        histogram.len(),
        format_bytes(HeapHistogram::total_bytes(histogram))
    );
    for class in histogram.iter().take(top) {
        let _ = writeln!(
            out,
            "  {:>10}  {:>10} inst  {:>5.1}%  {}",
            format_bytes(class.total_bytes),
            class.instance_count,
            class.percent_of_heap,
            class.class_name
        );
    }
    out
}

pub fn render_leaks(suspects: &[LeakSuspect], top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Leak Suspects");
    if suspects.is_empty() {
        let _ = writeln!(out, "  none (needs two heap histograms with growth)");
        return out;
    }
    for suspect in suspects.iter().take(top) {
        let _ = writeln!(
            out,
            "  [{}] {} +{} inst ({:+.0}%), {:.1}/min, {}: {}",
            suspect.confidence,
            suspect.class_name,
            suspect.instance_delta(),
            suspect.relative_growth_percent(),
            suspect.growth_per_minute,
            suspect.kind,
            suspect.kind.description()
        );
    }
    out
}

pub fn render_recommendations(recommendations: &[Recommendation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Recommendations");
    for rec in recommendations {
        let _ = writeln!(out, "  [{}] {}: {}", rec.severity, rec.title, rec.description);
        if let Some(suggestion) = &rec.suggestion {
            let _ = writeln!(out, "      -> {}", suggestion);
        }
    }
    out
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::hotspots::HotspotAnalyzer;
    use crate::analysis::leak::{HeapSnapshot, LeakDetector};
    use crate::jvm::types::MetricSnapshot;
    use crate::gc::advisor::TuningAdvisor;
    use crate::gc::pause::compute_statistics;
    use crate::jvm::types::{Frame, GcPauseEvent, RawClassEntry, StackSample, ThreadState};
    use pretty_assertions::assert_eq;

    fn sample(state: ThreadState, frames: &[&str]) -> StackSample {
        StackSample {
            thread_id: 1,
            thread_name: "main".to_string(),
            thread_state: state,
            captured_at: 0,
            frames: frames.iter().map(|f| Frame::parse(f)).collect(),
            cpu_time_ns: None,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_hotspots_section() {
        let cpu = HotspotAnalyzer::analyze(&[
            sample(ThreadState::Runnable, &["a.Db.query", "a.Main.run"]),
            sample(ThreadState::Runnable, &["a.Main.run"]),
        ]);
        insta::assert_snapshot!(render_hotspots(&cpu, 5), @r"
        CPU Hotspots (2 samples)
           Total    Self  Method
          100.0%   50.0%  a.Main.run
           50.0%   50.0%  a.Db.query

        Packages
               3 total       2 self  a (2 methods)
        ");
    }

    #[test]
    fn test_gc_and_recommendations_sections() {
        let stats = compute_statistics(&[
            GcPauseEvent::from_usage(0, "G1 Young Generation", "end of minor GC", "G1 Evacuation Pause", 20, 0, 0, 0),
            GcPauseEvent::from_usage(500, "G1 Old Generation", "end of major GC", "Allocation Failure", 300, 0, 0, 0),
        ]);
        insta::assert_snapshot!(render_gc(&stats), @r"
        GC Pauses
          count 2, total 320 ms, avg 160 ms
          p50 20 ms, p95 300 ms, p99 300 ms, max 300 ms
          longest: G1 Old Generation (Allocation Failure) at 500
        ");

        let recs = TuningAdvisor::default().recommend(&stats, &[]);
        insta::assert_snapshot!(render_recommendations(&recs), @r"
        Recommendations
          [Info] Insufficient Data: Only 2 GC pauses observed; at least 10 are needed for pause analysis.
        ");
    }

    #[test]
    fn test_empty_sections() {
        assert_eq!(render_gc(&GcStatistics::default()), "GC Pauses\n  no pauses recorded\n");
        assert_eq!(render_heap(None, 5), "Heap Histogram\n  not captured\n");
        let cpu = HotspotAnalyzer::analyze(&[]);
        assert_eq!(render_threads(&cpu, 5), "Threads\n  no stack samples\n");
    }

    #[test]
    fn test_heap_section_respects_top() {
        let histogram = HeapHistogram::build(&[
            RawClassEntry::new("[B", 10, 4096),
            RawClassEntry::new("java.lang.String", 10, 1024),
            RawClassEntry::new("a.Small", 1, 16),
        ]);
        let text = render_heap(Some(histogram.as_slice()), 2);
        assert!(text.starts_with("Heap Histogram (3 classes, 5.0 KB total)\n"));
        assert!(text.contains("java.lang.String"));
        assert!(!text.contains("a.Small"));
    }

    #[test]
    fn test_leaks_section() {
        assert_eq!(
            render_leaks(&[], 5),
            "Leak Suspects\n  none (needs two heap histograms with growth)\n"
        );

        let suspects = LeakDetector::analyze(&[
            HeapSnapshot::new(0, HeapHistogram::build(&[RawClassEntry::new("a.Order", 100, 1_600)])),
            HeapSnapshot::new(60_000, HeapHistogram::build(&[RawClassEntry::new("a.Order", 400, 6_400)])),
        ]);
        insta::assert_snapshot!(render_leaks(&suspects, 5), @r"
        Leak Suspects
          [Medium] a.Order +300 inst (+300%), 300.0/min, Object: General object accumulation
        ");
    }

    #[test]
    fn test_memory_section_reports_allocation() {
        let snapshot = |timestamp: i64, heap_used: u64, gc_count: u64| MetricSnapshot {
            timestamp,
            cpu_percent: 10.0,
            gc_percent: 0.0,
            gc_count,
            gc_time_ms: 0,
            heap_used,
            heap_committed: 1024 * 1024 * 1024,
            heap_max: 1024 * 1024 * 1024,
            metaspace_used: 0,
            metaspace_committed: 0,
            metaspace_max: -1,
            thread_count: 12,
            daemon_thread_count: 0,
            peak_thread_count: 12,
            code_cache_used: 0,
            code_cache_max: -1,
        };
        let mb = 1024 * 1024;
        let snapshots = vec![snapshot(0, 100 * mb, 0), snapshot(1_000, 104 * mb, 0), snapshot(2_000, 96 * mb, 1)];
        let trend = MemoryTrend::analyze(&snapshots, &[]);
        let text = render_memory(&trend, snapshots.last());
        assert!(text.contains("allocation 6.00 MB/s avg / 8.00 MB/s peak, 12.0 MB total"));
        assert!(text.contains("1 collections, 0 full, 0.0 young/min"));
    }
}
