use crate::jvm::probe::ResourceCounters;
use crate::jvm::types::MetricSnapshot;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Turns monotonic GC counters and instantaneous readings into
/// [`MetricSnapshot`]s, diffing each call against the previous one.
pub struct MetricsCollector {
    clock: Arc<dyn Clock>,
    last_gc_time_ms: u64,
    last_gc_count: u64,
    last_timestamp_ms: i64,
    peak_threads_seen: u32,
    cpu_load_available: bool,
    metaspace_available: bool,
    code_cache_available: bool,
}

impl MetricsCollector {
    /// Baselines against `counters` so the first snapshot only covers the
    /// time since construction.
    pub fn new(clock: Arc<dyn Clock>, counters: &dyn ResourceCounters) -> Self {
        let mut collector = Self {
            clock,
            last_gc_time_ms: 0,
            last_gc_count: 0,
            last_timestamp_ms: 0,
            peak_threads_seen: 0,
            cpu_load_available: false,
            metaspace_available: false,
            code_cache_available: false,
        };
        collector.reset_tracking(counters);
        collector
    }

    pub fn collect(&mut self, counters: &dyn ResourceCounters) -> MetricSnapshot {
        let now = self.clock.now_ms();
        let gc_time_ms = counters.gc_time_ms();
        let gc_count = counters.gc_count();

        let gc_percent = gc_percent(
            gc_time_ms.saturating_sub(self.last_gc_time_ms),
            now - self.last_timestamp_ms,
        );

        self.last_gc_time_ms = gc_time_ms;
        self.last_gc_count = gc_count;
        self.last_timestamp_ms = now;

        let cpu_load = counters.cpu_load();
        self.cpu_load_available = cpu_load.is_some();
        let cpu_percent = match cpu_load {
            Some(load) if load >= 0.0 => (load * 100.0).min(100.0),
            _ => 0.0,
        };

        let (heap_used, heap_committed, heap_max) = counters.heap();

        let metaspace = counters.metaspace();
        self.metaspace_available = metaspace.is_some();
        let (metaspace_used, metaspace_committed, metaspace_max) = metaspace.unwrap_or((0, 0, -1));

        let code_cache = counters.code_cache();
        self.code_cache_available = code_cache.is_some();
        let (code_cache_used, code_cache_max) = code_cache.unwrap_or((0, -1));

        let thread_count = counters.thread_count();
        self.peak_threads_seen = self.peak_threads_seen.max(thread_count);
        let peak_thread_count = counters
            .peak_thread_count()
            .unwrap_or(self.peak_threads_seen);

        MetricSnapshot {
            timestamp: now,
            cpu_percent,
            gc_percent,
            gc_count,
            gc_time_ms,
            heap_used,
            heap_committed,
            heap_max,
            metaspace_used,
            metaspace_committed,
            metaspace_max,
            thread_count,
            daemon_thread_count: counters.daemon_thread_count(),
            peak_thread_count,
            code_cache_used,
            code_cache_max,
        }
    }

    /// Re-baselines the deltas without producing a snapshot. Call after a
    /// pause so the idle interval is not reported as a spike.
    pub fn reset_tracking(&mut self, counters: &dyn ResourceCounters) {
        self.last_timestamp_ms = self.clock.now_ms();
        self.last_gc_time_ms = counters.gc_time_ms();
        self.last_gc_count = counters.gc_count();
    }

    pub fn last_gc_count(&self) -> u64 {
        self.last_gc_count
    }

    pub fn is_cpu_load_available(&self) -> bool {
        self.cpu_load_available
    }

    pub fn is_metaspace_available(&self) -> bool {
        self.metaspace_available
    }

    pub fn is_code_cache_available(&self) -> bool {
        self.code_cache_available
    }
}

fn gc_percent(gc_time_delta_ms: u64, wall_delta_ms: i64) -> f64 {
    if wall_delta_ms <= 0 {
        return 0.0;
    }
    (gc_time_delta_ms as f64 * 100.0 / wall_delta_ms as f64).clamp(0.0, 100.0)
}
