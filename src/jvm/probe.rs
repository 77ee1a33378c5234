use crate::error::Result;
use crate::jvm::types::{GcCollector, GcPauseEvent, RawClassEntry, StackSample};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Plain accessors over a process's resource counters.
///
/// GC time and count are monotonic over the process lifetime; everything
/// else is an instantaneous reading. `None` means the platform cannot
/// report the value.
pub trait ResourceCounters {
    fn gc_time_ms(&self) -> u64;
    fn gc_count(&self) -> u64;
    /// Process CPU load as a fraction in `[0, 1]`.
    fn cpu_load(&self) -> Option<f64>;
    /// `(used, committed, max)`; max is `-1` when unbounded.
    fn heap(&self) -> (u64, u64, i64);
    fn metaspace(&self) -> Option<(u64, u64, i64)>;
    /// `(used, max)`
    fn code_cache(&self) -> Option<(u64, i64)>;
    fn thread_count(&self) -> u32;
    fn daemon_thread_count(&self) -> u32;
    fn peak_thread_count(&self) -> Option<u32>;
}

/// A full set of counter values read at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterReading {
    pub gc_time_ms: u64,
    pub gc_count: u64,
    pub cpu_load: Option<f64>,
    pub heap_used: u64,
    pub heap_committed: u64,
    pub heap_max: i64,
    pub metaspace: Option<(u64, u64, i64)>,
    pub code_cache: Option<(u64, i64)>,
    pub thread_count: u32,
    pub daemon_thread_count: u32,
    pub peak_thread_count: Option<u32>,
    #[serde(default)]
    pub collector: Option<GcCollector>,
}

impl ResourceCounters for CounterReading {
    fn gc_time_ms(&self) -> u64 {
        self.gc_time_ms
    }

    fn gc_count(&self) -> u64 {
        self.gc_count
    }

    fn cpu_load(&self) -> Option<f64> {
        self.cpu_load
    }

    fn heap(&self) -> (u64, u64, i64) {
        (self.heap_used, self.heap_committed, self.heap_max)
    }

    fn metaspace(&self) -> Option<(u64, u64, i64)> {
        self.metaspace
    }

    fn code_cache(&self) -> Option<(u64, i64)> {
        self.code_cache
    }

    fn thread_count(&self) -> u32 {
        self.thread_count
    }

    fn daemon_thread_count(&self) -> u32 {
        self.daemon_thread_count
    }

    fn peak_thread_count(&self) -> Option<u32> {
        self.peak_thread_count
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeCapabilities {
    pub stacks: bool,
    pub counters: bool,
    pub heap_histogram: bool,
    pub gc_events: bool,
}

/// Data sources of a profiled process.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    fn capabilities(&self) -> ProbeCapabilities;

    /// One sample per live thread.
    async fn capture_stacks(&self) -> Result<Vec<StackSample>>;

    async fn read_counters(&self) -> Result<CounterReading>;

    /// Expensive; never called from the sampling loop.
    async fn capture_heap_histogram(&self) -> Result<Vec<RawClassEntry>>;

    /// Pause events completed since the previous call.
    async fn poll_gc_events(&self) -> Result<Vec<GcPauseEvent>>;

    /// Drops baselines kept between calls, so that nothing which happened
    /// while sampling was paused is reported afterwards.
    fn reset_tracking(&self) {}
}
