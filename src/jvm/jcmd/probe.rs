use super::executor::{execute_command, DEFAULT_TIMEOUT};
use super::parsers::{self, DiscoveredJvm, HeapInfo, ThreadDump};
use super::locate_tool;
use crate::error::Result;
use crate::gc::detector::{GcCounters, GcEventDetector};
use crate::jvm::probe::{CounterReading, ProbeCapabilities, ProcessProbe};
use crate::jvm::types::{GcPauseEvent, RawClassEntry, StackSample};
use crate::metrics::collector::Clock;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ThreadTotals {
    count: u32,
    daemon: u32,
    peak: u32,
    total_cpu_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CpuMark {
    at_ms: i64,
    cpu_ms: f64,
}

/// [`ProcessProbe`] for a local JVM, driven by the `jcmd` and `jstat`
/// command line tools.
///
/// Thread counts and CPU load come from the most recent thread dump, so
/// they are only known once stacks have been captured.
pub struct JcmdProbe {
    pid: String,
    jcmd: PathBuf,
    jstat: PathBuf,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    processors: usize,
    max_heap: OnceCell<Option<u64>>,
    threads: Mutex<ThreadTotals>,
    cpu_mark: Mutex<Option<CpuMark>>,
    detector: Mutex<GcEventDetector>,
    /// Counters read by `read_counters`, consumed by the next GC poll.
    pending_gc: Mutex<Option<GcCounters>>,
}

impl JcmdProbe {
    pub fn new(pid: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            pid: pid.to_string(),
            jcmd: locate_tool("jcmd"),
            jstat: locate_tool("jstat"),
            timeout: DEFAULT_TIMEOUT,
            clock,
            processors: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_heap: OnceCell::new(),
            threads: Mutex::new(ThreadTotals::default()),
            cpu_mark: Mutex::new(None),
            detector: Mutex::new(GcEventDetector::new()),
            pending_gc: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn jcmd(&self, command: &[&str]) -> Result<String> {
        let mut args = vec![self.pid.as_str()];
        args.extend_from_slice(command);
        Ok(execute_command(&self.jcmd, &args, Some(self.timeout)).await?)
    }

    async fn gc_counters(&self) -> Result<GcCounters> {
        let output =
            execute_command(&self.jstat, &["-gcutil", &self.pid], Some(self.timeout)).await?;
        Ok(parsers::parse_gc_counters(&output)?)
    }

    /// `-XX:MaxHeapSize`, read once per probe.
    async fn max_heap(&self) -> Option<u64> {
        *self
            .max_heap
            .get_or_init(|| async {
                match self.jcmd(&["VM.flags"]).await {
                    Ok(output) => parsers::parse_max_heap_size(&output),
                    Err(e) => {
                        debug!(error = %e, "VM.flags unavailable, heap max unknown");
                        None
                    }
                }
            })
            .await
    }

    fn record_dump(&self, dump: &ThreadDump) {
        let mut threads = self.threads.lock();
        threads.count = dump.thread_count();
        threads.daemon = dump.daemon_count;
        threads.peak = threads.peak.max(threads.count);
        threads.total_cpu_ms = dump.total_cpu_ms;
    }

    fn cpu_load(&self, now_ms: i64) -> Option<f64> {
        let total_cpu_ms = self.threads.lock().total_cpu_ms?;
        let mut mark = self.cpu_mark.lock();
        let load = (*mark).and_then(|prev| cpu_load_since(prev, now_ms, total_cpu_ms, self.processors));
        *mark = Some(CpuMark {
            at_ms: now_ms,
            cpu_ms: total_cpu_ms,
        });
        load
    }
}

/// Share of all processors used since `prev`, from cumulative thread CPU.
fn cpu_load_since(prev: CpuMark, now_ms: i64, total_cpu_ms: f64, processors: usize) -> Option<f64> {
    let wall_ms = now_ms - prev.at_ms;
    if wall_ms <= 0 || processors == 0 {
        return None;
    }
    let used = (total_cpu_ms - prev.cpu_ms).max(0.0);
    Some((used / (wall_ms as f64 * processors as f64)).clamp(0.0, 1.0))
}

fn counter_reading(
    heap: HeapInfo,
    gc: GcCounters,
    max_heap_flag: Option<u64>,
    threads: ThreadTotals,
    cpu_load: Option<f64>,
) -> CounterReading {
    let heap_max = heap
        .max
        .or(max_heap_flag)
        .map(|max| max as i64)
        .unwrap_or(-1);

    CounterReading {
        gc_time_ms: gc.total_time_ms(),
        gc_count: gc.total_count(),
        cpu_load,
        heap_used: heap.used,
        heap_committed: heap.committed,
        heap_max,
        metaspace: heap
            .metaspace
            .map(|(used, committed, reserved)| (used, committed, reserved as i64)),
        code_cache: None,
        thread_count: threads.count,
        daemon_thread_count: threads.daemon,
        peak_thread_count: Some(threads.peak),
        collector: heap.collector,
    }
}

#[async_trait]
impl ProcessProbe for JcmdProbe {
    fn capabilities(&self) -> ProbeCapabilities {
        ProbeCapabilities {
            stacks: true,
            counters: true,
            heap_histogram: true,
            gc_events: true,
        }
    }

    async fn capture_stacks(&self) -> Result<Vec<StackSample>> {
        let output = self.jcmd(&["Thread.print", "-l"]).await?;
        let dump = parsers::parse_thread_dump(&output, self.clock.now_ms())?;
        self.record_dump(&dump);
        Ok(dump.samples)
    }

    async fn read_counters(&self) -> Result<CounterReading> {
        let heap = parsers::parse_heap_info(&self.jcmd(&["GC.heap_info"]).await?)?;
        let gc = self.gc_counters().await?;
        *self.pending_gc.lock() = Some(gc);
        let max_heap = self.max_heap().await;
        let cpu_load = self.cpu_load(self.clock.now_ms());
        let threads = *self.threads.lock();
        Ok(counter_reading(heap, gc, max_heap, threads, cpu_load))
    }

    async fn capture_heap_histogram(&self) -> Result<Vec<RawClassEntry>> {
        let output = self.jcmd(&["GC.class_histogram"]).await?;
        Ok(parsers::parse_class_histogram(&output)?)
    }

    async fn poll_gc_events(&self) -> Result<Vec<GcPauseEvent>> {
        let cached = self.pending_gc.lock().take();
        let counters = match cached {
            Some(counters) => counters,
            None => self.gc_counters().await?,
        };
        let now = self.clock.now_ms();
        Ok(self.detector.lock().observe(counters, now))
    }

    fn reset_tracking(&self) {
        self.detector.lock().reset();
        *self.cpu_mark.lock() = None;
        *self.pending_gc.lock() = None;
    }
}

/// Lists JVMs that `jcmd -l` can attach to.
pub async fn discover_jvms() -> Result<Vec<DiscoveredJvm>> {
    let output = execute_command(&locate_tool("jcmd"), &["-l"], Some(Duration::from_secs(2))).await?;
    Ok(parsers::parse_jcmd_list(&output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::probe::ResourceCounters;
    use crate::jvm::types::GcCollector;
    use crate::metrics::collector::ManualClock;
    use pretty_assertions::assert_eq;

    fn missing_tools(probe: &mut JcmdProbe) {
        probe.jcmd = PathBuf::from("jvm-sampler-missing-jcmd");
        probe.jstat = PathBuf::from("jvm-sampler-missing-jstat");
    }

    fn heap(max: Option<u64>) -> HeapInfo {
        HeapInfo {
            used: 256,
            committed: 512,
            max,
            metaspace: Some((10, 20, 1_000)),
            collector: Some(GcCollector::G1),
        }
    }

    fn gc() -> GcCounters {
        GcCounters {
            young_count: 10,
            young_time_ms: 100,
            old_count: 1,
            old_time_ms: 50,
        }
    }

    #[test]
    fn test_counter_reading() {
        let threads = ThreadTotals {
            count: 12,
            daemon: 9,
            peak: 14,
            total_cpu_ms: Some(1.0),
        };
        let reading = counter_reading(heap(None), gc(), Some(1_024), threads, Some(0.25));

        assert_eq!(reading.gc_time_ms(), 150);
        assert_eq!(reading.gc_count(), 11);
        assert_eq!(reading.heap(), (256, 512, 1_024));
        assert_eq!(reading.metaspace(), Some((10, 20, 1_000)));
        assert_eq!(reading.code_cache(), None);
        assert_eq!(reading.thread_count(), 12);
        assert_eq!(reading.daemon_thread_count(), 9);
        assert_eq!(reading.peak_thread_count(), Some(14));
        assert_eq!(reading.cpu_load(), Some(0.25));
        assert_eq!(reading.collector, Some(GcCollector::G1));
    }

    #[test]
    fn test_heap_max_preference() {
        let threads = ThreadTotals::default();
        let collector_max = counter_reading(heap(Some(2_048)), gc(), Some(1_024), threads, None);
        assert_eq!(collector_max.heap_max, 2_048);

        let unknown = counter_reading(heap(None), gc(), None, threads, None);
        assert_eq!(unknown.heap_max, -1);
    }

    #[test]
    fn test_cpu_load_since() {
        let prev = CpuMark {
            at_ms: 1_000,
            cpu_ms: 500.0,
        };
        // 1000 ms of CPU over 1000 ms on 4 processors
        assert_eq!(cpu_load_since(prev, 2_000, 1_500.0, 4), Some(0.25));
        // threads exited: never negative
        assert_eq!(cpu_load_since(prev, 2_000, 100.0, 4), Some(0.0));
        assert_eq!(cpu_load_since(prev, 9_000_000, f64::MAX, 1), Some(1.0));
        assert_eq!(cpu_load_since(prev, 1_000, 900.0, 4), None);
    }

    #[test]
    fn test_thread_totals_track_peak() {
        let clock = Arc::new(ManualClock::new(0));
        let probe = JcmdProbe::new(4242, clock.clone());
        let output = include_str!("../../../assets/sample_outputs/jcmd_thread_print.txt");
        let dump = parsers::parse_thread_dump(output, 0).unwrap();

        probe.record_dump(&dump);
        let mut smaller = dump.clone();
        smaller.samples.truncate(2);
        probe.record_dump(&smaller);

        let threads = *probe.threads.lock();
        assert_eq!(threads.count, 2);
        assert_eq!(threads.peak, 5);

        // first reading only marks the baseline
        assert_eq!(probe.cpu_load(0), None);
        clock.advance(1_000);
        assert!(probe.cpu_load(clock.now_ms()).is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_probe_error() {
        let mut probe = JcmdProbe::new(1, Arc::new(ManualClock::new(0)));
        missing_tools(&mut probe);
        let result = probe.capture_heap_histogram().await;
        assert!(matches!(result, Err(crate::error::Error::Probe(_))));
    }

    #[tokio::test]
    async fn test_gc_poll_reuses_counters_from_read() {
        let clock = Arc::new(ManualClock::new(0));
        let mut probe = JcmdProbe::new(1, clock.clone());
        missing_tools(&mut probe);

        // jstat cannot run, so each poll must consume what the counter read left
        *probe.pending_gc.lock() = Some(gc());
        assert_eq!(probe.poll_gc_events().await.unwrap(), Vec::new());
        assert!(probe.pending_gc.lock().is_none());

        let mut later = gc();
        later.young_count += 3;
        later.young_time_ms += 30;
        *probe.pending_gc.lock() = Some(later);
        clock.advance(1_000);
        assert_eq!(probe.poll_gc_events().await.unwrap().len(), 3);

        assert!(matches!(
            probe.poll_gc_events().await,
            Err(crate::error::Error::Probe(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_tracking_drops_baselines() {
        let mut probe = JcmdProbe::new(1, Arc::new(ManualClock::new(0)));
        missing_tools(&mut probe);

        *probe.pending_gc.lock() = Some(gc());
        probe.poll_gc_events().await.unwrap();
        probe.threads.lock().total_cpu_ms = Some(10.0);
        probe.cpu_load(0);

        probe.reset_tracking();

        let mut later = gc();
        later.old_count += 5;
        *probe.pending_gc.lock() = Some(later);
        assert!(probe.poll_gc_events().await.unwrap().is_empty());
        assert_eq!(probe.cpu_load(1_000), None);
    }
}
