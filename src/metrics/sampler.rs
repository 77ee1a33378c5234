use crate::analysis::heap::{HeapHistogram, HeapHistogramSample};
use crate::config::SamplingConfig;
use crate::error::Result;
use crate::jvm::probe::ProcessProbe;
use crate::metrics::collector::{Clock, MetricsCollector};
use crate::metrics::filter::SampleFilter;
use crate::metrics::store::ProfilerStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplerStats {
    /// Probe calls attempted by the loop.
    pub total_samples: u64,
    pub failed_samples: u64,
    pub stacks_recorded: u64,
    pub stacks_filtered: u64,
    pub snapshots_recorded: u64,
    pub pauses_recorded: u64,
}

#[derive(Default)]
struct SamplerState {
    paused: AtomicBool,
    resumed: AtomicBool,
    stopped: AtomicBool,
    stop: Notify,
    total_samples: AtomicU64,
    failed_samples: AtomicU64,
    stacks_recorded: AtomicU64,
    stacks_filtered: AtomicU64,
    snapshots_recorded: AtomicU64,
    pauses_recorded: AtomicU64,
}

impl SamplerState {
    fn attempt(&self) {
        self.total_samples.fetch_add(1, Ordering::Relaxed);
    }

    fn fail(&self, what: &str, error: &crate::error::Error) {
        self.failed_samples.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "{} failed", what);
    }
}

/// Drives a [`ProcessProbe`] on two timers and is the only writer of its
/// [`ProfilerStore`].
pub struct Sampler {
    probe: Arc<dyn ProcessProbe>,
    store: Arc<ProfilerStore>,
    filter: SampleFilter,
    clock: Arc<dyn Clock>,
    cpu_interval: Duration,
    metrics_interval: Duration,
    state: Arc<SamplerState>,
}

/// Control side of a running [`Sampler`]. Cheap to clone.
#[derive(Clone)]
pub struct SamplerHandle {
    probe: Arc<dyn ProcessProbe>,
    store: Arc<ProfilerStore>,
    clock: Arc<dyn Clock>,
    state: Arc<SamplerState>,
}

impl Sampler {
    pub fn new(
        probe: Arc<dyn ProcessProbe>,
        store: Arc<ProfilerStore>,
        config: &SamplingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            store,
            filter: SampleFilter::new(config),
            clock,
            cpu_interval: config.cpu_interval(),
            metrics_interval: config.metrics_interval(),
            state: Arc::new(SamplerState::default()),
        }
    }

    pub fn handle(&self) -> SamplerHandle {
        SamplerHandle {
            probe: self.probe.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
    }

    pub fn spawn(self) -> (SamplerHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Samples until [`SamplerHandle::stop`] is called.
    pub async fn run(self) {
        let capabilities = self.probe.capabilities();
        info!(
            cpu_interval_ms = self.cpu_interval.as_millis() as u64,
            metrics_interval_ms = self.metrics_interval.as_millis() as u64,
            "sampler started"
        );

        let mut cpu_ticker = interval(self.cpu_interval);
        cpu_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut metrics_ticker = interval(self.metrics_interval);
        metrics_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut collector: Option<MetricsCollector> = None;

        while !self.state.stopped.load(Ordering::Acquire) {
            tokio::select! {
                biased;

                _ = self.state.stop.notified() => break,

                _ = metrics_ticker.tick() => {
                    if self.state.paused.load(Ordering::Acquire) {
                        continue;
                    }
                    let resumed = self.state.resumed.swap(false, Ordering::AcqRel);
                    if resumed {
                        self.probe.reset_tracking();
                    }
                    if capabilities.counters {
                        self.sample_metrics(&mut collector, resumed).await;
                    }
                    if capabilities.gc_events {
                        self.sample_pauses().await;
                    }
                }

                _ = cpu_ticker.tick() => {
                    if self.state.paused.load(Ordering::Acquire) || !capabilities.stacks {
                        continue;
                    }
                    self.sample_stacks().await;
                }
            }
        }

        info!(stats = ?self.handle().stats(), "sampler stopped");
    }

    async fn sample_stacks(&self) {
        self.state.attempt();
        let samples = match self.probe.capture_stacks().await {
            Ok(samples) => samples,
            Err(e) => return self.state.fail("stack capture", &e),
        };

        let captured = samples.len();
        let mut kept = 0u64;
        for sample in samples {
            match self.filter.apply(sample) {
                Some(sample) => {
                    self.store.record_stack(sample);
                    kept += 1;
                }
                None => {
                    self.state.stacks_filtered.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.state.stacks_recorded.fetch_add(kept, Ordering::Relaxed);
        debug!(captured, kept, "stack tick");
    }

    async fn sample_metrics(&self, collector: &mut Option<MetricsCollector>, resumed: bool) {
        self.state.attempt();
        let reading = match self.probe.read_counters().await {
            Ok(reading) => reading,
            Err(e) => {
                if resumed {
                    // rebaseline on the next successful read instead
                    self.state.resumed.store(true, Ordering::Release);
                }
                return self.state.fail("counter read", &e);
            }
        };

        if let Some(gc) = reading.collector {
            self.store.set_collector(gc);
        }
        match collector {
            None => {
                *collector = Some(MetricsCollector::new(self.clock.clone(), &reading));
                debug!("metrics baseline established");
            }
            Some(collector) if resumed => {
                collector.reset_tracking(&reading);
                debug!("metrics baseline reset after resume");
            }
            Some(collector) => {
                let snapshot = collector.collect(&reading);
                debug!(
                    cpu = snapshot.cpu_percent,
                    gc = snapshot.gc_percent,
                    heap_used = snapshot.heap_used,
                    "metrics tick"
                );
                self.store.record_metrics(snapshot);
                self.state.snapshots_recorded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn sample_pauses(&self) {
        self.state.attempt();
        match self.probe.poll_gc_events().await {
            Ok(events) => {
                let count = events.len() as u64;
                for event in events {
                    self.store.record_pause(event);
                }
                self.state.pauses_recorded.fetch_add(count, Ordering::Relaxed);
            }
            Err(e) => self.state.fail("gc event poll", &e),
        }
    }
}

impl SamplerHandle {
    pub fn pause(&self) {
        if !self.state.paused.swap(true, Ordering::AcqRel) {
            info!("sampler paused");
        }
    }

    pub fn resume(&self) {
        if self.state.paused.swap(false, Ordering::AcqRel) {
            self.state.resumed.store(true, Ordering::Release);
            info!("sampler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::Release);
        self.state.stop.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }

    pub fn store(&self) -> &Arc<ProfilerStore> {
        &self.store
    }

    pub fn stats(&self) -> SamplerStats {
        let s = &self.state;
        SamplerStats {
            total_samples: s.total_samples.load(Ordering::Relaxed),
            failed_samples: s.failed_samples.load(Ordering::Relaxed),
            stacks_recorded: s.stacks_recorded.load(Ordering::Relaxed),
            stacks_filtered: s.stacks_filtered.load(Ordering::Relaxed),
            snapshots_recorded: s.snapshots_recorded.load(Ordering::Relaxed),
            pauses_recorded: s.pauses_recorded.load(Ordering::Relaxed),
        }
    }

    /// Takes a class histogram now and keeps it in the store. The first
    /// one becomes the leak-detection baseline.
    pub async fn capture_heap_histogram(&self) -> Result<Vec<HeapHistogramSample>> {
        let raw = self.probe.capture_heap_histogram().await?;
        let histogram = HeapHistogram::build(&raw);
        info!(classes = histogram.len(), "heap histogram captured");
        self.store
            .record_heap_histogram(self.clock.now_ms(), histogram.clone());
        Ok(histogram)
    }
}
