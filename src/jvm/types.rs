use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Package name used for frames whose class lives in the unnamed package.
pub const DEFAULT_PACKAGE: &str = "<default>";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display,
)]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

impl ThreadState {
    pub fn from_jvm_name(name: &str) -> Self {
        match name {
            "NEW" => ThreadState::New,
            "BLOCKED" => ThreadState::Blocked,
            "WAITING" => ThreadState::Waiting,
            "TIMED_WAITING" => ThreadState::TimedWaiting,
            "TERMINATED" => ThreadState::Terminated,
            _ => ThreadState::Runnable,
        }
    }
}

/// One method on a captured call stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frame {
    pub method_name: String,
    pub class_name: String,
    pub package_name: String,
}

impl Frame {
    pub fn new(
        package_name: impl Into<String>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            class_name: class_name.into(),
            package_name: package_name.into(),
        }
    }

    /// Splits a fully qualified class name and pairs it with `method_name`.
    pub fn from_qualified(qualified_class: &str, method_name: &str) -> Self {
        let (package_name, class_name) = split_class_name(qualified_class);
        Self::new(package_name, class_name, method_name)
    }

    /// Parses `pkg.Class.method`; the last segment is the method.
    pub fn parse(qualified_method: &str) -> Self {
        match qualified_method.rsplit_once('.') {
            Some((class, method)) => Self::from_qualified(class, method),
            None => Self::new("", "", qualified_method),
        }
    }

    pub fn qualified_class(&self) -> String {
        if self.package_name.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.class_name)
        }
    }

    pub fn package_or_default(&self) -> &str {
        if self.package_name.is_empty() {
            DEFAULT_PACKAGE
        } else {
            &self.package_name
        }
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.qualified_class(), self.method_name)
    }
}

/// Splits `a.b.C` into `("a.b", "C")`. Array descriptors and names
/// without a dot land entirely in the simple name.
pub fn split_class_name(qualified: &str) -> (&str, &str) {
    if qualified.starts_with('[') {
        return ("", qualified);
    }
    match qualified.rsplit_once('.') {
        Some((package, class)) => (package, class),
        None => ("", qualified),
    }
}

/// A single thread's call stack at a sampling instant.
///
/// `frames` are leaf-first: index 0 is the executing method, the last
/// entry is the thread's entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackSample {
    pub thread_id: u64,
    pub thread_name: String,
    pub thread_state: ThreadState,
    pub captured_at: i64,
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub cpu_time_ns: Option<u64>,
}

impl StackSample {
    pub fn leaf(&self) -> Option<&Frame> {
        self.frames.first()
    }
}

/// Point-in-time resource measurement. Max fields use `-1` for unbounded
/// or unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSnapshot {
    pub timestamp: i64,
    pub cpu_percent: f64,
    pub gc_percent: f64,
    pub gc_count: u64,
    pub gc_time_ms: u64,
    pub heap_used: u64,
    pub heap_committed: u64,
    pub heap_max: i64,
    pub metaspace_used: u64,
    pub metaspace_committed: u64,
    pub metaspace_max: i64,
    pub thread_count: u32,
    pub daemon_thread_count: u32,
    pub peak_thread_count: u32,
    pub code_cache_used: u64,
    pub code_cache_max: i64,
}

impl MetricSnapshot {
    pub fn heap_utilization(&self) -> f64 {
        utilization(self.heap_used, self.heap_max)
    }

    pub fn metaspace_utilization(&self) -> f64 {
        utilization(self.metaspace_used, self.metaspace_max)
    }

    pub fn code_cache_utilization(&self) -> f64 {
        utilization(self.code_cache_used, self.code_cache_max)
    }
}

/// Percentage of `used` against `max`, clamped to `[0, 100]`; `-1.0` when
/// `max` is not positive.
pub fn utilization(used: u64, max: i64) -> f64 {
    if max <= 0 {
        return -1.0;
    }
    (used as f64 * 100.0 / max as f64).clamp(0.0, 100.0)
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display,
    EnumIter,
)]
pub enum GcType {
    Young,
    Old,
    Mixed,
}

impl GcType {
    /// Classifies a collector by its JVM name and action string.
    pub fn classify(gc_name: &str, gc_action: &str) -> Self {
        let name = gc_name.to_lowercase();
        if name.contains("mixed") {
            return GcType::Mixed;
        }
        if name.contains("young")
            || name.contains("scavenge")
            || name.contains("parnew")
            || name.contains("copy")
            || gc_action.contains("minor")
        {
            return GcType::Young;
        }
        GcType::Old
    }
}

/// The collector a JVM runs with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum GcCollector {
    Serial,
    Parallel,
    ConcurrentMarkSweep,
    G1,
    Z,
    Shenandoah,
}

impl GcCollector {
    /// Recognises the heap region headers printed by `GC.heap_info`.
    pub fn from_heap_info_line(line: &str) -> Option<Self> {
        let line = line.trim_start();
        if line.starts_with("garbage-first heap") {
            Some(GcCollector::G1)
        } else if line.starts_with("PSYoungGen") || line.starts_with("ParOldGen") {
            Some(GcCollector::Parallel)
        } else if line.starts_with("par new generation")
            || line.starts_with("concurrent mark-sweep generation")
        {
            Some(GcCollector::ConcurrentMarkSweep)
        } else if line.starts_with("def new generation") || line.starts_with("tenured generation") {
            Some(GcCollector::Serial)
        } else if line.starts_with("ZHeap") {
            Some(GcCollector::Z)
        } else if line.starts_with("Shenandoah Heap") {
            Some(GcCollector::Shenandoah)
        } else {
            None
        }
    }
}

/// One garbage-collection cycle as reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GcPauseEvent {
    pub gc_type: GcType,
    pub gc_name: String,
    pub gc_action: String,
    pub gc_cause: String,
    pub pause_duration_ms: u64,
    pub memory_freed_bytes: u64,
    pub memory_freed_percent: f64,
    pub timestamp: i64,
}

impl GcPauseEvent {
    /// Builds an event from before/after usage figures, deriving the
    /// freed amount and its share of `max_bytes`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_usage(
        timestamp: i64,
        gc_name: impl Into<String>,
        gc_action: impl Into<String>,
        gc_cause: impl Into<String>,
        pause_duration_ms: u64,
        used_before: u64,
        used_after: u64,
        max_bytes: u64,
    ) -> Self {
        let gc_name = gc_name.into();
        let gc_action = gc_action.into();
        let memory_freed_bytes = used_before.saturating_sub(used_after);
        let memory_freed_percent = if max_bytes > 0 {
            memory_freed_bytes as f64 * 100.0 / max_bytes as f64
        } else {
            0.0
        };

        Self {
            gc_type: GcType::classify(&gc_name, &gc_action),
            gc_name,
            gc_action,
            gc_cause: gc_cause.into(),
            pause_duration_ms,
            memory_freed_bytes,
            memory_freed_percent,
            timestamp,
        }
    }
}

/// A row of a heap walk, before aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawClassEntry {
    pub class_name: String,
    pub instance_count: u64,
    pub total_bytes: u64,
}

impl RawClassEntry {
    pub fn new(class_name: impl Into<String>, instance_count: u64, total_bytes: u64) -> Self {
        Self {
            class_name: class_name.into(),
            instance_count,
            total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_parse() {
        let frame = Frame::parse("com.example.app.Worker.run");
        assert_eq!(frame, Frame::new("com.example.app", "Worker", "run"));
        assert_eq!(frame.to_string(), "com.example.app.Worker.run");

        let bare = Frame::parse("Main.main");
        assert_eq!(bare.package_name, "");
        assert_eq!(bare.package_or_default(), DEFAULT_PACKAGE);
        assert_eq!(bare.to_string(), "Main.main");
    }

    #[test]
    fn test_split_array_class() {
        assert_eq!(split_class_name("[B"), ("", "[B"));
        assert_eq!(
            split_class_name("[Ljava.lang.Object;"),
            ("", "[Ljava.lang.Object;")
        );
        assert_eq!(split_class_name("java.util.HashMap$Node"), ("java.util", "HashMap$Node"));
    }

    #[test]
    fn test_utilization_sentinels() {
        assert_eq!(utilization(50, 200), 25.0);
        assert_eq!(utilization(500, 200), 100.0);
        assert_eq!(utilization(50, 0), -1.0);
        assert_eq!(utilization(50, -1), -1.0);
    }

    #[test]
    fn test_gc_type_classification() {
        assert_eq!(GcType::classify("G1 Young Generation", "end of minor GC"), GcType::Young);
        assert_eq!(GcType::classify("PS Scavenge", ""), GcType::Young);
        assert_eq!(GcType::classify("G1 Mixed Generation", ""), GcType::Mixed);
        assert_eq!(GcType::classify("G1 Old Generation", "end of major GC"), GcType::Old);
    }

    #[test]
    fn test_pause_event_from_usage() {
        let event = GcPauseEvent::from_usage(
            1_000,
            "G1 Young Generation",
            "end of minor GC",
            "G1 Evacuation Pause",
            12,
            800,
            300,
            1_000,
        );
        assert_eq!(event.gc_type, GcType::Young);
        assert_eq!(event.memory_freed_bytes, 500);
        assert_eq!(event.memory_freed_percent, 50.0);

        let grew = GcPauseEvent::from_usage(0, "x", "", "", 1, 100, 200, 0);
        assert_eq!(grew.memory_freed_bytes, 0);
        assert_eq!(grew.memory_freed_percent, 0.0);
    }

    #[test]
    fn test_collector_from_heap_info() {
        let detect = GcCollector::from_heap_info_line;
        assert_eq!(detect(" garbage-first heap   total 262144K, used 1K"), Some(GcCollector::G1));
        assert_eq!(detect(" PSYoungGen      total 76288K, used 3932K"), Some(GcCollector::Parallel));
        assert_eq!(detect(" def new generation   total 9216K, used 1K"), Some(GcCollector::Serial));
        assert_eq!(detect(" par new generation   total 9216K, used 1K"), Some(GcCollector::ConcurrentMarkSweep));
        assert_eq!(detect(" ZHeap           used 8M, capacity 256M"), Some(GcCollector::Z));
        assert_eq!(detect(" Shenandoah Heap"), Some(GcCollector::Shenandoah));
        assert_eq!(detect(" Metaspace       used 48211K"), None);
    }

    #[test]
    fn test_thread_state_from_jvm_name() {
        assert_eq!(ThreadState::from_jvm_name("TIMED_WAITING"), ThreadState::TimedWaiting);
        assert_eq!(ThreadState::from_jvm_name("RUNNABLE"), ThreadState::Runnable);
        assert_eq!(ThreadState::from_jvm_name("bogus"), ThreadState::Runnable);
    }
}
