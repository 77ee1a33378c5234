use crate::jvm::types::{Frame, StackSample, ThreadState};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodKey {
    pub package_name: String,
    pub class_name: String,
    pub method_name: String,
}

impl From<&Frame> for MethodKey {
    fn from(frame: &Frame) -> Self {
        Self {
            package_name: frame.package_or_default().to_string(),
            class_name: frame.class_name.clone(),
            method_name: frame.method_name.clone(),
        }
    }
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.package_name, self.class_name, self.method_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodStats {
    pub method: MethodKey,
    /// Samples where this method was the executing frame.
    pub self_samples: u64,
    /// Samples where this method was anywhere on the stack.
    pub total_samples: u64,
    pub self_time_percent: f64,
    pub total_time_percent: f64,
    pub thread_samples: BTreeMap<u64, u64>,
}

impl MethodStats {
    fn new(method: MethodKey) -> Self {
        Self {
            method,
            self_samples: 0,
            total_samples: 0,
            self_time_percent: 0.0,
            total_time_percent: 0.0,
            thread_samples: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadStats {
    pub thread_id: u64,
    pub thread_name: String,
    pub sample_count: u64,
    /// Highest cumulative CPU time reported for the thread, in ns.
    pub total_cpu_time_estimate: u64,
    pub states: BTreeMap<ThreadState, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageStats {
    pub package_name: String,
    pub total_samples: u64,
    pub self_samples: u64,
    pub method_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuAnalysis {
    pub total_samples: u64,
    pub time_range: Option<TimeRange>,
    #[serde(serialize_with = "serialize_values")]
    pub methods: HashMap<MethodKey, MethodStats>,
    pub thread_breakdown: BTreeMap<u64, ThreadStats>,
    pub packages: BTreeMap<String, PackageStats>,
}

fn serialize_values<S: Serializer>(
    methods: &HashMap<MethodKey, MethodStats>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut values: Vec<&MethodStats> = methods.values().collect();
    values.sort_by(|a, b| a.method.cmp(&b.method));
    serializer.collect_seq(values)
}

impl CpuAnalysis {
    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    /// Highest `total_samples` first, then `self_samples`, then name.
    pub fn top_methods(&self, count: usize) -> Vec<&MethodStats> {
        let mut methods: Vec<&MethodStats> = self.methods.values().collect();
        methods.sort_by(|a, b| {
            b.total_samples
                .cmp(&a.total_samples)
                .then(b.self_samples.cmp(&a.self_samples))
                .then_with(|| a.method.cmp(&b.method))
        });
        methods.truncate(count);
        methods
    }

    /// Methods ranked by self time, for "where is the CPU actually spent".
    pub fn top_self_methods(&self, count: usize) -> Vec<&MethodStats> {
        let mut methods: Vec<&MethodStats> = self.methods.values().collect();
        methods.sort_by(|a, b| {
            b.self_samples
                .cmp(&a.self_samples)
                .then(b.total_samples.cmp(&a.total_samples))
                .then_with(|| a.method.cmp(&b.method))
        });
        methods.truncate(count);
        methods
    }

    pub fn top_packages(&self, count: usize) -> Vec<&PackageStats> {
        let mut packages: Vec<&PackageStats> = self.packages.values().collect();
        packages.sort_by(|a, b| {
            b.total_samples
                .cmp(&a.total_samples)
                .then(b.self_samples.cmp(&a.self_samples))
                .then_with(|| a.package_name.cmp(&b.package_name))
        });
        packages.truncate(count);
        packages
    }

    pub fn top_threads(&self, count: usize) -> Vec<&ThreadStats> {
        let mut threads: Vec<&ThreadStats> = self.thread_breakdown.values().collect();
        threads.sort_by(|a, b| {
            b.sample_count
                .cmp(&a.sample_count)
                .then(a.thread_id.cmp(&b.thread_id))
        });
        threads.truncate(count);
        threads
    }
}

/// Aggregates stack samples into method, thread and package tables.
pub struct HotspotAnalyzer;

impl HotspotAnalyzer {
    /// Samples without frames are ignored: they have no leaf to charge.
    pub fn analyze(samples: &[StackSample]) -> CpuAnalysis {
        let mut analysis = CpuAnalysis::default();

        for sample in samples {
            let Some(leaf) = sample.leaf() else {
                continue;
            };
            analysis.total_samples += 1;

            analysis.time_range = Some(match analysis.time_range {
                Some(range) => TimeRange {
                    start: range.start.min(sample.captured_at),
                    end: range.end.max(sample.captured_at),
                },
                None => TimeRange {
                    start: sample.captured_at,
                    end: sample.captured_at,
                },
            });

            let leaf_key = MethodKey::from(leaf);
            analysis
                .methods
                .entry(leaf_key.clone())
                .or_insert_with(|| MethodStats::new(leaf_key))
                .self_samples += 1;

            // Recursion: a method counts once per sample toward its total.
            let mut on_stack = HashSet::new();
            for frame in &sample.frames {
                let key = MethodKey::from(frame);
                if !on_stack.insert(key.clone()) {
                    continue;
                }
                let stats = analysis
                    .methods
                    .entry(key.clone())
                    .or_insert_with(|| MethodStats::new(key));
                stats.total_samples += 1;
                *stats.thread_samples.entry(sample.thread_id).or_insert(0) += 1;
            }

            let thread = analysis
                .thread_breakdown
                .entry(sample.thread_id)
                .or_insert_with(|| ThreadStats {
                    thread_id: sample.thread_id,
                    thread_name: sample.thread_name.clone(),
                    sample_count: 0,
                    total_cpu_time_estimate: 0,
                    states: BTreeMap::new(),
                });
            thread.sample_count += 1;
            *thread.states.entry(sample.thread_state).or_insert(0) += 1;
            if let Some(cpu_time) = sample.cpu_time_ns {
                thread.total_cpu_time_estimate = thread.total_cpu_time_estimate.max(cpu_time);
            }
        }

        if analysis.total_samples == 0 {
            return analysis;
        }

        let total = analysis.total_samples as f64;
        for stats in analysis.methods.values_mut() {
            stats.self_time_percent = stats.self_samples as f64 * 100.0 / total;
            stats.total_time_percent = stats.total_samples as f64 * 100.0 / total;
        }

        analysis.packages = aggregate_packages(&analysis.methods);
        analysis
    }
}

fn aggregate_packages(methods: &HashMap<MethodKey, MethodStats>) -> BTreeMap<String, PackageStats> {
    let mut packages: BTreeMap<String, PackageStats> = BTreeMap::new();
    let mut distinct: BTreeMap<&str, BTreeSet<&MethodKey>> = BTreeMap::new();

    for (key, stats) in methods {
        let package = packages
            .entry(key.package_name.clone())
            .or_insert_with(|| PackageStats {
                package_name: key.package_name.clone(),
                total_samples: 0,
                self_samples: 0,
                method_count: 0,
            });
        package.total_samples += stats.total_samples;
        package.self_samples += stats.self_samples;
        distinct.entry(&key.package_name).or_default().insert(key);
    }

    for (name, keys) in distinct {
        if let Some(package) = packages.get_mut(name) {
            package.method_count = keys.len();
        }
    }

    packages
}
