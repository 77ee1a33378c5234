use crate::analysis::heap::HeapHistogramSample;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::Display;

/// A class histogram taken at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub timestamp: i64,
    pub classes: Vec<HeapHistogramSample>,
}

impl HeapSnapshot {
    pub fn new(timestamp: i64, classes: Vec<HeapHistogramSample>) -> Self {
        Self { timestamp, classes }
    }

    pub fn total_bytes(&self) -> u64 {
        self.classes.iter().map(|c| c.total_bytes).sum()
    }

    pub fn total_instances(&self) -> u64 {
        self.classes.iter().map(|c| c.instance_count).sum()
    }

    fn find(&self, class_name: &str) -> Option<&HeapHistogramSample> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
pub enum LeakConfidence {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl LeakConfidence {
    fn from_score(score: u32) -> Self {
        match score {
            80.. => LeakConfidence::Critical,
            60..=79 => LeakConfidence::High,
            40..=59 => LeakConfidence::Medium,
            20..=39 => LeakConfidence::Low,
            _ => LeakConfidence::Unknown,
        }
    }
}

/// What kind of object is piling up, guessed from the class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum LeakKind {
    ClassLoader,
    Thread,
    Collection,
    Cache,
    Listener,
    Array,
    String,
    Object,
}

impl LeakKind {
    pub fn classify(class_name: &str) -> Self {
        let name = class_name.to_lowercase();
        if name.contains("classloader") {
            LeakKind::ClassLoader
        } else if name.contains("thread") {
            LeakKind::Thread
        } else if name.contains("hashmap") || name.contains("map$node") || name.contains("map$entry") {
            LeakKind::Collection
        } else if name.contains("cache") {
            LeakKind::Cache
        } else if name.contains("listener") || name.contains("handler") {
            LeakKind::Listener
        } else if name.starts_with('[') || name.ends_with("[]") {
            LeakKind::Array
        } else if name.contains("string") {
            LeakKind::String
        } else {
            LeakKind::Object
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LeakKind::ClassLoader => "Plugin or module not unloading",
            LeakKind::Thread => "Threads not being cleaned up",
            LeakKind::Collection => "Map or collection growing without bound",
            LeakKind::Cache => "Cache not evicting entries",
            LeakKind::Listener => "Listeners or handlers never removed",
            LeakKind::Array => "Large arrays accumulating",
            LeakKind::String => "String instances accumulating",
            LeakKind::Object => "General object accumulation",
        }
    }
}

/// A class whose instance count grew from the baseline histogram to the
/// latest one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeakSuspect {
    pub class_name: String,
    pub baseline_instances: u64,
    pub current_instances: u64,
    pub baseline_bytes: u64,
    pub current_bytes: u64,
    /// Instances per minute between the first and last histogram that
    /// contain the class.
    pub growth_per_minute: f64,
    /// Histograms the class appeared in.
    pub samples: usize,
    pub first_seen: i64,
    pub last_seen: i64,
    pub confidence: LeakConfidence,
    pub kind: LeakKind,
}

impl LeakSuspect {
    pub fn instance_delta(&self) -> u64 {
        self.current_instances.saturating_sub(self.baseline_instances)
    }

    pub fn bytes_delta(&self) -> i64 {
        self.current_bytes as i64 - self.baseline_bytes as i64
    }

    /// Growth relative to the baseline, in percent; zero without a baseline.
    pub fn relative_growth_percent(&self) -> f64 {
        if self.baseline_instances == 0 {
            return 0.0;
        }
        self.instance_delta() as f64 * 100.0 / self.baseline_instances as f64
    }

    fn score(&self) -> u32 {
        let mut score = match self.samples {
            10.. => 30,
            5..=9 => 20,
            3..=4 => 10,
            _ => 0,
        };

        score += if self.growth_per_minute > 1_000.0 {
            30
        } else if self.growth_per_minute > 100.0 {
            20
        } else if self.growth_per_minute > 10.0 {
            10
        } else {
            0
        };

        let relative = self.relative_growth_percent();
        score += if relative > 200.0 {
            25
        } else if relative > 100.0 {
            15
        } else if relative > 50.0 {
            10
        } else {
            0
        };

        score += match self.instance_delta() {
            10_001.. => 15,
            1_001..=10_000 => 10,
            101..=1_000 => 5,
            _ => 0,
        };
        score
    }
}

#[derive(Debug, Default)]
struct Growth {
    samples: usize,
    first: Option<(i64, u64)>,
    last: Option<(i64, u64)>,
}

impl Growth {
    fn add(&mut self, timestamp: i64, instances: u64) {
        self.samples += 1;
        self.first.get_or_insert((timestamp, instances));
        self.last = Some((timestamp, instances));
    }

    fn per_minute(&self) -> f64 {
        let (Some((t0, n0)), Some((t1, n1))) = (self.first, self.last) else {
            return 0.0;
        };
        let elapsed_ms = t1 - t0;
        if self.samples < 2 || elapsed_ms <= 0 {
            return 0.0;
        }
        (n1 as f64 - n0 as f64) * 60_000.0 / elapsed_ms as f64
    }
}

pub struct LeakDetector;

impl LeakDetector {
    /// Compares the first histogram (the baseline) with the last. Only
    /// classes present in both, with more instances now and a positive
    /// growth rate, are reported: highest confidence first, then fastest
    /// growth.
    pub fn analyze(snapshots: &[HeapSnapshot]) -> Vec<LeakSuspect> {
        let (Some(baseline), Some(latest)) = (snapshots.first(), snapshots.last()) else {
            return Vec::new();
        };
        if snapshots.len() < 2 {
            return Vec::new();
        }

        let mut growth: HashMap<&str, Growth> = HashMap::new();
        for snapshot in snapshots {
            for class in &snapshot.classes {
                growth
                    .entry(class.class_name.as_str())
                    .or_default()
                    .add(snapshot.timestamp, class.instance_count);
            }
        }

        let mut suspects: Vec<LeakSuspect> = baseline
            .classes
            .iter()
            .filter_map(|before| {
                let now = latest.find(&before.class_name)?;
                let tracker = growth.get(before.class_name.as_str())?;
                let rate = tracker.per_minute();
                if rate <= 0.0 || now.instance_count <= before.instance_count {
                    return None;
                }

                let mut suspect = LeakSuspect {
                    class_name: before.class_name.clone(),
                    baseline_instances: before.instance_count,
                    current_instances: now.instance_count,
                    baseline_bytes: before.total_bytes,
                    current_bytes: now.total_bytes,
                    growth_per_minute: rate,
                    samples: tracker.samples,
                    first_seen: tracker.first.map(|(t, _)| t).unwrap_or(baseline.timestamp),
                    last_seen: tracker.last.map(|(t, _)| t).unwrap_or(latest.timestamp),
                    confidence: LeakConfidence::Unknown,
                    kind: LeakKind::classify(&before.class_name),
                };
                suspect.confidence = LeakConfidence::from_score(suspect.score());
                Some(suspect)
            })
            .collect();

        suspects.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| b.growth_per_minute.total_cmp(&a.growth_per_minute))
                .then_with(|| a.class_name.cmp(&b.class_name))
        });
        suspects
    }
}
