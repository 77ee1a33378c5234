use crate::jvm::types::{split_class_name, RawClassEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapHistogramSample {
    pub class_name: String,
    pub simple_name: String,
    pub package_name: String,
    pub instance_count: u64,
    pub total_bytes: u64,
    /// Share of the sampled heap, not of the configured maximum.
    pub percent_of_heap: f64,
}

impl HeapHistogramSample {
    pub fn average_size(&self) -> u64 {
        if self.instance_count == 0 {
            0
        } else {
            self.total_bytes / self.instance_count
        }
    }

    pub fn percent_of(&self, total_heap_bytes: u64) -> f64 {
        if total_heap_bytes == 0 {
            0.0
        } else {
            self.total_bytes as f64 * 100.0 / total_heap_bytes as f64
        }
    }
}

pub struct HeapHistogram;

impl HeapHistogram {
    /// Largest classes first; equal sizes fall back to class name.
    pub fn build(entries: &[RawClassEntry]) -> Vec<HeapHistogramSample> {
        let total: u64 = entries.iter().map(|e| e.total_bytes).sum();

        let mut samples: Vec<HeapHistogramSample> = entries
            .iter()
            .map(|entry| {
                let (package_name, simple_name) = split_class_name(&entry.class_name);
                let mut sample = HeapHistogramSample {
                    class_name: entry.class_name.clone(),
                    simple_name: simple_name.to_string(),
                    package_name: package_name.to_string(),
                    instance_count: entry.instance_count,
                    total_bytes: entry.total_bytes,
                    percent_of_heap: 0.0,
                };
                sample.percent_of_heap = sample.percent_of(total);
                sample
            })
            .collect();

        samples.sort_by(|a, b| {
            b.total_bytes
                .cmp(&a.total_bytes)
                .then_with(|| a.class_name.cmp(&b.class_name))
        });
        samples
    }

    pub fn total_bytes(samples: &[HeapHistogramSample]) -> u64 {
        samples.iter().map(|s| s.total_bytes).sum()
    }

    pub fn total_instances(samples: &[HeapHistogramSample]) -> u64 {
        samples.iter().map(|s| s.instance_count).sum()
    }
}
