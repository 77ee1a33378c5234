use crate::config::SamplingConfig;
use crate::jvm::types::{Frame, StackSample, ThreadState};

const SYSTEM_PACKAGE_PREFIXES: &[&str] = &["java.", "javax.", "sun.", "com.sun.", "jdk."];

/// Decides which captured stacks are kept, and trims the ones that are.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    max_stack_depth: usize,
    only_runnable: bool,
    filter_system_frames: bool,
    include_packages: Vec<String>,
    exclude_packages: Vec<String>,
}

impl SampleFilter {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            max_stack_depth: config.max_stack_depth,
            only_runnable: config.only_runnable,
            filter_system_frames: config.filter_system_frames,
            include_packages: config.include_packages.clone(),
            exclude_packages: config.exclude_packages.clone(),
        }
    }

    /// Returns the sample to store, or `None` when it is filtered out.
    pub fn apply(&self, mut sample: StackSample) -> Option<StackSample> {
        if sample.frames.is_empty() {
            return None;
        }
        if self.only_runnable && sample.thread_state != ThreadState::Runnable {
            return None;
        }
        if self.filter_system_frames && sample.frames.iter().all(is_system_frame) {
            return None;
        }
        if !self.include_packages.is_empty()
            && !sample
                .frames
                .iter()
                .any(|f| matches_any(f, &self.include_packages))
        {
            return None;
        }
        if let Some(leaf) = sample.leaf() {
            if matches_any(leaf, &self.exclude_packages) {
                return None;
            }
        }

        // frames are leaf-first, so truncation drops the outermost callers
        sample.frames.truncate(self.max_stack_depth);
        Some(sample)
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new(&SamplingConfig::default())
    }
}

fn is_system_frame(frame: &Frame) -> bool {
    let class = frame.qualified_class();
    SYSTEM_PACKAGE_PREFIXES.iter().any(|p| class.starts_with(p))
}

fn matches_any(frame: &Frame, prefixes: &[String]) -> bool {
    let class = frame.qualified_class();
    prefixes.iter().any(|p| class.starts_with(p.as_str()))
}
