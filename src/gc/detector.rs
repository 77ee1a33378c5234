use crate::jvm::types::GcPauseEvent;
use serde::{Deserialize, Serialize};

/// Cumulative collection counters as reported by `jstat -gcutil`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcCounters {
    pub young_count: u64,
    pub young_time_ms: u64,
    pub old_count: u64,
    pub old_time_ms: u64,
}

impl GcCounters {
    pub fn total_count(&self) -> u64 {
        self.young_count + self.old_count
    }

    pub fn total_time_ms(&self) -> u64 {
        self.young_time_ms + self.old_time_ms
    }
}

const YOUNG_GC_NAME: &str = "Young Generation";
const OLD_GC_NAME: &str = "Old Generation";
const YOUNG_GC_ACTION: &str = "end of minor GC";
const OLD_GC_ACTION: &str = "end of major GC";
const POLLED_CAUSE: &str = "Unknown";

/// Turns successive counter readings into pause events.
///
/// Every collection counted between two readings yields one event. The
/// interval's pause time is split evenly across them, the remainder going
/// to the last, so the durations sum to the time delta exactly.
#[derive(Debug, Default)]
pub struct GcEventDetector {
    previous: Option<GcCounters>,
}

impl GcEventDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: GcCounters, timestamp: i64) -> Vec<GcPauseEvent> {
        let Some(previous) = self.previous.replace(current) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        push_collections(
            &mut events,
            (previous.young_count, current.young_count),
            (previous.young_time_ms, current.young_time_ms),
            YOUNG_GC_NAME,
            YOUNG_GC_ACTION,
            timestamp,
        );
        push_collections(
            &mut events,
            (previous.old_count, current.old_count),
            (previous.old_time_ms, current.old_time_ms),
            OLD_GC_NAME,
            OLD_GC_ACTION,
            timestamp,
        );
        events
    }

    /// Forgets the baseline; the next reading only re-establishes it.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

fn push_collections(
    events: &mut Vec<GcPauseEvent>,
    (count_before, count_after): (u64, u64),
    (time_before, time_after): (u64, u64),
    gc_name: &str,
    gc_action: &str,
    timestamp: i64,
) {
    // a counter going backwards means the JVM restarted
    let Some(collections) = count_after.checked_sub(count_before).filter(|c| *c > 0) else {
        return;
    };
    let elapsed = time_after.saturating_sub(time_before);
    let each = elapsed / collections;
    let remainder = elapsed % collections;

    for i in 0..collections {
        let duration = if i + 1 == collections { each + remainder } else { each };
        events.push(GcPauseEvent::from_usage(
            timestamp,
            gc_name,
            gc_action,
            POLLED_CAUSE,
            duration,
            0,
            0,
            0,
        ));
    }
}
