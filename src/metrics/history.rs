use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;

/// Fixed-capacity history that overwrites its oldest entry once full.
///
/// Every operation takes the same lock, so one sampling thread can push
/// while any number of readers take snapshots.
pub struct BoundedHistory<T> {
    capacity: usize,
    inner: Mutex<Slots<T>>,
}

struct Slots<T> {
    items: Vec<Option<T>>,
    head: usize,
    len: usize,
    total_written: u64,
    dropped: u64,
}

impl<T> Slots<T> {
    /// Index of the oldest retained item.
    fn start(&self, capacity: usize) -> usize {
        (self.head + capacity - self.len) % capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub capacity: usize,
    pub len: usize,
    pub total_written: u64,
    pub dropped: u64,
    pub is_full: bool,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "history capacity must be positive".to_string(),
            ));
        }

        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, || None);

        Ok(Self {
            capacity,
            inner: Mutex::new(Slots {
                items,
                head: 0,
                len: 0,
                total_written: 0,
                dropped: 0,
            }),
        })
    }

    pub fn push(&self, item: T) {
        let mut slots = self.inner.lock();
        let head = slots.head;
        slots.items[head] = Some(item);
        slots.head = (head + 1) % self.capacity;
        if slots.len == self.capacity {
            slots.dropped += 1;
        } else {
            slots.len += 1;
        }
        slots.total_written += 1;
    }

    /// All retained items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let slots = self.inner.lock();
        self.collect_from(&slots, slots.len)
    }

    /// The newest `min(n, len)` items, oldest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let slots = self.inner.lock();
        self.collect_from(&slots, n.min(slots.len))
    }

    pub fn latest(&self) -> Option<T> {
        let slots = self.inner.lock();
        if slots.len == 0 {
            return None;
        }
        let last = (slots.head + self.capacity - 1) % self.capacity;
        slots.items[last].clone()
    }

    /// Visits retained items oldest first without copying them out.
    pub fn for_each<F: FnMut(&T)>(&self, mut f: F) {
        let slots = self.inner.lock();
        let start = slots.start(self.capacity);
        for i in 0..slots.len {
            if let Some(item) = &slots.items[(start + i) % self.capacity] {
                f(item);
            }
        }
    }

    fn collect_from(&self, slots: &Slots<T>, count: usize) -> Vec<T> {
        let skip = slots.len - count;
        let start = (slots.start(self.capacity) + skip) % self.capacity;
        (0..count)
            .filter_map(|i| slots.items[(start + i) % self.capacity].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().len == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().len == self.capacity
    }

    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }

    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn stats(&self) -> HistoryStats {
        let slots = self.inner.lock();
        HistoryStats {
            capacity: self.capacity,
            len: slots.len,
            total_written: slots.total_written,
            dropped: slots.dropped,
            is_full: slots.len == self.capacity,
        }
    }

    /// Empties the history, keeping the backing storage.
    pub fn clear(&self) {
        let mut slots = self.inner.lock();
        slots.items.iter_mut().for_each(|slot| *slot = None);
        slots.head = 0;
        slots.len = 0;
        slots.total_written = 0;
        slots.dropped = 0;
    }
}

impl<T: Clone> std::fmt::Debug for BoundedHistory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("BoundedHistory")
            .field("len", &stats.len)
            .field("capacity", &stats.capacity)
            .field("dropped", &stats.dropped)
            .finish()
    }
}
