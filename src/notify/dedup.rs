use std::collections::HashSet;
use std::collections::VecDeque;

use super::DedupKey;

/// Remembers the most recent `capacity` event identities.
#[derive(Debug)]
pub(crate) struct DedupWindow {
    seen: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
    capacity: usize,
}

impl DedupWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `false` if `key` was already seen.
    pub(crate) fn insert(
        &mut self,
        key: DedupKey,
    ) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }
}
