//! At-most-once scheduling of object ids within a run.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cairn_types::ObjectId;

/// Records which object ids have already been scheduled.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: Mutex<HashSet<ObjectId>>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as scheduled. Returns `true` exactly once per id: the
    /// caller that gets `true` must enqueue it, every later caller skips it.
    pub fn should_enqueue(&self, id: ObjectId) -> bool {
        self.lock().insert(id)
    }

    /// Number of distinct ids scheduled so far.
    pub fn seen_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ObjectId>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn first_sighting_wins() {
        let tracker = DedupTracker::new();
        let id = ObjectId::from_hash([1; 32]);
        assert!(tracker.should_enqueue(id));
        assert!(!tracker.should_enqueue(id));
        assert!(tracker.should_enqueue(ObjectId::from_hash([2; 32])));
        assert_eq!(tracker.seen_count(), 2);
    }

    #[test]
    fn concurrent_callers_admit_each_id_once() {
        let tracker = DedupTracker::new();
        let admitted = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..64u8 {
                        if tracker.should_enqueue(ObjectId::from_hash([i; 32])) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });
        assert_eq!(admitted.load(Ordering::SeqCst), 64);
        assert_eq!(tracker.seen_count(), 64);
    }
}
