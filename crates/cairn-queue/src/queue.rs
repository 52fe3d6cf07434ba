use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Point-in-time queue counters handed to the progress callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueProgress {
    /// Items ever enqueued.
    pub enqueued: u64,
    /// Items currently being processed by a worker.
    pub active: u64,
    /// Items whose processing has finished.
    pub completed: u64,
}

type ProgressCallback = Box<dyn Fn(QueueProgress) + Send + Sync>;

struct QueueState<T> {
    items: VecDeque<T>,
    enqueued: u64,
    active: u64,
    completed: u64,
    next_report: Option<Instant>,
}

impl<T> QueueState<T> {
    fn progress(&self) -> QueueProgress {
        QueueProgress {
            enqueued: self.enqueued,
            active: self.active,
            completed: self.completed,
        }
    }
}

/// Double-ended work queue drained by scoped worker threads.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    changed: Condvar,
    progress_callback: Option<ProgressCallback>,
    progress_interval: Duration,
}

impl<T: Send> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                enqueued: 0,
                active: 0,
                completed: 0,
                next_report: None,
            }),
            changed: Condvar::new(),
            progress_callback: None,
            progress_interval: Duration::from_secs(1),
        }
    }

    /// Install a callback invoked with the queue counters whenever an item
    /// is dequeued or completed, at most once per `interval`.
    ///
    /// The callback runs on a worker thread outside the queue lock.
    pub fn with_progress<F>(mut self, interval: Duration, callback: F) -> Self
    where
        F: Fn(QueueProgress) + Send + Sync + 'static,
    {
        self.progress_interval = interval;
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Add an item ahead of everything currently waiting.
    pub fn enqueue_front(&self, item: T) {
        let mut state = self.lock();
        state.items.push_front(item);
        state.enqueued += 1;
        drop(state);
        self.changed.notify_one();
    }

    /// Add an item behind everything currently waiting.
    pub fn enqueue_back(&self, item: T) {
        let mut state = self.lock();
        state.items.push_back(item);
        state.enqueued += 1;
        drop(state);
        self.changed.notify_one();
    }

    pub fn progress(&self) -> QueueProgress {
        self.lock().progress()
    }

    /// Run `handler` on every item with `parallelism` worker threads and
    /// block until the queue is drained.
    ///
    /// Handlers may enqueue more items. If a handler panics, the remaining
    /// workers still drain the queue and the panic is re-raised once every
    /// worker has exited.
    pub fn process<F>(&self, parallelism: usize, handler: F) -> QueueProgress
    where
        F: Fn(T) + Sync,
    {
        let workers = parallelism.max(1);
        debug!(workers, "processing work queue");
        thread::scope(|scope| {
            for _ in 0..workers {
                let handler = &handler;
                scope.spawn(move || {
                    while let Some(item) = self.dequeue() {
                        let _completion = Completion { queue: self };
                        handler(item);
                    }
                });
            }
        });
        let progress = self.progress();
        self.report(Some(progress));
        progress
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until an item is available or no more can ever arrive.
    fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                state.active += 1;
                let report = self.due_report(&mut state);
                drop(state);
                self.report(report);
                return Some(item);
            }
            if state.active == 0 {
                return None;
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn complete(&self) {
        let mut state = self.lock();
        state.active -= 1;
        state.completed += 1;
        let report = self.due_report(&mut state);
        drop(state);
        // Waiters re-check both "item available" and "nothing active".
        self.changed.notify_all();
        self.report(report);
    }

    fn due_report(&self, state: &mut QueueState<T>) -> Option<QueueProgress> {
        self.progress_callback.as_ref()?;
        let now = Instant::now();
        if state.next_report.is_some_and(|at| now < at) {
            return None;
        }
        state.next_report = Some(now + self.progress_interval);
        Some(state.progress())
    }

    fn report(&self, progress: Option<QueueProgress>) {
        if let (Some(callback), Some(progress)) = (&self.progress_callback, progress) {
            callback(progress);
        }
    }
}

impl<T: Send> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the current item complete when dropped, including during unwind.
struct Completion<'a, T: Send> {
    queue: &'a WorkQueue<T>,
}

impl<T: Send> Drop for Completion<'_, T> {
    fn drop(&mut self) {
        self.queue.complete();
    }
}
