//! Parallel work scheduling for cairn.
//!
//! [`WorkQueue`] is a double-ended queue drained by a bounded pool of worker
//! threads. Work items may enqueue further items while they run; items
//! pushed to the front are taken before anything already waiting, items
//! pushed to the back after it. Processing ends when the queue is empty and
//! no worker is still running an item that could produce more.

pub mod queue;

pub use queue::{QueueProgress, WorkQueue};
