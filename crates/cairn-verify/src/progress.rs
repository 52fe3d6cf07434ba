//! Progress lines and completion estimates.

use std::fmt;
use std::time::Duration;

use cairn_queue::QueueProgress;
use chrono::{DateTime, Local};

/// Timestamp format used in progress lines and snapshot labels.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// A status line for one progress callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressReport {
    pub enqueued: u64,
    pub active: u64,
    pub completed: u64,
    /// Projected time left; `None` until there is enough signal.
    pub remaining: Option<Duration>,
    pub eta: Option<DateTime<Local>>,
}

/// Project completion from the queue counters.
///
/// An estimate is only made once more than a second has elapsed and at
/// least one item has been both enqueued and completed. The projection
/// assumes the completed fraction of enqueued items grows linearly.
pub fn estimate(
    progress: QueueProgress,
    started_at: DateTime<Local>,
    elapsed: Duration,
) -> ProgressReport {
    let mut report = ProgressReport {
        enqueued: progress.enqueued,
        active: progress.active,
        completed: progress.completed,
        remaining: None,
        eta: None,
    };

    if elapsed <= Duration::from_secs(1) || progress.enqueued == 0 || progress.completed == 0 {
        return report;
    }

    let ratio = progress.completed as f64 / progress.enqueued as f64;
    let predicted = Duration::from_secs((elapsed.as_secs_f64() / ratio) as u64);
    let Some(remaining) = predicted.checked_sub(elapsed).filter(|d| !d.is_zero()) else {
        return report;
    };
    let Ok(predicted) = chrono::Duration::from_std(predicted) else {
        return report;
    };

    report.remaining = Some(Duration::from_secs(remaining.as_secs()));
    report.eta = started_at.checked_add_signed(predicted);
    report
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} objects, verifying {}, completed {} objects",
            self.enqueued, self.active, self.completed
        )?;
        if let (Some(remaining), Some(eta)) = (self.remaining, self.eta) {
            write!(
                f,
                " remaining {} (ETA {})",
                format_duration(remaining),
                eta.format(TIME_FORMAT)
            )?;
        }
        write!(f, ".")
    }
}

/// Render whole seconds as `1h2m3s`, `4m5s` or `6s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
