//! User-facing feedback and delayed re-arming of capture.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Error,
    Info,
}

/// A message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Info,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutcomeKind::Error
    }
}

/// Identifies one shown message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedbackHandle(u64);

impl FeedbackHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Whatever actually renders messages (toast, snackbar, terminal).
pub trait Notifier: Send + Sync {
    fn notify(&self, handle: FeedbackHandle, outcome: &Outcome);
}

pub struct FeedbackChannel {
    notifier: Arc<dyn Notifier>,
    next_handle: AtomicU64,
}

impl FeedbackChannel {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            next_handle: AtomicU64::new(1),
        }
    }

    /// Show a single message.
    pub fn show(&self, outcome: Outcome) -> FeedbackHandle {
        let handle = FeedbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        match outcome.kind {
            OutcomeKind::Error => {
                warn!(handle = handle.0, message = %outcome.message, "feedback: error")
            }
            _ => info!(handle = handle.0, kind = ?outcome.kind, message = %outcome.message, "feedback"),
        }
        self.notifier.notify(handle, &outcome);
        handle
    }

    /// Run `re_arm` after `delay` unless `liveness` is cancelled first.
    ///
    /// The token belongs to the owner being re-armed, not to the timer:
    /// cancelling it at teardown stops every pending re-arm for that owner.
    pub fn schedule_re_arm<F>(
        &self,
        delay: Duration,
        liveness: CancellationToken,
        re_arm: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = liveness.cancelled() => {
                    debug!("re-arm cancelled: owner torn down");
                }
                _ = tokio::time::sleep(delay) => {
                    if liveness.is_cancelled() {
                        debug!("re-arm skipped: owner torn down");
                        return;
                    }
                    re_arm();
                }
            }
        })
    }
}
