//! Pause and cancel signals for one running task.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Returned from a checkpoint once the task has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cooperative control shared by the pipeline, its fan-out units and the
/// control surface. Pausing closes a watch-channel gate; checkpoints wait on
/// the gate and return early on cancellation.
#[derive(Debug, Clone)]
pub struct TaskControl {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self { cancel: CancellationToken::new(), paused: Arc::new(paused) }
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits while paused. Errs if the task is, or becomes, cancelled.
    pub async fn checkpoint(&self) -> Result<(), Cancelled> {
        let mut gate = self.paused.subscribe();
        loop {
            if self.cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if !*gate.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Cancelled),
                changed = gate.changed() => {
                    // Sender lives in self, so this cannot close while we wait
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
