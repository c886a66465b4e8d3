//! Per-asset position polling
//!
//! The poll loop itself runs in `AssetHandle`; this keeps its task handle
//! and generation so a stopped loop can never fire again.

use std::time::Duration;

use crate::runtime::TaskHandle;

/// Interval between two position polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay before the first poll after play/loop/resume
pub const POLL_WARM_UP: Duration = Duration::from_millis(100);

/// Round to the poll granularity (0.1 s)
pub fn round_to_tenth(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

#[derive(Debug, Default)]
pub struct PositionPoller {
    task: Option<TaskHandle>,
    generation: u64,
}

impl PositionPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop any running loop and return the generation for a new one
    pub fn begin(&mut self) -> u64 {
        self.stop();
        self.generation
    }

    pub fn attach(&mut self, generation: u64, task: TaskHandle) {
        if self.generation == generation {
            self.task = Some(task);
        } else {
            task.cancel();
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.task.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the loop and drop its timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        self.generation += 1;
    }
}
