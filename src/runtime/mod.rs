//! Serialized execution context and timers
//!
//! Every operation that touches a playback channel runs on one serialized
//! context. Timers (fade steps, position polls, delayed plays) may fire on a
//! separate thread, but their callbacks are always marshalled back onto that
//! context before they run.
//!
//! ```text
//!  caller thread ──call()──┐
//!  backend signal ─dispatch┤        ┌──────────────┐
//!                          ├──────> │ serialized   │ ──> AssetHandle / channels
//!  timer thread ──due tick─┘        │ context      │
//!                                   └──────────────┘
//! ```

pub mod manual;
pub mod threaded;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AudioError, AudioResult};

pub use manual::ManualScheduler;
pub use threaded::ThreadScheduler;

/// One-shot unit of work for the serialized context
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Timer callback. Returning `Continue` re-arms a periodic task after the
/// tick has completed; `Break` ends it.
pub type Tick = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Cancellation handle for a scheduled task.
///
/// Cancelling is idempotent and may happen from inside the task's own tick.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The serialized context plus its timer facility
pub trait Scheduler: Send + Sync {
    /// Queue `job` on the serialized context
    fn dispatch(&self, job: Job);

    /// Run `tick` on the serialized context after `delay`, then every
    /// `period` (fixed delay) while it returns `Continue`
    fn schedule(&self, delay: Duration, period: Option<Duration>, tick: Tick) -> TaskHandle;

    /// Whether the calling thread is the serialized context
    fn is_current(&self) -> bool;
}

/// Run `f` on the serialized context and wait for its result.
///
/// Runs inline when the caller is already on the context, so callbacks may
/// issue commands without deadlocking.
pub fn call<R, F>(scheduler: &dyn Scheduler, f: F) -> AudioResult<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    if scheduler.is_current() {
        return Ok(f());
    }

    let (tx, rx) = crossbeam_channel::bounded(1);
    scheduler.dispatch(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.recv().map_err(|_| AudioError::SchedulerClosed)
}

/// Wrap a one-shot job as a tick that runs it once
pub(crate) fn once(job: Job) -> Tick {
    let mut job = Some(job);
    Box::new(move || {
        if let Some(job) = job.take() {
            job();
        }
        ControlFlow::Break(())
    })
}
