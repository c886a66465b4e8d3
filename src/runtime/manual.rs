//! Virtual-time scheduler
//!
//! Everything runs on the thread that calls [`ManualScheduler::advance`].
//! Hosts that pump their own main loop can drive playback with it, and it
//! makes fade/poll timing fully deterministic under test.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::Duration;

use parking_lot::Mutex;

use super::{once, Job, Scheduler, TaskHandle, Tick};

struct ManualTask {
    tick: Tick,
    period: Option<Duration>,
    handle: TaskHandle,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), ManualTask>,
}

impl ManualState {
    fn insert(&mut self, deadline: Duration, task: ManualTask) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.insert((deadline, seq), task);
    }
}

/// Scheduler driven by an explicit virtual clock
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of queued (possibly cancelled) tasks
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Run everything that is due right now
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    /// Move the clock forward by `by`, running every task that falls due,
    /// in deadline order. Tasks scheduled while advancing run too if they
    /// fall inside the window.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now.saturating_add(by);

        loop {
            let next = {
                let mut state = self.state.lock();
                let due = match state.queue.first_key_value() {
                    Some((&(deadline, _), _)) if deadline <= target => true,
                    _ => false,
                };
                if !due {
                    break;
                }
                state.queue.pop_first().map(|((deadline, _), task)| {
                    if deadline > state.now {
                        state.now = deadline;
                    }
                    task
                })
            };

            // Lock released: ticks may schedule or cancel freely
            let Some(mut task) = next else { break };
            if task.handle.is_cancelled() {
                continue;
            }

            let flow = (task.tick)();
            if let (ControlFlow::Continue(()), Some(period)) = (flow, task.period) {
                if !task.handle.is_cancelled() {
                    let mut state = self.state.lock();
                    let deadline = state.now.saturating_add(period);
                    state.insert(deadline, task);
                }
            }
        }

        let mut state = self.state.lock();
        if target > state.now {
            state.now = target;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn dispatch(&self, job: Job) {
        let mut state = self.state.lock();
        let now = state.now;
        state.insert(
            now,
            ManualTask {
                tick: once(job),
                period: None,
                handle: TaskHandle::new(),
            },
        );
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, tick: Tick) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.state.lock();
        let deadline = state.now.saturating_add(delay);
        state.insert(
            deadline,
            ManualTask {
                tick,
                period,
                handle: handle.clone(),
            },
        );
        handle
    }

    fn is_current(&self) -> bool {
        true
    }
}
