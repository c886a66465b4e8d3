//! Real-time scheduler backed by two threads
//!
//! The executor thread is the serialized context: it drains a job queue in
//! FIFO order. The timer thread only keeps deadlines; when a task falls due
//! it hands the tick to the executor, which re-arms periodic tasks once the
//! tick has returned.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::{Job, Scheduler, TaskHandle, Tick};
use crate::error::{AudioError, AudioResult};

struct TimerTask {
    tick: Tick,
    period: Option<Duration>,
    handle: TaskHandle,
}

#[derive(Default)]
struct TimerState {
    seq: u64,
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: HashMap<u64, TimerTask>,
    shutdown: bool,
}

impl TimerState {
    fn insert(&mut self, deadline: Instant, task: TimerTask) {
        let seq = self.seq;
        self.seq += 1;
        self.deadlines.push(Reverse((deadline, seq)));
        self.tasks.insert(seq, task);
    }

    /// Pop every task due at `now`, dropping cancelled ones
    fn take_due(&mut self, now: Instant) -> Vec<TimerTask> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, seq))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop();
            if let Some(task) = self.tasks.remove(&seq) {
                if !task.handle.is_cancelled() {
                    due.push(task);
                }
            }
        }
        due
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.peek().map(|Reverse((deadline, _))| *deadline)
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl TimerShared {
    fn arm(&self, deadline: Instant, task: TimerTask) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.insert(deadline, task);
        drop(state);
        self.wake.notify_one();
    }
}

/// Scheduler with a dedicated executor thread and timer thread
pub struct ThreadScheduler {
    jobs: Option<Sender<Job>>,
    timers: Arc<TimerShared>,
    executor_id: ThreadId,
    executor: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl ThreadScheduler {
    pub fn new() -> AudioResult<Self> {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let timers = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            wake: Condvar::new(),
        });

        let executor = thread::Builder::new()
            .name("audio-executor".to_string())
            .spawn(move || run_executor(jobs_rx))
            .map_err(|e| AudioError::backend_with_source("failed to spawn executor thread", e))?;
        let executor_id = executor.thread().id();

        let timer_shared = Arc::clone(&timers);
        let timer_jobs = jobs_tx.clone();
        let timer = thread::Builder::new()
            .name("audio-timer".to_string())
            .spawn(move || run_timer(timer_shared, timer_jobs))
            .map_err(|e| AudioError::backend_with_source("failed to spawn timer thread", e))?;

        tracing::debug!("Thread scheduler started");

        Ok(Self {
            jobs: Some(jobs_tx),
            timers,
            executor_id,
            executor: Some(executor),
            timer: Some(timer),
        })
    }
}

fn run_executor(jobs: Receiver<Job>) {
    tracing::debug!("Audio executor thread started");

    while let Ok(job) = jobs.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!("Audio job panicked; executor continues");
        }
    }

    tracing::debug!("Audio executor thread stopped");
}

fn run_timer(shared: Arc<TimerShared>, jobs: Sender<Job>) {
    let mut state = shared.state.lock();

    loop {
        if state.shutdown {
            break;
        }

        let now = Instant::now();
        for task in state.take_due(now) {
            let job = fire(Arc::clone(&shared), task);
            if jobs.send(job).is_err() {
                return;
            }
        }

        match state.next_deadline() {
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
            None => shared.wake.wait(&mut state),
        }
    }
}

/// Longest wait the timer thread arms; later deadlines are clamped to it
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(FAR_FUTURE)).unwrap_or(now)
}

/// Wrap a due timer task as an executor job that re-arms it afterwards
fn fire(shared: Arc<TimerShared>, mut task: TimerTask) -> Job {
    Box::new(move || {
        if task.handle.is_cancelled() {
            return;
        }
        let flow = (task.tick)();
        if let (ControlFlow::Continue(()), Some(period)) = (flow, task.period) {
            if !task.handle.is_cancelled() {
                shared.arm(deadline_after(period), task);
            }
        }
    })
}

impl Scheduler for ThreadScheduler {
    fn dispatch(&self, job: Job) {
        if let Some(jobs) = &self.jobs {
            if jobs.send(job).is_err() {
                tracing::warn!("Dropped job: audio executor has stopped");
            }
        }
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, tick: Tick) -> TaskHandle {
        let handle = TaskHandle::new();
        self.timers.arm(
            deadline_after(delay),
            TimerTask {
                tick,
                period,
                handle: handle.clone(),
            },
        );
        handle
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.executor_id
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.timers.state.lock();
            state.shutdown = true;
            state.tasks.clear();
            state.deadlines.clear();
        }
        self.timers.wake.notify_all();

        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }

        // Closing the queue lets the executor drain and exit
        self.jobs.take();
        if let Some(executor) = self.executor.take() {
            if thread::current().id() != self.executor_id {
                let _ = executor.join();
            }
        }

        tracing::debug!("Thread scheduler stopped");
    }
}
