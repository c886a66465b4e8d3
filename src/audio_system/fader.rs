//! Per-asset fade state machine
//!
//! Holds at most one active fade job. Starting a fade cancels whatever job
//! was scheduled before it; a cancelled job is recognised by its stale
//! generation and never applies another step.

use crate::audio_system::effects::FadeKind;
use crate::runtime::TaskHandle;

/// Fade state of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeState {
    #[default]
    None,
    FadeIn,
    FadeOut,
    FadeTo,
}

impl From<FadeKind> for FadeState {
    fn from(kind: FadeKind) -> Self {
        match kind {
            FadeKind::FadeIn { .. } => FadeState::FadeIn,
            FadeKind::FadeOut { .. } => FadeState::FadeOut,
            FadeKind::FadeTo { .. } => FadeState::FadeTo,
        }
    }
}

#[derive(Debug, Default)]
pub struct FadeController {
    state: FadeState,
    task: Option<TaskHandle>,
    generation: u64,
}

impl FadeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FadeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != FadeState::None
    }

    /// Cancel the active job, if any. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        if self.state != FadeState::None {
            tracing::trace!("Cancelled {:?} fade", self.state);
        }
        self.state = FadeState::None;
        self.generation += 1;
    }

    /// Enter the state for `kind`, cancelling the previous job first.
    /// Returns the generation the new job must present on every step.
    pub fn begin(&mut self, kind: FadeKind) -> u64 {
        self.cancel();
        self.state = kind.into();
        self.generation
    }

    /// Remember the scheduled task of job `generation`
    pub fn attach(&mut self, generation: u64, task: TaskHandle) {
        if self.is_current(generation) {
            self.task = Some(task);
        } else {
            task.cancel();
        }
    }

    /// Whether job `generation` is still the active one
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state != FadeState::None
    }

    /// End job `generation` normally
    pub fn finish(&mut self, generation: u64) {
        if self.generation == generation {
            if let Some(task) = self.task.take() {
                task.cancel();
            }
            self.state = FadeState::None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_cancels_previous_job() {
        let mut fader = FadeController::new();
        let first = fader.begin(FadeKind::FadeIn { target: 1.0 });
        let first_task = TaskHandle::new();
        fader.attach(first, first_task.clone());

        let second = fader.begin(FadeKind::FadeTo { target: 0.5 });
        assert!(first_task.is_cancelled());
        assert!(!fader.is_current(first));
        assert!(fader.is_current(second));
        assert_eq!(fader.state(), FadeState::FadeTo);
    }

    #[test]
    fn test_finish_only_affects_its_generation() {
        let mut fader = FadeController::new();
        let first = fader.begin(FadeKind::FadeOut { as_pause: false });
        let second = fader.begin(FadeKind::FadeOut { as_pause: true });

        fader.finish(first);
        assert_eq!(fader.state(), FadeState::FadeOut);

        fader.finish(second);
        assert_eq!(fader.state(), FadeState::None);
        assert!(!fader.is_active());
    }

    #[test]
    fn test_attach_after_preemption_cancels_task() {
        let mut fader = FadeController::new();
        let stale = fader.begin(FadeKind::FadeIn { target: 1.0 });
        fader.cancel();

        let task = TaskHandle::new();
        fader.attach(stale, task.clone());
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut fader = FadeController::new();
        fader.cancel();
        fader.cancel();
        assert_eq!(fader.state(), FadeState::None);
    }
}
