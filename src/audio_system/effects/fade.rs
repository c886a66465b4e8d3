/// Stepped volume ramps
///
/// A fade is a fixed number of volume steps applied at a fixed cadence.
/// `FadeJob` only does the arithmetic; scheduling and cancellation live in
/// `FadeController`.
use std::time::Duration;

/// Interval between two fade steps
pub const FADE_STEP: Duration = Duration::from_millis(80);

/// Floor for exponential fades (a zero base has no ratio)
pub const MIN_FADE_VOLUME: f32 = 0.001;

pub const MAX_VOLUME: f32 = 1.0;

/// Number of steps for a fade of `duration_ms`, at least one
pub fn step_count(duration_ms: u64) -> u32 {
    let steps = duration_ms / FADE_STEP.as_millis() as u64;
    steps.clamp(1, u32::MAX as u64) as u32
}

/// Convert a duration in seconds (as accepted by commands) to whole ms
pub fn secs_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

/// Which ramp a job performs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeKind {
    /// Linear ramp from 0 up to `target`
    FadeIn { target: f32 },

    /// Linear ramp from the current volume down to 0, then pause or stop
    FadeOut { as_pause: bool },

    /// Exponential ramp from the current volume to `target`
    FadeTo { target: f32 },
}

/// Arithmetic state of one fade
#[derive(Debug, Clone)]
pub struct FadeJob {
    kind: FadeKind,
    initial: f32,
    target: f32,
    ratio: f32,
    volume: f32,
    steps: u32,
    step: u32,
}

impl FadeJob {
    /// Fade in to `target` over `duration_ms`. Volume starts at 0.
    pub fn fade_in(target: f32, duration_ms: u64) -> Self {
        let target = target.clamp(0.0, MAX_VOLUME);
        Self {
            kind: FadeKind::FadeIn { target },
            initial: 0.0,
            target,
            ratio: 1.0,
            volume: 0.0,
            steps: step_count(duration_ms),
            step: 0,
        }
    }

    /// Fade out from `initial` over `duration_ms`
    pub fn fade_out(initial: f32, duration_ms: u64, as_pause: bool) -> Self {
        let initial = initial.clamp(0.0, MAX_VOLUME);
        Self {
            kind: FadeKind::FadeOut { as_pause },
            initial,
            target: 0.0,
            ratio: 1.0,
            volume: initial,
            steps: step_count(duration_ms),
            step: 0,
        }
    }

    /// Exponential fade from `current` to `target` over `duration_ms`
    pub fn fade_to(current: f32, target: f32, duration_ms: u64) -> Self {
        let steps = step_count(duration_ms);
        let initial = current.clamp(MIN_FADE_VOLUME, MAX_VOLUME);
        let target = target.clamp(MIN_FADE_VOLUME, MAX_VOLUME);
        let ratio = (target / initial).powf(1.0 / steps as f32);
        Self {
            kind: FadeKind::FadeTo { target },
            initial,
            target,
            ratio,
            volume: initial,
            steps,
            step: 0,
        }
    }

    /// Advance one step and return the volume to apply, or `None` once all
    /// steps have been applied. The last step lands exactly on the target.
    pub fn next_volume(&mut self) -> Option<f32> {
        if self.is_finished() {
            return None;
        }
        self.step += 1;
        let last = self.step == self.steps;
        let progress = self.step as f32 / self.steps as f32;

        self.volume = match self.kind {
            FadeKind::FadeIn { target } => {
                if last {
                    target
                } else {
                    (target * progress).clamp(0.0, target)
                }
            }
            FadeKind::FadeOut { .. } => {
                if last {
                    0.0
                } else {
                    (self.initial * (1.0 - progress)).max(0.0)
                }
            }
            FadeKind::FadeTo { target } => {
                if last {
                    target
                } else {
                    (self.volume * self.ratio).clamp(MIN_FADE_VOLUME, MAX_VOLUME)
                }
            }
        };

        Some(self.volume)
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    pub fn kind(&self) -> FadeKind {
        self.kind
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Steps applied so far
    pub fn steps_done(&self) -> u32 {
        self.step
    }

    /// Volume after the last applied step
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Volume the job ends on
    pub fn target(&self) -> f32 {
        self.target
    }
}
