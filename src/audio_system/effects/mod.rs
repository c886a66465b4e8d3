/// Audio effects module
///
/// Volume ramps and volume levels applied by the fade controller.

pub mod fade;
pub mod volume;

pub use fade::{step_count, FadeJob, FadeKind, FADE_STEP, MAX_VOLUME, MIN_FADE_VOLUME};
pub use volume::Volume;
