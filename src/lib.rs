//! In-process audio playback controller.
//!
//! Loads audio assets under caller-chosen ids and drives their playback
//! through a pluggable media backend: stepped fades, position polling with
//! completion detection, and automatic pause/resume around interruptions.

pub mod audio_system;
pub mod config;
pub mod error;
pub mod messaging;
pub mod runtime;

pub use audio_system::{
    AudioSystemManager, ConfigureOptions, FocusSignal, LoadOptions, PlayOptions, RodioBackend,
    StopOptions,
};
pub use config::EngineConfig;
pub use error::{AppResult, AudioError, AudioResult, ConfigError};
pub use messaging::{Event, EventBus};
