/// Audio system module
///
/// Loads audio assets by id and controls their playback:
/// - Overlapping playback through a small pool of channels per asset
/// - Stepped fade-in/out and volume ramps
/// - Position polling, completion and duration events
/// - Auto pause/resume on interruptions and app lifecycle changes
///
/// ## Architecture
///
/// ```text
/// AudioSystemManager
///   └── FocusOrchestrator (registry, auto-resume set, delayed plays)
///         ├── AssetHandle "music"   ─┐
///         ├── AssetHandle "sfx"     ─┤ Independent
///         └── AssetHandle "ambient" ─┘ playback
///
/// Each AssetHandle has:
///   ├── PlaybackChannel x N  (MediaPlayer from the MediaBackend)
///   ├── FadeController
///   └── PositionPoller
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use native_audio::audio_system::{AudioSystemManager, LoadOptions, PlayOptions, RodioBackend};
///
/// let manager = AudioSystemManager::with_threads(Arc::new(RodioBackend::new()?), config)?;
///
/// manager.load("music", "assets/theme.mp3", LoadOptions::new().with_volume(0.8))?;
/// manager.play("music", PlayOptions::new().with_fade_in(0.5).with_fade_out(2.0))?;
/// ```
pub mod asset;
pub mod backend;
pub mod channel;
pub mod effects;
pub mod fader;
pub mod focus;
pub mod manager;
pub mod options;
pub mod player;
pub mod poller;
pub mod source;

// Re-export commonly used types
pub use asset::{AssetContext, AssetHandle};
pub use backend::{BackendSignal, MediaBackend, MediaPlayer, SignalSink};
pub use channel::{PlaybackChannel, TransportState};
pub use effects::{FadeJob, FadeKind, Volume};
pub use fader::FadeState;
pub use focus::{FadeOutSchedule, FocusSignal};
pub use manager::AudioSystemManager;
pub use options::{ConfigureOptions, LoadOptions, PlayOptions, StopOptions};
pub use player::RodioBackend;
pub use source::{AssetSource, SourceKind};
