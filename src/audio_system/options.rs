/// Command options
///
/// Builders for the optional parts of load/play/stop/configure. Durations
/// are in seconds, as accepted from callers; a fade requested without a
/// duration uses the engine's default fade duration.
use super::effects::fade::secs_to_ms;
use crate::config::EngineConfig;

/// Options for `load`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// Number of channels for overlapping playback (default from config)
    pub channels: Option<usize>,

    /// Initial volume 0.0-1.0 (default from config)
    pub volume: Option<f32>,

    /// Treat the reference as a URL rather than a local path
    pub is_url: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn url(mut self) -> Self {
        self.is_url = true;
        self
    }
}

/// Options for `play`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Start position in seconds
    pub time: f64,

    /// Wait this many seconds before playing
    pub delay: f64,

    /// Volume to apply when playback starts
    pub volume: Option<f32>,

    /// Ramp up from silence to `volume`
    pub fade_in: bool,
    pub fade_in_duration: Option<f64>,

    /// Fade out automatically before the end of the media
    pub fade_out: bool,
    pub fade_out_duration: Option<f64>,

    /// Position at which the automatic fade-out starts. When unset the
    /// fade-out ends exactly at the end of the media.
    pub fade_out_start_time: Option<f64>,
}

impl PlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `seconds`
    pub fn at(mut self, seconds: f64) -> Self {
        self.time = seconds;
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_fade_in(mut self, seconds: f64) -> Self {
        self.fade_in = true;
        self.fade_in_duration = Some(seconds);
        self
    }

    pub fn with_fade_out(mut self, seconds: f64) -> Self {
        self.fade_out = true;
        self.fade_out_duration = Some(seconds);
        self
    }

    pub fn with_fade_out_start(mut self, seconds: f64) -> Self {
        self.fade_out = true;
        self.fade_out_start_time = Some(seconds);
        self
    }

    pub fn fade_in_ms(&self, config: &EngineConfig) -> u64 {
        self.fade_in_duration
            .map_or(config.default_fade_ms, secs_to_ms)
    }

    pub fn fade_out_ms(&self, config: &EngineConfig) -> u64 {
        self.fade_out_duration
            .map_or(config.default_fade_ms, secs_to_ms)
    }

    /// Position at which the automatic fade-out starts, given the media
    /// duration. `None` when it cannot be determined.
    pub fn fade_out_start(&self, duration: Option<f64>, config: &EngineConfig) -> Option<f64> {
        if let Some(start) = self.fade_out_start_time.filter(|s| s.is_finite() && *s > 0.0) {
            return Some(start);
        }
        let duration = duration.filter(|d| d.is_finite() && *d > 0.0)?;
        let fade_secs = self.fade_out_ms(config) as f64 / 1000.0;
        Some((duration - fade_secs).max(0.0))
    }
}

/// Options for `stop`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopOptions {
    /// Fade out before stopping
    pub fade_out: bool,
    pub fade_out_duration: Option<f64>,

    /// End in a pause (volume left at 0) instead of a full stop
    pub as_pause: bool,
}

impl StopOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fade_out(mut self, seconds: f64) -> Self {
        self.fade_out = true;
        self.fade_out_duration = Some(seconds);
        self
    }

    pub fn as_pause(mut self) -> Self {
        self.as_pause = true;
        self
    }

    pub fn fade_out_ms(&self, config: &EngineConfig) -> u64 {
        self.fade_out_duration
            .map_or(config.default_fade_ms, secs_to_ms)
    }
}

/// Options for `configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureOptions {
    /// React to audio focus / interruption signals
    pub focus: bool,

    /// Keep playing in the background (ignore lifecycle signals)
    pub background: bool,
}

impl Default for ConfigureOptions {
    fn default() -> Self {
        Self {
            focus: true,
            background: false,
        }
    }
}

impl From<&EngineConfig> for ConfigureOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            focus: config.focus,
            background: config.background,
        }
    }
}
