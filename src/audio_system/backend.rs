//! Platform media backend contract
//!
//! A backend opens one [`MediaPlayer`] per playback channel. Players are
//! only ever touched from the serialized context; their asynchronous
//! notifications come back through the [`SignalSink`] handed over at open
//! time, from whatever thread the backend likes.

use std::fmt;
use std::sync::Arc;

use super::source::AssetSource;
use crate::error::AudioResult;

/// Asynchronous notification from a player
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSignal {
    /// Duration/position are now valid and queued operations may run
    Ready,

    /// Playback reached the end of the media
    Ended,

    /// Transport failure; the player is no longer usable
    Error(String),
}

/// Callback a player uses to report [`BackendSignal`]s
#[derive(Clone)]
pub struct SignalSink {
    notify: Arc<dyn Fn(BackendSignal) + Send + Sync>,
}

impl SignalSink {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(BackendSignal) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    /// Sink that drops every signal
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, signal: BackendSignal) {
        (self.notify)(signal);
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink").finish_non_exhaustive()
    }
}

/// One underlying player instance
pub trait MediaPlayer: Send {
    /// Start playback from `at_seconds`
    fn play(&mut self, at_seconds: f64) -> AudioResult<()>;

    /// Start playback from the beginning in repeat mode
    fn play_looping(&mut self) -> AudioResult<()>;

    fn pause(&mut self) -> AudioResult<()>;

    fn resume(&mut self) -> AudioResult<()>;

    /// Stop and rewind
    fn stop(&mut self) -> AudioResult<()>;

    fn seek(&mut self, seconds: f64) -> AudioResult<()>;

    /// Volume in 0.0-1.0
    fn set_volume(&mut self, volume: f32) -> AudioResult<()>;

    /// Playback rate; backends without rate control may ignore it
    fn set_rate(&mut self, rate: f32) -> AudioResult<()>;

    /// Whether duration/position are valid yet
    fn is_ready(&self) -> bool;

    fn is_playing(&self) -> bool;

    /// Duration in seconds, `None` until known
    fn duration(&self) -> Option<f64>;

    /// Position in seconds, `None` until ready
    fn position(&self) -> Option<f64>;

    /// Free the underlying resource. Further calls may fail.
    fn release(&mut self);
}

/// Factory for players
pub trait MediaBackend: Send + Sync {
    /// Open `source` for playback. File sources are expected to be ready
    /// when this returns; stream sources signal [`BackendSignal::Ready`]
    /// later through `signals`.
    fn open(&self, source: &AssetSource, signals: SignalSink) -> AudioResult<Box<dyn MediaPlayer>>;

    /// Backend name for logs
    fn name(&self) -> &str {
        "media-backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_signal_sink_forwards() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);
        let sink = SignalSink::new(move |signal| log.lock().push(signal));

        sink.send(BackendSignal::Ready);
        sink.clone().send(BackendSignal::Error("gone".to_string()));

        assert_eq!(
            *received.lock(),
            vec![BackendSignal::Ready, BackendSignal::Error("gone".to_string())]
        );
    }

    #[test]
    fn test_noop_sink() {
        SignalSink::noop().send(BackendSignal::Ended);
    }
}
