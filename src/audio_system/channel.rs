//! One playback channel
//!
//! Wraps a single [`MediaPlayer`] and makes every operation safe to call
//! regardless of backend readiness: while the player is not ready the
//! operation is queued and replayed, in order, once the backend signals
//! [`BackendSignal::Ready`].

use std::sync::Arc;

use super::backend::{BackendSignal, MediaBackend, MediaPlayer, SignalSink};
use super::source::AssetSource;
use crate::error::{AudioError, AudioResult};

/// Builds the signal sink for one open of a channel. The argument is the
/// open generation, so late signals from a replaced player can be told
/// apart.
pub type SignalRoute = Arc<dyn Fn(u64) -> SignalSink + Send + Sync>;

/// Transport state as requested through the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingOp {
    Play(f64),
    Loop,
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Volume(f32),
    Rate(f32),
}

/// What a backend signal meant for the channel
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    /// Signal from a released or replaced player
    Ignored,
    /// The channel became ready; queued operations were replayed
    Ready,
    /// The media played to its end
    Ended,
    /// The player failed and was re-opened; it will signal ready again
    Recovering,
    /// The player failed and recovery is exhausted
    Failed(String),
}

pub struct PlaybackChannel {
    owner: String,
    index: usize,
    source: AssetSource,
    backend: Arc<dyn MediaBackend>,
    route: SignalRoute,
    player: Option<Box<dyn MediaPlayer>>,
    generation: u64,
    ready: bool,
    state: TransportState,
    volume: f32,
    looping: bool,
    last_position: f64,
    pending: Vec<PendingOp>,
    recovery_attempted: bool,
}

impl PlaybackChannel {
    /// Open channel `index` of asset `owner`
    pub fn open(
        owner: &str,
        index: usize,
        source: AssetSource,
        backend: Arc<dyn MediaBackend>,
        route: SignalRoute,
        volume: f32,
    ) -> AudioResult<Self> {
        let mut channel = Self {
            owner: owner.to_string(),
            index,
            source,
            backend,
            route,
            player: None,
            generation: 0,
            ready: false,
            state: TransportState::Idle,
            volume: volume.clamp(0.0, 1.0),
            looping: false,
            last_position: 0.0,
            pending: Vec::new(),
            recovery_attempted: false,
        };
        channel.reopen()?;
        Ok(channel)
    }

    /// Release the current player (if any) and open a fresh one
    fn reopen(&mut self) -> AudioResult<()> {
        if let Some(mut player) = self.player.take() {
            player.release();
        }

        self.generation += 1;
        self.ready = false;
        self.pending.clear();
        self.state = TransportState::Idle;

        let signals = (self.route)(self.generation);
        let mut player = self.backend.open(&self.source, signals)?;
        player.set_volume(self.volume)?;
        self.ready = player.is_ready();
        self.player = Some(player);

        tracing::debug!(
            "Opened channel {} of {} ({}), generation {}, ready={}",
            self.index,
            self.owner,
            self.source.kind(),
            self.generation,
            self.ready
        );
        Ok(())
    }

    fn player_mut(&mut self) -> AudioResult<&mut Box<dyn MediaPlayer>> {
        self.player
            .as_mut()
            .ok_or_else(|| AudioError::ChannelUnavailable(self.owner.clone()))
    }

    fn ensure_open(&self) -> AudioResult<()> {
        if self.player.is_none() {
            return Err(AudioError::ChannelUnavailable(self.owner.clone()));
        }
        Ok(())
    }

    /// Queue `op` while not ready. Returns true when queued.
    fn defer(&mut self, op: PendingOp) -> AudioResult<bool> {
        self.ensure_open()?;
        if self.ready {
            return Ok(false);
        }
        if let PendingOp::Volume(_) = op {
            self.pending.retain(|queued| !matches!(queued, PendingOp::Volume(_)));
        }
        tracing::trace!("Channel {} of {} not ready, queued {:?}", self.index, self.owner, op);
        self.pending.push(op);
        Ok(true)
    }

    pub fn play(&mut self, at_seconds: f64) -> AudioResult<()> {
        let at_seconds = validate_time(at_seconds)?;
        if self.defer(PendingOp::Play(at_seconds))? {
            return Ok(());
        }
        self.player_mut()?.play(at_seconds)?;
        self.looping = false;
        self.state = TransportState::Playing;
        Ok(())
    }

    pub fn play_looping(&mut self) -> AudioResult<()> {
        if self.defer(PendingOp::Loop)? {
            return Ok(());
        }
        self.player_mut()?.play_looping()?;
        self.looping = true;
        self.state = TransportState::Playing;
        Ok(())
    }

    /// Pause. Returns whether the channel was actually playing.
    pub fn pause(&mut self) -> AudioResult<bool> {
        if self.defer(PendingOp::Pause)? {
            return Ok(false);
        }
        let was_playing = self.is_playing();
        self.player_mut()?.pause()?;
        if was_playing || self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
        Ok(was_playing)
    }

    pub fn resume(&mut self) -> AudioResult<()> {
        if self.defer(PendingOp::Resume)? {
            return Ok(());
        }
        self.player_mut()?.resume()?;
        self.state = TransportState::Playing;
        Ok(())
    }

    /// Stop. Stream sources are re-opened rather than rewound.
    pub fn stop(&mut self) -> AudioResult<()> {
        self.ensure_open()?;
        self.looping = false;
        self.last_position = 0.0;

        if self.source.kind().reopens_on_stop() {
            if let Some(player) = self.player.as_mut() {
                if let Err(e) = player.stop() {
                    tracing::debug!("Stop before re-open failed on {}: {}", self.owner, e);
                }
            }
            return self.reopen();
        }

        if !self.ready {
            self.pending.clear();
            self.pending.push(PendingOp::Stop);
            self.state = TransportState::Idle;
            return Ok(());
        }

        self.player_mut()?.stop()?;
        self.state = TransportState::Idle;
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64) -> AudioResult<()> {
        let seconds = validate_time(seconds)?;
        if self.defer(PendingOp::Seek(seconds))? {
            return Ok(());
        }
        self.player_mut()?.seek(seconds)?;
        self.last_position = seconds;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        if !volume.is_finite() {
            return Err(AudioError::InvalidArgument(format!(
                "volume must be finite, got {}",
                volume
            )));
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        if self.defer(PendingOp::Volume(volume))? {
            return Ok(());
        }
        self.player_mut()?.set_volume(volume)
    }

    pub fn set_rate(&mut self, rate: f32) -> AudioResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AudioError::InvalidArgument(format!(
                "rate must be a positive number, got {}",
                rate
            )));
        }
        if self.defer(PendingOp::Rate(rate))? {
            return Ok(());
        }
        self.player_mut()?.set_rate(rate)
    }

    /// Last volume applied or requested
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_ready(&self) -> bool {
        self.ready && self.player.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.ready && self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    /// Whether the transport was paused on request
    pub fn is_paused(&self) -> bool {
        self.state == TransportState::Paused
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.player.is_none()
    }

    pub fn duration(&self) -> Option<f64> {
        if !self.ready {
            return None;
        }
        self.player.as_ref().and_then(|p| p.duration())
    }

    /// Current position; also remembered for recovery
    pub fn position(&mut self) -> Option<f64> {
        if !self.ready {
            return None;
        }
        let position = self.player.as_ref().and_then(|p| p.position())?;
        self.last_position = position;
        Some(position)
    }

    pub fn release(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.release();
            tracing::debug!("Released channel {} of {}", self.index, self.owner);
        }
        self.ready = false;
        self.pending.clear();
        self.state = TransportState::Idle;
    }

    /// React to a backend signal from open `generation`
    pub fn on_signal(&mut self, generation: u64, signal: BackendSignal) -> SignalOutcome {
        if generation != self.generation || self.player.is_none() {
            return SignalOutcome::Ignored;
        }

        match signal {
            BackendSignal::Ready => {
                if self.ready {
                    return SignalOutcome::Ignored;
                }
                self.ready = true;
                self.recovery_attempted = false;
                self.replay_pending();
                SignalOutcome::Ready
            }
            BackendSignal::Ended => {
                if !self.looping {
                    self.state = TransportState::Ended;
                }
                SignalOutcome::Ended
            }
            BackendSignal::Error(message) => self.recover(message),
        }
    }

    fn replay_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!(
                "Channel {} of {} ready, replaying {} queued operations",
                self.index,
                self.owner,
                pending.len()
            );
        }

        for op in pending {
            let result = match op {
                PendingOp::Play(at) => self.play(at),
                PendingOp::Loop => self.play_looping(),
                PendingOp::Pause => self.pause().map(|_| ()),
                PendingOp::Resume => self.resume(),
                PendingOp::Stop => self.player_mut().and_then(|p| p.stop()),
                PendingOp::Seek(at) => self.seek(at),
                PendingOp::Volume(v) => self.set_volume(v),
                PendingOp::Rate(r) => self.set_rate(r),
            };
            if let Err(e) = result {
                tracing::warn!("Replaying {:?} on {} failed: {}", op, self.owner, e);
            }
        }
    }

    /// One re-open attempt per readiness cycle, restoring the play state
    fn recover(&mut self, message: String) -> SignalOutcome {
        tracing::warn!(
            "Backend error on channel {} of {}: {}",
            self.index,
            self.owner,
            message
        );
        self.ready = false;

        if self.recovery_attempted {
            self.release();
            self.state = TransportState::Ended;
            return SignalOutcome::Failed(message);
        }
        self.recovery_attempted = true;

        let was_playing = self.state == TransportState::Playing;
        let looping = self.looping;
        let at = self.last_position;

        if let Err(e) = self.reopen() {
            tracing::error!("Re-opening {} failed: {}", self.owner, e);
            self.release();
            self.state = TransportState::Ended;
            return SignalOutcome::Failed(format!("{}; re-open failed: {}", message, e));
        }

        // reopen() may leave the channel ready (file sources)
        let restore = if looping { PendingOp::Loop } else { PendingOp::Play(at) };
        if was_playing {
            if self.ready {
                let result = match restore {
                    PendingOp::Loop => self.play_looping(),
                    _ => self.play(at),
                };
                if let Err(e) = result {
                    tracing::warn!("Restoring playback of {} failed: {}", self.owner, e);
                }
            } else {
                self.pending.push(restore);
            }
        }

        SignalOutcome::Recovering
    }
}

fn validate_time(seconds: f64) -> AudioResult<f64> {
    if !seconds.is_finite() {
        return Err(AudioError::InvalidArgument(format!(
            "time must be finite, got {}",
            seconds
        )));
    }
    Ok(seconds.max(0.0))
}
