//! Loaded audio asset
//!
//! An `AssetHandle` owns the playback channels of one asset id, its fade
//! controller and its position poller. All methods must run on the
//! serialized context; timer ticks and backend signals only hold a weak
//! reference and are marshalled there by the scheduler.
//!
//! ```text
//! AssetHandle
//!   ├── PlaybackChannel 0 ─┐
//!   ├── PlaybackChannel 1 ─┤ round-robin on play/loop
//!   ├── FadeController     │ (one job at a time, 80 ms steps)
//!   └── PositionPoller       (100 ms ticks on the active channel)
//! ```

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use super::backend::{BackendSignal, MediaBackend, SignalSink};
use super::channel::{PlaybackChannel, SignalOutcome, SignalRoute};
use super::effects::{FadeJob, FadeKind, FADE_STEP};
use super::fader::{FadeController, FadeState};
use super::focus::{AutoResumeSet, FadeOutSchedules};
use super::poller::{round_to_tenth, PositionPoller, POLL_INTERVAL, POLL_WARM_UP};
use super::source::AssetSource;
use crate::error::{AudioError, AudioResult};
use crate::messaging::{Event, EventBus};
use crate::runtime::Scheduler;

/// Shared collaborators every asset needs
#[derive(Clone)]
pub struct AssetContext {
    pub scheduler: Arc<dyn Scheduler>,
    pub events: EventBus,
    pub backend: Arc<dyn MediaBackend>,
    pub resume_set: Arc<AutoResumeSet>,
    pub schedules: Arc<FadeOutSchedules>,
}

struct AssetInner {
    channels: Vec<PlaybackChannel>,
    play_index: usize,
    active: usize,
    completion_dispatched: bool,
    base_volume: f32,
    fade: FadeController,
    poller: PositionPoller,
    unloaded: bool,
    duration_announced: bool,
    duration_waiters: Vec<Sender<f64>>,
}

pub struct AssetHandle {
    id: String,
    source: AssetSource,
    ctx: AssetContext,
    me: Weak<AssetHandle>,
    inner: Mutex<AssetInner>,
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl AssetHandle {
    /// Open `channel_count` channels for `source`
    pub fn load(
        id: &str,
        source: AssetSource,
        channel_count: usize,
        volume: f32,
        ctx: AssetContext,
    ) -> AudioResult<Arc<Self>> {
        if channel_count == 0 {
            return Err(AudioError::InvalidArgument(
                "channel count must be at least 1".to_string(),
            ));
        }

        let asset = Arc::new_cyclic(|me| Self {
            id: id.to_string(),
            source,
            ctx,
            me: me.clone(),
            inner: Mutex::new(AssetInner {
                channels: Vec::with_capacity(channel_count),
                play_index: 0,
                active: 0,
                // No play session yet, so nothing to complete
                completion_dispatched: true,
                base_volume: volume.clamp(0.0, 1.0),
                fade: FadeController::new(),
                poller: PositionPoller::new(),
                unloaded: false,
                duration_announced: false,
                duration_waiters: Vec::new(),
            }),
        });

        let mut inner = asset.inner.lock();
        for index in 0..channel_count {
            let opened = PlaybackChannel::open(
                &asset.id,
                index,
                asset.source.clone(),
                Arc::clone(&asset.ctx.backend),
                asset.signal_route(index),
                volume,
            );
            match opened {
                Ok(channel) => inner.channels.push(channel),
                Err(e) => {
                    for channel in inner.channels.iter_mut() {
                        channel.release();
                    }
                    inner.unloaded = true;
                    return Err(e);
                }
            }
        }
        asset.announce_duration(&mut inner);
        drop(inner);

        tracing::info!(
            "Loaded asset {} from {} with {} channel(s) on {}",
            asset.id,
            asset.source,
            channel_count,
            asset.ctx.backend.name()
        );
        Ok(asset)
    }

    /// Sink factory for channel `index`: signals are marshalled onto the
    /// serialized context and delivered to this asset if it still exists.
    fn signal_route(&self, index: usize) -> SignalRoute {
        let me = self.me.clone();
        let scheduler = Arc::clone(&self.ctx.scheduler);
        Arc::new(move |generation: u64| {
            let me = me.clone();
            let scheduler = Arc::clone(&scheduler);
            SignalSink::new(move |signal: BackendSignal| {
                let me = me.clone();
                scheduler.dispatch(Box::new(move || {
                    if let Some(asset) = me.upgrade() {
                        asset.on_backend_signal(index, generation, signal);
                    }
                }));
            })
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }

    pub fn is_unloaded(&self) -> bool {
        self.inner.lock().unloaded
    }

    pub fn fade_state(&self) -> FadeState {
        self.inner.lock().fade.state()
    }

    /// Volume the asset plays at when not fading
    pub fn volume(&self) -> f32 {
        self.inner.lock().base_volume
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock().poller.is_running()
    }

    fn ensure_loaded(&self, inner: &AssetInner) -> AudioResult<()> {
        if inner.unloaded || inner.channels.is_empty() {
            return Err(AudioError::ChannelUnavailable(self.id.clone()));
        }
        Ok(())
    }

    /// Play the next channel in round-robin order from `at_seconds`
    pub fn play(&self, at_seconds: f64, volume: Option<f32>) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.play_locked(&mut inner, at_seconds, volume, false)?;
        if let Some(volume) = volume {
            inner.base_volume = volume.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// Like `play`, but in backend repeat mode
    pub fn loop_playback(&self) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.play_locked(&mut inner, 0.0, None, true)
    }

    fn play_locked(
        &self,
        inner: &mut AssetInner,
        at_seconds: f64,
        volume: Option<f32>,
        looping: bool,
    ) -> AudioResult<()> {
        self.ensure_loaded(inner)?;
        inner.fade.cancel();

        let index = inner.play_index % inner.channels.len();
        let volume = volume.unwrap_or(inner.base_volume);
        let channel = inner
            .channels
            .get_mut(index)
            .ok_or_else(|| AudioError::ChannelUnavailable(self.id.clone()))?;
        // A previous fade may have left the channel silent
        channel.set_volume(volume)?;
        if looping {
            channel.play_looping()?;
        } else {
            channel.play(at_seconds)?;
        }

        inner.active = index;
        inner.play_index = (index + 1) % inner.channels.len();
        inner.completion_dispatched = false;
        self.start_poller(inner);

        tracing::debug!(
            "Playing {} on channel {} at {:.1}s (loop={})",
            self.id,
            index,
            at_seconds,
            looping
        );
        Ok(())
    }

    /// Set volume to 0, play, then fade in to `target` over `duration_ms`
    pub fn play_with_fade_in(&self, at_seconds: f64, target: f32, duration_ms: u64) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.play_locked(&mut inner, at_seconds, Some(0.0), false)?;
        inner.base_volume = target.clamp(0.0, 1.0);
        self.start_fade(&mut inner, FadeJob::fade_in(target, duration_ms));
        Ok(())
    }

    /// Pause every channel. Returns whether any channel was playing.
    pub fn pause(&self) -> AudioResult<bool> {
        let mut inner = self.inner.lock();
        self.pause_locked(&mut inner)
    }

    fn pause_locked(&self, inner: &mut AssetInner) -> AudioResult<bool> {
        self.ensure_loaded(inner)?;
        inner.fade.cancel();
        inner.poller.stop();

        let mut was_playing = false;
        for channel in inner.channels.iter_mut() {
            was_playing |= channel.pause()?;
        }
        tracing::debug!("Paused {} (was playing: {})", self.id, was_playing);
        Ok(was_playing)
    }

    /// Resume channel 0 only; extra channels are fire-and-forget
    pub fn resume(&self) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        inner
            .channels
            .first_mut()
            .ok_or_else(|| AudioError::ChannelUnavailable(self.id.clone()))?
            .resume()?;

        inner.active = 0;
        inner.completion_dispatched = false;
        self.start_poller(&mut inner);
        tracing::debug!("Resumed {}", self.id);
        Ok(())
    }

    /// Stop every channel, dispatching completion once
    pub fn stop(&self) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.stop_locked(&mut inner)
    }

    fn stop_locked(&self, inner: &mut AssetInner) -> AudioResult<()> {
        self.ensure_loaded(inner)?;
        inner.fade.cancel();
        inner.poller.stop();
        self.dispatch_completion(inner);

        let mut first_error = None;
        for channel in inner.channels.iter_mut() {
            if let Err(e) = channel.stop() {
                tracing::warn!("Stopping {} failed: {}", self.id, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        tracing::debug!("Stopped {}", self.id);
        first_error.map_or(Ok(()), Err)
    }

    /// Fade out over `duration_ms`, then pause (`as_pause`) or stop.
    ///
    /// A fade-out already in progress is left alone. When nothing is
    /// playing the terminal action runs immediately.
    pub fn stop_with_fade(&self, duration_ms: u64, as_pause: bool) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.stop_with_fade_locked(&mut inner, duration_ms, as_pause)
    }

    fn stop_with_fade_locked(
        &self,
        inner: &mut AssetInner,
        duration_ms: u64,
        as_pause: bool,
    ) -> AudioResult<()> {
        self.ensure_loaded(inner)?;
        if inner.fade.state() == FadeState::FadeOut {
            tracing::debug!("Fade-out already running on {}", self.id);
            return Ok(());
        }

        let active = inner.active;
        let playing = inner.channels.iter().any(|c| c.is_playing());
        let Some(initial) = inner.channels.get(active).map(|c| c.volume()) else {
            return Err(AudioError::ChannelUnavailable(self.id.clone()));
        };

        if !playing {
            return self.finish_fade_out(inner, as_pause);
        }

        tracing::debug!(
            "Fading out {} over {}ms from {:.3} (as_pause={})",
            self.id,
            duration_ms,
            initial,
            as_pause
        );
        self.start_fade(inner, FadeJob::fade_out(initial, duration_ms, as_pause));
        Ok(())
    }

    /// Set volume on every channel, ramping exponentially when playing
    pub fn set_volume(&self, volume: f32, ramp_ms: u64) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        inner.fade.cancel();
        inner.base_volume = volume.clamp(0.0, 1.0);

        let playing = inner.channels.iter().any(|c| c.is_playing());
        if ramp_ms > 0 && playing {
            let current = inner.channels.get(inner.active).map_or(volume, |c| c.volume());
            self.start_fade(&mut inner, FadeJob::fade_to(current, volume, ramp_ms));
            return Ok(());
        }

        for channel in inner.channels.iter_mut() {
            channel.set_volume(volume)?;
        }
        Ok(())
    }

    pub fn set_rate(&self, rate: f32) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        for channel in inner.channels.iter_mut() {
            channel.set_rate(rate)?;
        }
        Ok(())
    }

    /// Seek; a no-op on multi-channel assets
    pub fn seek(&self, seconds: f64) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        if inner.channels.len() != 1 {
            return Ok(());
        }
        match inner.channels.first_mut() {
            Some(channel) => channel.seek(seconds),
            None => Err(AudioError::ChannelUnavailable(self.id.clone())),
        }
    }

    /// Duration in seconds. Multi-channel assets report 0.
    pub fn duration(&self) -> AudioResult<Option<f64>> {
        let inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        Ok(Self::duration_of(&inner))
    }

    fn duration_of(inner: &AssetInner) -> Option<f64> {
        match inner.channels.as_slice() {
            [single] => single.duration(),
            _ => Some(0.0),
        }
    }

    /// Position in seconds. Multi-channel assets report 0.
    pub fn position(&self) -> AudioResult<f64> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        match inner.channels.as_mut_slice() {
            [single] => Ok(single.position().unwrap_or(0.0)),
            _ => Ok(0.0),
        }
    }

    pub fn is_playing(&self) -> bool {
        let inner = self.inner.lock();
        !inner.unloaded && inner.channels.iter().any(|c| c.is_playing())
    }

    /// Resolves with the duration once the backend knows it
    pub fn await_duration(&self) -> AudioResult<Receiver<f64>> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&inner)?;
        let (tx, rx) = bounded(1);
        match Self::duration_of(&inner) {
            Some(duration) => {
                let _ = tx.send(duration);
            }
            None => inner.duration_waiters.push(tx),
        }
        Ok(rx)
    }

    /// Stop, cancel timers and release every channel. Idempotent.
    pub fn unload(&self) {
        let mut inner = self.inner.lock();
        if inner.unloaded {
            return;
        }

        inner.fade.cancel();
        inner.poller.stop();
        self.dispatch_completion(&mut inner);
        // Releasing stops the player; streams are not re-opened here
        for channel in inner.channels.iter_mut() {
            channel.release();
        }
        inner.unloaded = true;
        inner.duration_waiters.clear();
        drop(inner);

        self.ctx.resume_set.remove(&self.id);
        self.ctx.schedules.clear(&self.id);
        tracing::info!("Unloaded asset {}", self.id);
    }

    fn dispatch_completion(&self, inner: &mut AssetInner) {
        if inner.completion_dispatched {
            return;
        }
        inner.completion_dispatched = true;
        self.ctx.resume_set.remove(&self.id);
        tracing::debug!("Playback of {} completed", self.id);
        self.ctx.events.publish(Event::Completed {
            asset_id: self.id.clone(),
        });
    }

    fn announce_duration(&self, inner: &mut AssetInner) {
        if inner.duration_announced || inner.channels.len() != 1 {
            return;
        }
        let Some(duration) = Self::duration_of(inner) else {
            return;
        };
        inner.duration_announced = true;
        for waiter in inner.duration_waiters.drain(..) {
            let _ = waiter.send(duration);
        }
        self.ctx.events.publish(Event::DurationAvailable {
            asset_id: self.id.clone(),
            seconds: duration,
        });
    }

    fn on_backend_signal(&self, index: usize, generation: u64, signal: BackendSignal) {
        let mut inner = self.inner.lock();
        if inner.unloaded {
            return;
        }
        let Some(channel) = inner.channels.get_mut(index) else {
            return;
        };

        match channel.on_signal(generation, signal) {
            SignalOutcome::Ignored | SignalOutcome::Recovering => {}
            SignalOutcome::Ready => self.announce_duration(&mut inner),
            SignalOutcome::Ended => {
                tracing::debug!("Channel {} of {} reached the end", index, self.id);
            }
            SignalOutcome::Failed(message) => {
                if index == inner.active {
                    inner.fade.cancel();
                    inner.poller.stop();
                    // The error event stands in for completion
                    inner.completion_dispatched = true;
                }
                drop(inner);
                self.ctx.resume_set.remove(&self.id);
                tracing::error!("Asset {} failed: {}", self.id, message);
                self.ctx.events.publish(Event::BackendError {
                    asset_id: self.id.clone(),
                    message,
                });
            }
        }
    }

    fn start_fade(&self, inner: &mut AssetInner, mut job: FadeJob) {
        let generation = inner.fade.begin(job.kind());
        tracing::debug!(
            "Starting {:?} on {}: {} steps to {:.3}",
            job.kind(),
            self.id,
            job.steps(),
            job.target()
        );

        let me = self.me.clone();
        let task = self.ctx.scheduler.schedule(
            FADE_STEP,
            Some(FADE_STEP),
            Box::new(move || match me.upgrade() {
                Some(asset) => asset.fade_tick(generation, &mut job),
                None => ControlFlow::Break(()),
            }),
        );
        inner.fade.attach(generation, task);
    }

    fn fade_tick(&self, generation: u64, job: &mut FadeJob) -> ControlFlow<()> {
        let mut inner = self.inner.lock();
        if inner.unloaded || !inner.fade.is_current(generation) {
            return ControlFlow::Break(());
        }

        let kind = job.kind();
        let targets: Vec<usize> = match kind {
            FadeKind::FadeTo { .. } => (0..inner.channels.len()).collect(),
            _ => vec![inner.active],
        };

        let lost = targets
            .iter()
            .any(|&i| inner.channels.get(i).map_or(true, |c| c.is_released()));
        if lost {
            tracing::debug!("Fade on {} lost its channel", self.id);
            inner.fade.finish(generation);
            return ControlFlow::Break(());
        }

        // Streams: wait for readiness before ramping
        if targets.iter().any(|&i| inner.channels.get(i).is_some_and(|c| !c.is_ready())) {
            return ControlFlow::Continue(());
        }

        if let FadeKind::FadeTo { .. } = kind {
            if !inner.channels.iter().any(|c| c.is_playing()) {
                inner.fade.finish(generation);
                return ControlFlow::Break(());
            }
        }

        let Some(volume) = job.next_volume() else {
            inner.fade.finish(generation);
            return ControlFlow::Break(());
        };
        tracing::trace!(
            "Fade step {}/{} on {}: volume {:.3}",
            job.steps_done(),
            job.steps(),
            self.id,
            volume
        );

        let mut failure = None;
        for &i in &targets {
            if let Some(channel) = inner.channels.get_mut(i) {
                if let Err(e) = channel.set_volume(volume) {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            tracing::error!("Fade step on {} failed: {}", self.id, e);
            inner.fade.finish(generation);
            self.settle_fade(&mut inner, kind, &targets);
            return ControlFlow::Break(());
        }

        if job.is_finished() {
            inner.fade.finish(generation);
            if let FadeKind::FadeOut { as_pause } = kind {
                if let Err(e) = self.finish_fade_out(&mut inner, as_pause) {
                    tracing::error!("Fade-out terminal action on {} failed: {}", self.id, e);
                }
            }
            return ControlFlow::Break(());
        }

        ControlFlow::Continue(())
    }

    /// Put the asset in the fade's end state after a failed step
    fn settle_fade(&self, inner: &mut AssetInner, kind: FadeKind, targets: &[usize]) {
        let target = match kind {
            FadeKind::FadeIn { target } | FadeKind::FadeTo { target } => target,
            FadeKind::FadeOut { as_pause } => {
                if let Err(e) = self.finish_fade_out(inner, as_pause) {
                    tracing::error!("Settling fade-out on {} failed: {}", self.id, e);
                }
                return;
            }
        };
        for &i in targets {
            if let Some(channel) = inner.channels.get_mut(i) {
                let _ = channel.set_volume(target);
            }
        }
    }

    fn finish_fade_out(&self, inner: &mut AssetInner, as_pause: bool) -> AudioResult<()> {
        if as_pause {
            self.pause_locked(inner).map(|_| ())
        } else {
            self.stop_locked(inner)
        }
    }

    fn start_poller(&self, inner: &mut AssetInner) {
        let generation = inner.poller.begin();
        let me = self.me.clone();
        let task = self.ctx.scheduler.schedule(
            POLL_WARM_UP,
            Some(POLL_INTERVAL),
            Box::new(move || match me.upgrade() {
                Some(asset) => asset.poll_tick(generation),
                None => ControlFlow::Break(()),
            }),
        );
        inner.poller.attach(generation, task);
    }

    fn poll_tick(&self, generation: u64) -> ControlFlow<()> {
        let mut inner = self.inner.lock();
        if inner.unloaded || !inner.poller.is_current(generation) {
            return ControlFlow::Break(());
        }

        let single = inner.channels.len() == 1;
        let active = inner.active;
        let Some(channel) = inner.channels.get_mut(active) else {
            inner.poller.stop();
            return ControlFlow::Break(());
        };
        if channel.is_released() {
            inner.poller.stop();
            return ControlFlow::Break(());
        }
        if !channel.is_ready() {
            tracing::trace!("Waiting for {} to become ready", self.id);
            return ControlFlow::Continue(());
        }

        if channel.is_playing() {
            let position = if single {
                round_to_tenth(channel.position().unwrap_or(0.0))
            } else {
                0.0
            };
            tracing::trace!("Position of {}: {:.1}s", self.id, position);
            self.ctx.events.publish(Event::PositionUpdate {
                asset_id: self.id.clone(),
                seconds: position,
            });

            if single {
                if let Some(schedule) = self.ctx.schedules.take_due(&self.id, position) {
                    tracing::debug!(
                        "Scheduled fade-out of {} reached at {:.1}s",
                        self.id,
                        position
                    );
                    if let Err(e) =
                        self.stop_with_fade_locked(&mut inner, schedule.duration_ms, false)
                    {
                        tracing::error!("Scheduled fade-out on {} failed: {}", self.id, e);
                    }
                }
            }
            return ControlFlow::Continue(());
        }

        let paused = channel.is_paused();
        inner.poller.stop();
        if paused {
            tracing::trace!("{} is paused, poller stopped", self.id);
        } else {
            self.dispatch_completion(&mut inner);
        }
        ControlFlow::Break(())
    }
}
