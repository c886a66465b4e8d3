//! Scripted in-memory media backend on virtual time
//!
//! Players advance their position with the `ManualScheduler` clock, so a
//! test drives playback, fades and polling entirely through `advance`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use native_audio::audio_system::{
    AssetSource, BackendSignal, MediaBackend, MediaPlayer, SignalSink, SourceKind,
};
use native_audio::runtime::{ManualScheduler, Scheduler};
use native_audio::{AudioError, AudioResult, AudioSystemManager, EngineConfig, Event};

pub const DEFAULT_DURATION: f64 = 10.0;

/// Observable state of one opened player
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub reference: String,
    pub ready: bool,
    pub playing: bool,
    pub paused: bool,
    pub looping: bool,
    pub released: bool,
    pub duration: f64,
    pub rate: f64,
    pub volume: f32,
    /// Every volume applied, in order
    pub volumes: Vec<f32>,
    /// Start position of every play
    pub plays: Vec<f64>,
    pub loops: usize,
    pub resumes: usize,
    pub stops: usize,
    pub seeks: Vec<f64>,
    pub fail_volume: bool,
    base: f64,
    anchor: Duration,
}

impl PlayerState {
    fn new(reference: &str, duration: f64, ready: bool) -> Self {
        Self {
            reference: reference.to_string(),
            ready,
            playing: false,
            paused: false,
            looping: false,
            released: false,
            duration,
            rate: 1.0,
            volume: 1.0,
            volumes: Vec::new(),
            plays: Vec::new(),
            loops: 0,
            resumes: 0,
            stops: 0,
            seeks: Vec::new(),
            fail_volume: false,
            base: 0.0,
            anchor: Duration::ZERO,
        }
    }

    fn raw_position(&self, now: Duration) -> f64 {
        if !self.playing {
            return self.base;
        }
        self.base + now.saturating_sub(self.anchor).as_secs_f64() * self.rate
    }

    fn position_at(&self, now: Duration) -> f64 {
        let raw = self.raw_position(now);
        if self.looping && self.duration > 0.0 {
            raw % self.duration
        } else {
            raw.min(self.duration)
        }
    }

    fn is_playing_at(&self, now: Duration) -> bool {
        self.playing && (self.looping || self.raw_position(now) < self.duration)
    }

    fn rebase(&mut self, now: Duration, position: f64) {
        self.base = position;
        self.anchor = now;
    }
}

#[derive(Default)]
struct BackendState {
    durations: HashMap<String, f64>,
    failing: HashSet<String>,
    players: Vec<Arc<Mutex<PlayerState>>>,
    sinks: Vec<SignalSink>,
}

/// Backend whose players live in memory
#[derive(Clone)]
pub struct FakeBackend {
    clock: Arc<ManualScheduler>,
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new(clock: Arc<ManualScheduler>) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    /// Media length reported for `reference` (default 10 s)
    pub fn set_duration(&self, reference: &str, seconds: f64) {
        self.state
            .lock()
            .durations
            .insert(reference.to_string(), seconds);
    }

    /// Make every open of `reference` fail
    pub fn fail_open(&self, reference: &str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(reference.to_string());
        } else {
            state.failing.remove(reference);
        }
    }

    /// Number of players opened so far
    pub fn opened(&self) -> usize {
        self.state.lock().players.len()
    }

    /// Snapshot of the player opened `index`-th
    pub fn player(&self, index: usize) -> PlayerState {
        self.state.lock().players[index].lock().clone()
    }

    pub fn with_player<R>(&self, index: usize, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        let player = Arc::clone(&self.state.lock().players[index]);
        let mut player = player.lock();
        f(&mut player)
    }

    /// Mark player `index` ready and notify its channel
    pub fn signal_ready(&self, index: usize) {
        self.with_player(index, |p| p.ready = true);
        self.signal(index, BackendSignal::Ready);
    }

    /// Report a transport error from player `index`
    pub fn signal_error(&self, index: usize, message: &str) {
        self.with_player(index, |p| {
            p.ready = false;
            p.playing = false;
        });
        self.signal(index, BackendSignal::Error(message.to_string()));
    }

    pub fn signal(&self, index: usize, signal: BackendSignal) {
        let sink = self.state.lock().sinks[index].clone();
        sink.send(signal);
    }
}

impl MediaBackend for FakeBackend {
    fn open(&self, source: &AssetSource, signals: SignalSink) -> AudioResult<Box<dyn MediaPlayer>> {
        let mut state = self.state.lock();
        if state.failing.contains(source.reference()) {
            return Err(AudioError::invalid_source(source.reference(), "scripted open failure"));
        }

        let duration = state
            .durations
            .get(source.reference())
            .copied()
            .unwrap_or(DEFAULT_DURATION);
        let ready = source.kind() == SourceKind::File;
        let player = Arc::new(Mutex::new(PlayerState::new(
            source.reference(),
            duration,
            ready,
        )));
        state.players.push(Arc::clone(&player));
        state.sinks.push(signals);

        Ok(Box::new(FakePlayer {
            state: player,
            clock: Arc::clone(&self.clock),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakePlayer {
    state: Arc<Mutex<PlayerState>>,
    clock: Arc<ManualScheduler>,
}

impl FakePlayer {
    fn with_open<R>(&mut self, f: impl FnOnce(&mut PlayerState, Duration) -> R) -> AudioResult<R> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.released {
            return Err(AudioError::backend("player released"));
        }
        Ok(f(&mut state, now))
    }
}

impl MediaPlayer for FakePlayer {
    fn play(&mut self, at_seconds: f64) -> AudioResult<()> {
        self.with_open(|p, now| {
            p.plays.push(at_seconds);
            p.looping = false;
            p.playing = true;
            p.paused = false;
            p.rebase(now, at_seconds);
        })
    }

    fn play_looping(&mut self) -> AudioResult<()> {
        self.with_open(|p, now| {
            p.loops += 1;
            p.looping = true;
            p.playing = true;
            p.paused = false;
            p.rebase(now, 0.0);
        })
    }

    fn pause(&mut self) -> AudioResult<()> {
        self.with_open(|p, now| {
            let position = p.position_at(now);
            p.playing = false;
            p.paused = true;
            p.rebase(now, position);
        })
    }

    fn resume(&mut self) -> AudioResult<()> {
        self.with_open(|p, now| {
            p.resumes += 1;
            let position = p.position_at(now);
            p.playing = true;
            p.paused = false;
            p.rebase(now, position);
        })
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.with_open(|p, now| {
            p.stops += 1;
            p.playing = false;
            p.paused = false;
            p.rebase(now, 0.0);
        })
    }

    fn seek(&mut self, seconds: f64) -> AudioResult<()> {
        self.with_open(|p, now| {
            p.seeks.push(seconds);
            p.rebase(now, seconds);
        })
    }

    fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        let result = self.with_open(|p, _| {
            if p.fail_volume {
                return false;
            }
            p.volume = volume;
            p.volumes.push(volume);
            true
        })?;
        if !result {
            return Err(AudioError::backend("scripted volume failure"));
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> AudioResult<()> {
        self.with_open(|p, now| {
            let position = p.position_at(now);
            p.rate = rate as f64;
            p.rebase(now, position);
        })
    }

    fn is_ready(&self) -> bool {
        let state = self.state.lock();
        state.ready && !state.released
    }

    fn is_playing(&self) -> bool {
        self.state.lock().is_playing_at(self.clock.now())
    }

    fn duration(&self) -> Option<f64> {
        let state = self.state.lock();
        state.ready.then_some(state.duration)
    }

    fn position(&self) -> Option<f64> {
        let state = self.state.lock();
        state.ready.then(|| state.position_at(self.clock.now()))
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.released = true;
        state.playing = false;
    }
}

/// Manager on virtual time over a `FakeBackend`
pub struct Harness {
    pub clock: Arc<ManualScheduler>,
    pub backend: FakeBackend,
    pub manager: AudioSystemManager,
    pub events: Receiver<Event>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualScheduler::new());
        let backend = FakeBackend::new(Arc::clone(&clock));
        let scheduler: Arc<dyn Scheduler> = clock.clone();
        let manager = AudioSystemManager::new(Arc::new(backend.clone()), scheduler, config);
        let (events, _id) = manager.subscribe();
        Self {
            clock,
            backend,
            manager,
            events,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    /// Deliver queued backend signals
    pub fn settle(&self) {
        self.clock.run_pending();
    }

    /// Every event published so far that has not been taken yet
    pub fn drain_events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    pub fn completed_count(events: &[Event], id: &str) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::Completed { asset_id } if asset_id == id))
            .count()
    }

    pub fn positions(events: &[Event], id: &str) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::PositionUpdate { asset_id, seconds } if asset_id == id => Some(*seconds),
                _ => None,
            })
            .collect()
    }
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
