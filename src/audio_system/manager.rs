/// Audio system manager
///
/// The command surface of the controller. Every command is marshalled onto
/// the serialized context and resolves exactly once with its result.
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use super::asset::{AssetContext, AssetHandle};
use super::backend::MediaBackend;
use super::effects::fade::secs_to_ms;
use super::effects::Volume;
use super::focus::{FadeOutSchedule, FocusOrchestrator, FocusSignal};
use super::options::{ConfigureOptions, LoadOptions, PlayOptions, StopOptions};
use super::source::AssetSource;
use crate::config::EngineConfig;
use crate::error::{AudioError, AudioResult};
use crate::messaging::{Event, EventBus, SubscriberId};
use crate::runtime::{self, Scheduler, ThreadScheduler};

struct Shared {
    scheduler: Arc<dyn Scheduler>,
    backend: Arc<dyn MediaBackend>,
    events: EventBus,
    orchestrator: FocusOrchestrator,
    config: RwLock<EngineConfig>,
    me: Weak<Shared>,
}

impl Shared {
    fn asset_context(&self) -> AssetContext {
        AssetContext {
            scheduler: Arc::clone(&self.scheduler),
            events: self.events.clone(),
            backend: Arc::clone(&self.backend),
            resume_set: Arc::clone(self.orchestrator.resume_set()),
            schedules: Arc::clone(self.orchestrator.schedules()),
        }
    }

    /// Immediate play/fade-in, replacing any scheduled fade-out
    fn start_play(&self, id: &str, options: &PlayOptions) -> AudioResult<()> {
        let asset = self.orchestrator.get(id)?;
        let config = self.config.read().clone();
        let schedules = self.orchestrator.schedules();
        schedules.clear(id);

        if options.fade_out && asset.channel_count() != 1 {
            tracing::warn!(
                "{} plays on {} channels without a position, skipping fade-out scheduling",
                id,
                asset.channel_count()
            );
        } else if options.fade_out {
            match options.fade_out_start(asset.duration()?, &config) {
                Some(start_seconds) => {
                    let duration_ms = options.fade_out_ms(&config);
                    tracing::debug!(
                        "Scheduling fade-out of {} at {:.1}s over {}ms",
                        id,
                        start_seconds,
                        duration_ms
                    );
                    schedules.set(
                        id,
                        FadeOutSchedule {
                            start_seconds,
                            duration_ms,
                        },
                    );
                }
                None => {
                    tracing::warn!("Duration of {} not available, skipping fade-out scheduling", id)
                }
            }
        }

        if options.fade_in {
            let target = options.volume.unwrap_or_else(|| asset.volume());
            asset.play_with_fade_in(options.time, target, options.fade_in_ms(&config))
        } else {
            asset.play(options.time, options.volume)
        }
    }

    fn schedule_play(&self, id: &str, delay: Duration, options: PlayOptions) {
        let me = self.me.clone();
        let asset_id = id.to_string();
        let task = self.scheduler.schedule(
            delay,
            None,
            Box::new(move || {
                if let Some(shared) = me.upgrade() {
                    shared.orchestrator.complete_pending_play(&asset_id);
                    if let Err(e) = shared.start_play(&asset_id, &options) {
                        tracing::error!("Delayed play of {} failed: {}", asset_id, e);
                    }
                }
                ControlFlow::Break(())
            }),
        );
        self.orchestrator.replace_pending_play(id, task);
        tracing::debug!("Scheduled play of {}", id);
    }
}

/// Audio system manager
///
/// Owns the asset registry (through the focus orchestrator), the event bus
/// and the serialized context.
pub struct AudioSystemManager {
    shared: Arc<Shared>,
}

impl AudioSystemManager {
    /// Create a manager driving `backend` on `scheduler`
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        scheduler: Arc<dyn Scheduler>,
        config: EngineConfig,
    ) -> Self {
        let events = EventBus::new();
        let orchestrator = FocusOrchestrator::new(events.clone(), config.focus, config.background);
        tracing::debug!("Audio system manager created on {}", backend.name());

        Self {
            shared: Arc::new_cyclic(|me| Shared {
                scheduler,
                backend,
                events,
                orchestrator,
                config: RwLock::new(config),
                me: me.clone(),
            }),
        }
    }

    /// Create a manager with its own executor and timer threads
    pub fn with_threads(backend: Arc<dyn MediaBackend>, config: EngineConfig) -> AudioResult<Self> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::new()?);
        Ok(Self::new(backend, scheduler, config))
    }

    /// Run `f` on the serialized context
    fn run<R, F>(&self, f: F) -> AudioResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Shared) -> AudioResult<R> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        runtime::call(self.shared.scheduler.as_ref(), move || f(&shared))?
    }

    fn run_on_asset<R, F>(&self, id: &str, f: F) -> AudioResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Shared, Arc<AssetHandle>) -> AudioResult<R> + Send + 'static,
    {
        let id = id.to_string();
        self.run(move |shared| {
            let asset = shared.orchestrator.get(&id)?;
            f(shared, asset)
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.shared.config.read().clone()
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.events.unsubscribe(id);
    }

    /// Load `reference` under `id`
    pub fn load(&self, id: &str, reference: &str, options: LoadOptions) -> AudioResult<()> {
        if id.trim().is_empty() {
            return Err(AudioError::InvalidArgument("asset id must not be empty".to_string()));
        }
        let source = AssetSource::classify(reference, options.is_url)?;
        let (channels, volume) = {
            let config = self.shared.config.read();
            (
                options.channels.unwrap_or(config.default_channels),
                options.volume.unwrap_or(config.default_volume),
            )
        };
        let volume = Volume::checked(volume)?;

        let id = id.to_string();
        self.run(move |shared| {
            if shared.orchestrator.contains(&id) {
                return Err(AudioError::AlreadyLoaded(id));
            }
            let asset =
                AssetHandle::load(&id, source, channels, volume.level(), shared.asset_context())?;
            shared.orchestrator.register(asset)
        })
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.shared.orchestrator.contains(id)
    }

    pub fn loaded_count(&self) -> usize {
        self.shared.orchestrator.ids().len()
    }

    /// Play `id`, now or after `options.delay`. A new play request for the
    /// same id replaces a pending delayed one.
    pub fn play(&self, id: &str, options: PlayOptions) -> AudioResult<()> {
        if !options.time.is_finite() {
            return Err(AudioError::InvalidArgument(format!(
                "play time must be finite, got {}",
                options.time
            )));
        }
        let delay = Duration::try_from_secs_f64(options.delay).map_err(|_| {
            AudioError::InvalidArgument(format!("invalid play delay: {}", options.delay))
        })?;
        if let Some(volume) = options.volume {
            Volume::checked(volume)?;
        }

        self.run_on_asset(id, move |shared, asset| {
            shared.orchestrator.cancel_pending_play(asset.id());
            if !delay.is_zero() {
                shared.schedule_play(asset.id(), delay, options);
                return Ok(());
            }
            shared.start_play(asset.id(), &options)
        })
    }

    /// Play `id` in repeat mode
    pub fn loop_playback(&self, id: &str) -> AudioResult<()> {
        self.run_on_asset(id, |shared, asset| {
            shared.orchestrator.cancel_pending_play(asset.id());
            shared.orchestrator.schedules().clear(asset.id());
            asset.loop_playback()
        })
    }

    pub fn pause(&self, id: &str) -> AudioResult<()> {
        self.run_on_asset(id, |shared, asset| {
            shared.orchestrator.resume_set().remove(asset.id());
            asset.pause().map(|_| ())
        })
    }

    pub fn resume(&self, id: &str) -> AudioResult<()> {
        self.run_on_asset(id, |shared, asset| {
            shared.orchestrator.resume_set().remove(asset.id());
            asset.resume()
        })
    }

    pub fn stop(&self, id: &str, options: StopOptions) -> AudioResult<()> {
        self.run_on_asset(id, move |shared, asset| {
            shared.orchestrator.cancel_pending_play(asset.id());
            shared.orchestrator.schedules().clear(asset.id());
            shared.orchestrator.resume_set().remove(asset.id());

            if options.fade_out {
                let duration_ms = options.fade_out_ms(&shared.config.read());
                asset.stop_with_fade(duration_ms, options.as_pause)
            } else if options.as_pause {
                asset.pause().map(|_| ())
            } else {
                asset.stop()
            }
        })
    }

    /// Set volume, ramping over `ramp_seconds` when playing
    pub fn set_volume(&self, id: &str, volume: f32, ramp_seconds: f64) -> AudioResult<()> {
        let volume = Volume::checked(volume)?;
        let ramp_ms = secs_to_ms(ramp_seconds);
        self.run_on_asset(id, move |_, asset| asset.set_volume(volume.level(), ramp_ms))
    }

    pub fn set_rate(&self, id: &str, rate: f32) -> AudioResult<()> {
        self.run_on_asset(id, move |_, asset| asset.set_rate(rate))
    }

    /// Seek; clears any scheduled fade-out and pending delayed play
    pub fn seek(&self, id: &str, seconds: f64) -> AudioResult<()> {
        self.run_on_asset(id, move |shared, asset| {
            shared.orchestrator.cancel_pending_play(asset.id());
            shared.orchestrator.schedules().clear(asset.id());
            asset.seek(seconds)
        })
    }

    /// Duration in seconds, `None` while the backend does not know it yet
    pub fn get_duration(&self, id: &str) -> AudioResult<Option<f64>> {
        self.run_on_asset(id, |_, asset| asset.duration())
    }

    /// Receiver resolved with the duration once it is known
    pub fn await_duration(&self, id: &str) -> AudioResult<Receiver<f64>> {
        self.run_on_asset(id, |_, asset| asset.await_duration())
    }

    pub fn get_position(&self, id: &str) -> AudioResult<f64> {
        self.run_on_asset(id, |_, asset| asset.position())
    }

    pub fn is_playing(&self, id: &str) -> AudioResult<bool> {
        self.run_on_asset(id, |_, asset| Ok(asset.is_playing()))
    }

    /// Unload `id`, releasing its channels
    pub fn unload(&self, id: &str) -> AudioResult<()> {
        let id = id.to_string();
        self.run(move |shared| {
            let asset = shared
                .orchestrator
                .remove(&id)
                .ok_or_else(|| AudioError::AssetNotFound(id.clone()))?;
            asset.unload();
            Ok(())
        })
    }

    /// Unload every asset
    pub fn unload_all(&self) -> AudioResult<()> {
        self.run(|shared| {
            let assets = shared.orchestrator.remove_all();
            let count = assets.len();
            for asset in assets {
                asset.unload();
            }
            if count > 0 {
                tracing::info!("Unloaded all {} assets", count);
            }
            Ok(())
        })
    }

    /// Update focus/background handling
    pub fn configure(&self, options: ConfigureOptions) -> AudioResult<()> {
        self.run(move |shared| {
            {
                let mut config = shared.config.write();
                config.focus = options.focus;
                config.background = options.background;
            }
            shared.orchestrator.configure(options.focus, options.background);
            Ok(())
        })
    }

    /// Forward a platform focus/lifecycle signal. Returns whether it was
    /// honoured under the current configuration.
    pub fn handle_focus_signal(&self, signal: FocusSignal) -> AudioResult<bool> {
        self.run(move |shared| Ok(shared.orchestrator.handle_signal(signal)))
    }

    /// Ids currently waiting to be auto-resumed, in resume order
    pub fn auto_resume_ids(&self) -> Vec<String> {
        self.shared.orchestrator.resume_set().ids()
    }

    pub fn has_pending_play(&self, id: &str) -> bool {
        self.shared.orchestrator.has_pending_play(id)
    }

    pub fn fade_out_schedule(&self, id: &str) -> Option<FadeOutSchedule> {
        self.shared.orchestrator.schedules().get(id)
    }
}

impl Drop for AudioSystemManager {
    fn drop(&mut self) {
        if let Err(e) = self.unload_all() {
            tracing::debug!("Unload on drop failed: {}", e);
        }
    }
}
