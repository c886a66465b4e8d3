//! Focus and lifecycle orchestration
//!
//! Process-wide state shared by every asset: the registry of loaded assets,
//! the auto-resume set, pending delayed plays and scheduled fade-outs.
//! Reacts to externally signalled interruptions by pausing, resuming or
//! stopping assets.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::asset::AssetHandle;
use crate::error::{AudioError, AudioResult};
use crate::messaging::{Event, EventBus};
use crate::runtime::TaskHandle;

/// Interruption and lifecycle signals from the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSignal {
    /// Another app briefly needs audio
    InterruptionBegan,

    /// The interruption is over; resume only when granted
    InterruptionEnded { should_resume: bool },

    /// Audio focus is gone for good (e.g. route lost)
    FocusLost,

    /// The app moved to the background
    AppBackgrounded,

    /// The app returned to the foreground
    AppForegrounded,
}

impl FocusSignal {
    /// Signals that belong to the audio focus family (vs. app lifecycle)
    pub fn is_focus(&self) -> bool {
        matches!(
            self,
            FocusSignal::InterruptionBegan
                | FocusSignal::InterruptionEnded { .. }
                | FocusSignal::FocusLost
        )
    }
}

/// Assets paused by an interruption, in the order they were paused
#[derive(Debug, Default)]
pub struct AutoResumeSet {
    ids: Mutex<VecDeque<String>>,
}

impl AutoResumeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` unless already present. Returns whether it was added.
    pub fn add(&self, id: &str) -> bool {
        let mut ids = self.ids.lock();
        if ids.iter().any(|queued| queued == id) {
            return false;
        }
        ids.push_back(id.to_string());
        true
    }

    /// Remove `id` if present. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut ids = self.ids.lock();
        let before = ids.len();
        ids.retain(|queued| queued != id);
        ids.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().iter().any(|queued| queued == id)
    }

    /// Take every entry in FIFO order
    pub fn drain(&self) -> Vec<String> {
        self.ids.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.ids.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().iter().cloned().collect()
    }
}

/// When to start an automatic fade-out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOutSchedule {
    pub start_seconds: f64,
    pub duration_ms: u64,
}

/// Per-asset fade-out-at-time metadata
#[derive(Debug, Default)]
pub struct FadeOutSchedules {
    schedules: Mutex<HashMap<String, FadeOutSchedule>>,
}

impl FadeOutSchedules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: &str, schedule: FadeOutSchedule) {
        self.schedules.lock().insert(id.to_string(), schedule);
    }

    pub fn get(&self, id: &str) -> Option<FadeOutSchedule> {
        self.schedules.lock().get(id).copied()
    }

    pub fn clear(&self, id: &str) -> bool {
        self.schedules.lock().remove(id).is_some()
    }

    /// Remove and return the schedule of `id` once `position` has reached
    /// its start time
    pub fn take_due(&self, id: &str, position: f64) -> Option<FadeOutSchedule> {
        let mut schedules = self.schedules.lock();
        match schedules.get(id) {
            Some(schedule) if position >= schedule.start_seconds => schedules.remove(id),
            _ => None,
        }
    }
}

/// Registry of loaded assets plus interruption bookkeeping
pub struct FocusOrchestrator {
    assets: Mutex<BTreeMap<String, Arc<AssetHandle>>>,
    resume_set: Arc<AutoResumeSet>,
    schedules: Arc<FadeOutSchedules>,
    pending_plays: Mutex<HashMap<String, TaskHandle>>,
    focus: AtomicBool,
    background: AtomicBool,
    events: EventBus,
}

impl FocusOrchestrator {
    pub fn new(events: EventBus, focus: bool, background: bool) -> Self {
        Self {
            assets: Mutex::new(BTreeMap::new()),
            resume_set: Arc::new(AutoResumeSet::new()),
            schedules: Arc::new(FadeOutSchedules::new()),
            pending_plays: Mutex::new(HashMap::new()),
            focus: AtomicBool::new(focus),
            background: AtomicBool::new(background),
            events,
        }
    }

    pub fn resume_set(&self) -> &Arc<AutoResumeSet> {
        &self.resume_set
    }

    pub fn schedules(&self) -> &Arc<FadeOutSchedules> {
        &self.schedules
    }

    /// Update which signal families are honoured
    pub fn configure(&self, focus: bool, background: bool) {
        self.focus.store(focus, Ordering::SeqCst);
        self.background.store(background, Ordering::SeqCst);
        tracing::info!("Configured audio focus: {}, background: {}", focus, background);
    }

    pub fn focus_enabled(&self) -> bool {
        self.focus.load(Ordering::SeqCst)
    }

    pub fn background_enabled(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }

    pub fn register(&self, asset: Arc<AssetHandle>) -> AudioResult<()> {
        let mut assets = self.assets.lock();
        if assets.contains_key(asset.id()) {
            return Err(AudioError::AlreadyLoaded(asset.id().to_string()));
        }
        assets.insert(asset.id().to_string(), asset);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.lock().contains_key(id)
    }

    pub fn get(&self, id: &str) -> AudioResult<Arc<AssetHandle>> {
        self.assets
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AudioError::AssetNotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<AssetHandle>> {
        self.cancel_pending_play(id);
        self.assets.lock().remove(id)
    }

    pub fn remove_all(&self) -> Vec<Arc<AssetHandle>> {
        let ids: Vec<String> = self.pending_plays.lock().keys().cloned().collect();
        for id in ids {
            self.cancel_pending_play(&id);
        }
        std::mem::take(&mut *self.assets.lock()).into_values().collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.assets.lock().keys().cloned().collect()
    }

    fn snapshot(&self) -> Vec<Arc<AssetHandle>> {
        self.assets.lock().values().cloned().collect()
    }

    /// Track a delayed play for `id`, cancelling the previous one
    pub fn replace_pending_play(&self, id: &str, task: TaskHandle) {
        if let Some(previous) = self.pending_plays.lock().insert(id.to_string(), task) {
            previous.cancel();
            tracing::debug!("Replaced pending delayed play of {}", id);
        }
    }

    /// Cancel the delayed play of `id`, if any
    pub fn cancel_pending_play(&self, id: &str) -> bool {
        match self.pending_plays.lock().remove(id) {
            Some(task) => {
                task.cancel();
                tracing::debug!("Cancelled pending delayed play of {}", id);
                true
            }
            None => false,
        }
    }

    /// Forget the delayed play of `id` once it has fired
    pub fn complete_pending_play(&self, id: &str) {
        self.pending_plays.lock().remove(id);
    }

    pub fn has_pending_play(&self, id: &str) -> bool {
        self.pending_plays.lock().contains_key(id)
    }

    /// React to a platform signal. Returns whether it was honoured.
    pub fn handle_signal(&self, signal: FocusSignal) -> bool {
        if signal.is_focus() && !self.focus_enabled() {
            tracing::debug!("Ignoring {:?}: focus handling disabled", signal);
            return false;
        }
        if !signal.is_focus() && self.background_enabled() {
            tracing::debug!("Ignoring {:?}: background playback enabled", signal);
            return false;
        }

        tracing::info!("Handling {:?}", signal);
        match signal {
            FocusSignal::InterruptionBegan | FocusSignal::AppBackgrounded => {
                self.pause_for_interruption()
            }
            FocusSignal::InterruptionEnded { should_resume: true } | FocusSignal::AppForegrounded => {
                self.resume_interrupted()
            }
            FocusSignal::InterruptionEnded { should_resume: false } => {
                tracing::debug!(
                    "Interruption ended without resume grant; {} asset(s) stay paused",
                    self.resume_set.len()
                );
            }
            FocusSignal::FocusLost => self.stop_all(),
        }

        self.events.publish(Event::Interruption { signal });
        true
    }

    fn pause_for_interruption(&self) {
        for asset in self.snapshot() {
            if !asset.is_playing() {
                continue;
            }
            match asset.pause() {
                Ok(true) => {
                    self.resume_set.add(asset.id());
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to pause {}: {}", asset.id(), e),
            }
        }
    }

    fn resume_interrupted(&self) {
        for id in self.resume_set.drain() {
            let Ok(asset) = self.get(&id) else {
                continue;
            };
            if let Err(e) = asset.resume() {
                tracing::warn!("Failed to resume {}: {}", id, e);
            }
        }
    }

    fn stop_all(&self) {
        for asset in self.snapshot() {
            self.cancel_pending_play(asset.id());
            self.schedules.clear(asset.id());
            if let Err(e) = asset.stop() {
                tracing::warn!("Failed to stop {}: {}", asset.id(), e);
            }
        }
        self.resume_set.clear();
    }
}
