/// Outward playback events
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::audio_system::focus::FocusSignal;

/// Playback events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Playback position of an asset, rounded to 0.1 s.
    /// Emitted at most once per poll tick (100 ms).
    PositionUpdate { asset_id: String, seconds: f64 },

    /// Playback of an asset finished or was stopped.
    /// Emitted once per play session.
    Completed { asset_id: String },

    /// The backend reported the duration of an asset
    DurationAvailable { asset_id: String, seconds: f64 },

    /// A channel failed and could not be recovered
    BackendError { asset_id: String, message: String },

    /// A focus or lifecycle signal was handled
    Interruption { signal: FocusSignal },
}

impl Event {
    /// Asset the event refers to, if any
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            Event::PositionUpdate { asset_id, .. }
            | Event::Completed { asset_id }
            | Event::DurationAvailable { asset_id, .. }
            | Event::BackendError { asset_id, .. } => Some(asset_id),
            Event::Interruption { .. } => None,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            Event::PositionUpdate { asset_id, seconds } => {
                format!("Position of {}: {:.1}s", asset_id, seconds)
            }
            Event::Completed { asset_id } => format!("Playback completed: {}", asset_id),
            Event::DurationAvailable { asset_id, seconds } => {
                format!("Duration of {}: {:.1}s", asset_id, seconds)
            }
            Event::BackendError { asset_id, message } => {
                format!("Backend error on {}: {}", asset_id, message)
            }
            Event::Interruption { signal } => format!("Interruption: {:?}", signal),
        }
    }
}
