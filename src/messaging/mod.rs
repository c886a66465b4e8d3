/// Messaging module
///
/// Playback events are notifications of things that happened (past tense,
/// broadcast). Commands are plain method calls on `AudioSystemManager`.
///
/// ## Architecture
///
/// ```text
/// ┌──────────────┐  poll tick /   ┌──────────┐   Event   ┌─────────────┐
/// │ AssetHandle  │ ─────────────> │ EventBus │ ────────> │ Subscribers │
/// │ Orchestrator │  focus signal  │          │           │             │
/// └──────────────┘                └──────────┘           └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (rx, _id) = manager.subscribe();
///
/// while let Ok(event) = rx.recv() {
///     match event {
///         Event::Completed { asset_id } => { /* playback done */ },
///         _ => {}
///     }
/// }
/// ```

pub mod events;
pub mod bus;

// Re-export commonly used types
pub use events::Event;
pub use bus::{EventBus, SubscriberId};
