use thiserror::Error;

/// Playback errors using thiserror for structured error handling.
///
/// Command-level failures (unknown id, duplicate load, bad source) are
/// returned to the caller synchronously and never retried. Transport
/// failures raised inside timer callbacks are logged and turned into
/// events instead of being propagated.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio asset not found: {0}")]
    AssetNotFound(String),

    #[error("Audio asset already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("No playback channel available for asset: {0}")]
    ChannelUnavailable(String),

    #[error("Invalid audio source '{reference}': {reason}")]
    InvalidSource { reference: String, reason: String },

    #[error("Audio backend failure: {message}")]
    BackendError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Audio scheduler is shut down")]
    SchedulerClosed,
}

impl AudioError {
    pub fn invalid_source(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        AudioError::InvalidSource {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        AudioError::BackendError {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AudioError::BackendError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine the platform config directory")]
    NoConfigDir,
}

/// Result alias for playback operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
