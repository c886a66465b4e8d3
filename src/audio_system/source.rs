/// Asset sources
///
/// Classifies the opaque source reference given at load time into the two
/// kinds of asset the controller knows how to drive.
use std::fmt;
use std::path::PathBuf;

use crate::error::{AudioError, AudioResult};

/// Asset categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Finite media (local file or downloadable URL). Ready on open.
    File,

    /// Live/HLS stream. Readiness is asynchronous and `stop` re-opens.
    Stream,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => write!(f, "file"),
            SourceKind::Stream => write!(f, "stream"),
        }
    }
}

impl SourceKind {
    /// Whether every operation must wait for the backend's ready signal
    pub fn gates_on_ready(&self) -> bool {
        matches!(self, SourceKind::Stream)
    }

    /// Whether `stop` must re-open the source instead of rewinding
    pub fn reopens_on_stop(&self) -> bool {
        matches!(self, SourceKind::Stream)
    }
}

/// A classified source reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    reference: String,
    kind: SourceKind,
    is_url: bool,
}

impl AssetSource {
    /// Classify `reference`.
    ///
    /// With `is_url`, `http(s)` URLs whose path ends in `.m3u8` are streams,
    /// other `http(s)` and `file://` URLs are file-backed, and any other
    /// scheme is rejected. Without it the reference is a local path.
    pub fn classify(reference: &str, is_url: bool) -> AudioResult<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(AudioError::invalid_source(reference, "empty source reference"));
        }

        if !is_url {
            return Ok(Self {
                reference: trimmed.to_string(),
                kind: SourceKind::File,
                is_url: false,
            });
        }

        let lower = trimmed.to_ascii_lowercase();
        let kind = if lower.starts_with("http://") || lower.starts_with("https://") {
            let path = lower.split(['?', '#']).next().unwrap_or_default();
            if path.ends_with(".m3u8") {
                SourceKind::Stream
            } else {
                SourceKind::File
            }
        } else if lower.starts_with("file://") {
            SourceKind::File
        } else {
            return Err(AudioError::invalid_source(reference, "unsupported URL scheme"));
        };

        Ok(Self {
            reference: trimmed.to_string(),
            kind,
            is_url: true,
        })
    }

    /// Local file source
    pub fn file(path: impl Into<String>) -> AudioResult<Self> {
        Self::classify(&path.into(), false)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Whether the source lives behind an `http(s)` URL
    pub fn is_remote(&self) -> bool {
        let lower = self.reference.to_ascii_lowercase();
        self.is_url && (lower.starts_with("http://") || lower.starts_with("https://"))
    }

    /// Filesystem path for local sources
    pub fn local_path(&self) -> Option<PathBuf> {
        if !self.is_url {
            return Some(PathBuf::from(&self.reference));
        }
        self.reference
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("file://"))
            .map(|_| PathBuf::from(&self.reference[7..]))
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference, self.kind)
    }
}
