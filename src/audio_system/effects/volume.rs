/// Volume levels
///
/// Validated 0.0-1.0 volume used by load/play/set_volume.
use crate::error::{AudioError, AudioResult};

/// Volume level (0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    level: f32,
}

impl Volume {
    pub const MUTED: Volume = Volume { level: 0.0 };
    pub const FULL: Volume = Volume { level: 1.0 };

    /// Create a new volume, clamped to 0.0-1.0
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::MUTED;
        }
        Self {
            level: level.clamp(0.0, 1.0),
        }
    }

    /// Validate a caller-supplied level; out-of-range values are clamped,
    /// non-finite ones rejected
    pub fn checked(level: f32) -> AudioResult<Self> {
        if !level.is_finite() {
            return Err(AudioError::InvalidArgument(format!(
                "volume must be finite, got {}",
                level
            )));
        }
        Ok(Self::new(level))
    }

    /// Get the volume level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.level == 0.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<Volume> for f32 {
    fn from(volume: Volume) -> Self {
        volume.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_creation() {
        let volume = Volume::new(0.5);
        assert_eq!(volume.level(), 0.5);
    }

    #[test]
    fn test_volume_clamping() {
        assert_eq!(Volume::new(1.5).level(), 1.0);
        assert_eq!(Volume::new(-0.5).level(), 0.0);
        assert!(Volume::new(f32::NAN).is_muted());
    }

    #[test]
    fn test_checked_rejects_non_finite() {
        assert!(Volume::checked(f32::INFINITY).is_err());
        assert_eq!(Volume::checked(2.0).unwrap(), Volume::FULL);
    }

    #[test]
    fn test_default_volume() {
        let volume = Volume::default();
        assert_eq!(volume.level(), 1.0);
        assert!(!volume.is_muted());
        assert_eq!(f32::from(volume), 1.0);
    }
}
