//! Scheduler and per-owner animation configuration

use crate::error::{AnimationError, Result};
use crate::interpolator::{Linear, SharedInterpolator};
use crate::value::DEFAULT_DURATION_MS;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Frame scheduler configuration
///
/// Can be loaded from TOML:
///
/// ```toml
/// frames_per_second = 120
/// syncing = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Tick rate of the background thread
    #[serde(default = "default_fps")]
    pub frames_per_second: u32,
    /// Invoke the renderer sync callback after each value advances
    #[serde(default)]
    pub syncing: bool,
    /// Spawn the tick thread automatically when a value is registered.
    /// When disabled the owner drives the scheduler with `tick()`.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_fps() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frames_per_second: default_fps(),
            syncing: false,
            auto_start: true,
        }
    }
}

impl SchedulerConfig {
    /// Configuration for a scheduler that is ticked by hand
    pub fn manual() -> Self {
        Self {
            auto_start: false,
            ..Self::default()
        }
    }

    pub fn with_frames_per_second(mut self, fps: u32) -> Self {
        self.frames_per_second = fps;
        self
    }

    pub fn with_syncing(mut self, syncing: bool) -> Self {
        self.syncing = syncing;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames_per_second == 0 {
            return Err(AnimationError::InvalidFrameRate(self.frames_per_second));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| AnimationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Time the tick thread sleeps between frames
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frames_per_second)
    }
}

/// `1000 / fps` whole milliseconds, never less than one
pub(crate) fn frame_interval(frames_per_second: u32) -> Duration {
    let millis = 1000 / u64::from(frames_per_second.max(1));
    Duration::from_millis(millis.max(1))
}

/// Duration and interpolator applied to newly created animations
#[derive(Clone, Debug)]
pub struct AnimationDefaults {
    duration_ms: i64,
    interpolator: SharedInterpolator,
}

impl AnimationDefaults {
    pub fn new(duration_ms: i64, interpolator: SharedInterpolator) -> Result<Self> {
        if duration_ms <= 0 {
            return Err(AnimationError::InvalidDuration(duration_ms));
        }
        Ok(Self {
            duration_ms,
            interpolator,
        })
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn interpolator(&self) -> &SharedInterpolator {
        &self.interpolator
    }

    pub fn set_duration_ms(&mut self, duration_ms: i64) -> Result<()> {
        if duration_ms <= 0 {
            return Err(AnimationError::InvalidDuration(duration_ms));
        }
        self.duration_ms = duration_ms;
        Ok(())
    }

    pub fn set_interpolator(&mut self, interpolator: SharedInterpolator) {
        self.interpolator = interpolator;
    }
}

impl Default for AnimationDefaults {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            interpolator: Arc::new(Linear),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.frames_per_second, 60);
        assert!(!config.syncing);
        assert!(config.auto_start);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_from_toml() {
        let config =
            SchedulerConfig::from_toml_str("frames_per_second = 30\nsyncing = true").unwrap();
        assert_eq!(config.frames_per_second, 30);
        assert!(config.syncing);
        assert!(config.auto_start);
        assert_eq!(config.frame_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_from_toml_rejects_zero_fps() {
        assert_eq!(
            SchedulerConfig::from_toml_str("frames_per_second = 0"),
            Err(AnimationError::InvalidFrameRate(0))
        );
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            SchedulerConfig::from_toml_str("frames_per_second = \"fast\""),
            Err(AnimationError::Config(_))
        ));
    }

    #[test]
    fn test_frame_interval_floor() {
        assert_eq!(frame_interval(5000), Duration::from_millis(1));
        assert_eq!(frame_interval(1), Duration::from_millis(1000));
    }

    #[test]
    fn test_defaults_reject_bad_duration() {
        let mut defaults = AnimationDefaults::default();
        assert_eq!(defaults.duration_ms(), 400);
        assert_eq!(
            defaults.set_duration_ms(0),
            Err(AnimationError::InvalidDuration(0))
        );
        assert_eq!(defaults.duration_ms(), 400);
        assert!(AnimationDefaults::new(-1, Arc::new(Linear)).is_err());
    }
}
