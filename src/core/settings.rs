/// Playback settings: text speed, auto-play speed and timing units.
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted timing unit, in seconds.
pub const MAX_UNIT_SECS: f32 = 10.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{field} must be within 0..=1, got {value}")]
    SpeedOutOfRange { field: &'static str, value: f32 },
    #[error("{field} must be a number of seconds within 0..={max}, got {value}", max = MAX_UNIT_SECS)]
    InvalidUnit { field: &'static str, value: f32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Player-facing playback configuration. Every field may be omitted from
/// the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// 0 is slowest, 1 reveals a whole line at once.
    pub text_speed: f32,
    /// 0 is the longest pause after a line, 1 the shortest.
    pub auto_speed: f32,
    /// Per-character delay at text speed 0.
    pub text_unit_secs: f32,
    /// Per-character pause unit for auto-advance.
    pub auto_unit_secs: f32,
    /// Start with auto-advance on.
    pub auto_advance: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            text_speed: 0.5,
            auto_speed: 0.5,
            text_unit_secs: 0.1,
            auto_unit_secs: 0.1,
            auto_advance: false,
        }
    }
}

impl PlaybackSettings {
    /// Load settings from a RON file and check them.
    pub fn load_from_ron(path: &Path) -> Result<PlaybackSettings, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PlaybackSettings, SettingsError> {
        let settings: PlaybackSettings = ron::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [("text_speed", self.text_speed), ("auto_speed", self.auto_speed)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::SpeedOutOfRange { field, value });
            }
        }
        self.text_unit()?;
        self.auto_unit()?;
        Ok(())
    }

    pub fn text_unit(&self) -> Result<Duration, SettingsError> {
        unit("text_unit_secs", self.text_unit_secs)
    }

    pub fn auto_unit(&self) -> Result<Duration, SettingsError> {
        unit("auto_unit_secs", self.auto_unit_secs)
    }
}

fn unit(field: &'static str, value: f32) -> Result<Duration, SettingsError> {
    if !(0.0..=MAX_UNIT_SECS).contains(&value) {
        return Err(SettingsError::InvalidUnit { field, value });
    }
    Duration::try_from_secs_f32(value).map_err(|_| SettingsError::InvalidUnit { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = PlaybackSettings::default();
        assert!(settings.validate().is_ok());
        assert!(!settings.auto_advance);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = PlaybackSettings::parse_ron("(text_speed: 0.8, auto_advance: true)").unwrap();
        assert_eq!(settings.text_speed, 0.8);
        assert_eq!(settings.auto_speed, 0.5);
        assert!(settings.auto_advance);
    }

    #[test]
    fn speed_out_of_range_rejected() {
        let err = PlaybackSettings::parse_ron("(auto_speed: 1.5)").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::SpeedOutOfRange {
                field: "auto_speed",
                ..
            }
        ));
    }

    #[test]
    fn negative_unit_rejected() {
        let err = PlaybackSettings::parse_ron("(text_unit_secs: -0.1)").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidUnit {
                field: "text_unit_secs",
                ..
            }
        ));
    }

    #[test]
    fn oversized_unit_rejected() {
        let err = PlaybackSettings::parse_ron("(auto_advance: true, auto_unit_secs: 1.0e19)").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidUnit {
                field: "auto_unit_secs",
                ..
            }
        ));
        assert!(PlaybackSettings::parse_ron("(text_unit_secs: 10.0)").is_ok());
        assert!(PlaybackSettings::parse_ron("(text_unit_secs: 10.5)").is_err());
    }

    #[test]
    fn malformed_file_is_ron_error() {
        assert!(matches!(
            PlaybackSettings::parse_ron("(text_speed: \"fast\")"),
            Err(SettingsError::Ron(_))
        ));
    }
}
