use std::time::Duration;

use serde::Deserialize;

use crate::Error;

fn default_max_segment_duration() -> f64 {
    10.0
}

fn default_tts_chars_per_second() -> f64 {
    4.5
}

fn default_punctuation_marks() -> String {
    duet_script::DEFAULT_PUNCTUATION_MARKS.to_string()
}

fn default_silence_min_secs() -> f64 {
    0.5
}

fn default_silence_max_secs() -> f64 {
    3.0
}

/// Longest gap allowed between speakers.
pub const MAX_SILENCE_SECS: f64 = 60.0;

fn default_sample_rate() -> u32 {
    32000
}

/// Tuning for segmentation and stitching. Field names double as the
/// environment variable names (`MAX_SEGMENT_DURATION`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default = "default_max_segment_duration")]
    pub max_segment_duration: f64,
    #[serde(default = "default_tts_chars_per_second")]
    pub tts_chars_per_second: f64,
    #[serde(default = "default_punctuation_marks")]
    pub punctuation_marks: String,
    #[serde(default = "default_silence_min_secs")]
    pub silence_min_secs: f64,
    #[serde(default = "default_silence_max_secs")]
    pub silence_max_secs: f64,
    /// Output rate assumed until the first segment declares its own.
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: u32,
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_segment_duration: default_max_segment_duration(),
            tts_chars_per_second: default_tts_chars_per_second(),
            punctuation_marks: default_punctuation_marks(),
            silence_min_secs: default_silence_min_secs(),
            silence_max_secs: default_silence_max_secs(),
            default_sample_rate: default_sample_rate(),
            stall_timeout_secs: None,
        }
    }
}

impl AssemblyConfig {
    pub fn from_env() -> crate::Result<Self> {
        let config: Self =
            envy::from_env().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let non_negative = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{name} must be >= 0, got {value}")))
            }
        };

        non_negative("max_segment_duration", self.max_segment_duration)?;
        non_negative("tts_chars_per_second", self.tts_chars_per_second)?;
        non_negative("silence_min_secs", self.silence_min_secs)?;
        non_negative("silence_max_secs", self.silence_max_secs)?;

        if self.silence_min_secs > self.silence_max_secs {
            return Err(Error::InvalidConfig(format!(
                "silence_min_secs ({}) exceeds silence_max_secs ({})",
                self.silence_min_secs, self.silence_max_secs
            )));
        }
        if self.silence_max_secs > MAX_SILENCE_SECS {
            return Err(Error::InvalidConfig(format!(
                "silence_max_secs ({}) exceeds {MAX_SILENCE_SECS}",
                self.silence_max_secs
            )));
        }
        if self.default_sample_rate == 0 {
            return Err(Error::InvalidConfig(
                "default_sample_rate must be positive".to_string(),
            ));
        }
        if self.stall_timeout_secs == Some(0) {
            return Err(Error::InvalidConfig(
                "stall_timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Character budget per segment; zero disables splitting.
    pub fn max_length(&self) -> usize {
        (self.max_segment_duration * self.tts_chars_per_second) as usize
    }

    pub fn boundary_marks(&self) -> Vec<char> {
        self.punctuation_marks.chars().collect()
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> AssemblyConfig {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_reference_tuning() {
        let config = from_pairs(&[]);
        assert_eq!(config.max_length(), 45);
        assert_eq!(config.default_sample_rate, 32000);
        assert_eq!(config.silence_min_secs, 0.5);
        assert_eq!(config.silence_max_secs, 3.0);
        assert!(config.boundary_marks().contains(&'。'));
        assert!(config.stall_timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides() {
        let config = from_pairs(&[
            ("MAX_SEGMENT_DURATION", "4"),
            ("TTS_CHARS_PER_SECOND", "2.5"),
            ("PUNCTUATION_MARKS", "。"),
            ("STALL_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(config.max_length(), 10);
        assert_eq!(config.boundary_marks(), vec!['。']);
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_inverted_silence_bounds() {
        let config = AssemblyConfig {
            silence_min_secs: 2.0,
            silence_max_secs: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_finite_and_oversized_silence() {
        let nan = AssemblyConfig {
            silence_min_secs: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(nan.validate(), Err(Error::InvalidConfig(_))));

        let huge = AssemblyConfig {
            silence_max_secs: 1e7,
            ..Default::default()
        };
        assert!(matches!(huge.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_negative_and_zero_values() {
        let negative = AssemblyConfig {
            max_segment_duration: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero_rate = AssemblyConfig {
            default_sample_rate: 0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let zero_timeout = AssemblyConfig {
            stall_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
