//! Decision engine configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::sales::EngineThresholds;

/// Heuristic constants of the decision engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum session length in seconds
    #[serde(default = "default_session_ceiling_secs")]
    pub session_ceiling_secs: u64,

    /// Retries past a stage's budget before the stage is left regardless
    #[serde(default = "default_hard_ceiling_margin")]
    pub hard_ceiling_margin: u32,

    /// Turns needed to leave the pre-closing stage at moderate depth
    #[serde(default = "default_depth_gate_moderate_turns")]
    pub depth_gate_moderate_turns: u32,

    /// Turns needed to leave the pre-closing stage at surface depth
    #[serde(default = "default_depth_gate_surface_turns")]
    pub depth_gate_surface_turns: u32,

    /// Turns in the closing stage before wrapping up
    #[serde(default = "default_closing_ceiling_turns")]
    pub closing_ceiling_turns: u32,

    /// Turns without new information that count as repetition
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: u32,

    /// Share of criteria met that allows a forced advance
    #[serde(default = "default_advance_fraction")]
    pub advance_fraction: f64,

    /// Consecutive thin replies that trigger an energy shift
    #[serde(default = "default_thin_streak")]
    pub thin_streak: u32,

    /// Self-persuasion probes before bridging
    #[serde(default = "default_self_persuasion_attempts")]
    pub self_persuasion_attempts: u32,
}

fn default_session_ceiling_secs() -> u64 {
    1800
}

fn default_hard_ceiling_margin() -> u32 {
    2
}

fn default_depth_gate_moderate_turns() -> u32 {
    3
}

fn default_depth_gate_surface_turns() -> u32 {
    4
}

fn default_closing_ceiling_turns() -> u32 {
    8
}

fn default_repetition_threshold() -> u32 {
    2
}

fn default_advance_fraction() -> f64 {
    0.5
}

fn default_thin_streak() -> u32 {
    3
}

fn default_self_persuasion_attempts() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_ceiling_secs: default_session_ceiling_secs(),
            hard_ceiling_margin: default_hard_ceiling_margin(),
            depth_gate_moderate_turns: default_depth_gate_moderate_turns(),
            depth_gate_surface_turns: default_depth_gate_surface_turns(),
            closing_ceiling_turns: default_closing_ceiling_turns(),
            repetition_threshold: default_repetition_threshold(),
            advance_fraction: default_advance_fraction(),
            thin_streak: default_thin_streak(),
            self_persuasion_attempts: default_self_persuasion_attempts(),
        }
    }
}

impl EngineConfig {
    /// Converts to the engine's threshold set
    pub fn thresholds(&self) -> EngineThresholds {
        EngineThresholds {
            session_ceiling_secs: self.session_ceiling_secs,
            hard_ceiling_margin: self.hard_ceiling_margin,
            depth_gate_moderate_turns: self.depth_gate_moderate_turns,
            depth_gate_surface_turns: self.depth_gate_surface_turns,
            closing_ceiling_turns: self.closing_ceiling_turns,
            repetition_threshold: self.repetition_threshold,
            advance_fraction: self.advance_fraction,
            thin_streak: self.thin_streak,
            self_persuasion_attempts: self.self_persuasion_attempts,
        }
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_ceiling_secs == 0 {
            return Err(ValidationError::InvalidSessionCeiling);
        }
        if !(self.advance_fraction > 0.0 && self.advance_fraction <= 1.0) {
            return Err(ValidationError::InvalidAdvanceFraction);
        }
        let counts = [
            ("closing_ceiling_turns", self.closing_ceiling_turns),
            ("repetition_threshold", self.repetition_threshold),
            ("thin_streak", self.thin_streak),
            ("self_persuasion_attempts", self.self_persuasion_attempts),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ValidationError::ZeroThreshold(*name));
        }
        if self.depth_gate_surface_turns < self.depth_gate_moderate_turns {
            return Err(ValidationError::InvalidDepthGate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds(), EngineThresholds::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"closing_ceiling_turns": 10}"#).unwrap();
        assert_eq!(config.closing_ceiling_turns, 10);
        assert_eq!(config.session_ceiling_secs, 1800);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let config = EngineConfig {
            advance_fraction: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidAdvanceFraction));
    }

    #[test]
    fn test_rejects_zero_thresholds() {
        let config = EngineConfig {
            thin_streak: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::ZeroThreshold("thin_streak")));

        let config = EngineConfig {
            session_ceiling_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidSessionCeiling));
    }

    #[test]
    fn test_rejects_inverted_depth_gate() {
        let config = EngineConfig {
            depth_gate_moderate_turns: 5,
            depth_gate_surface_turns: 4,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidDepthGate));
    }
}
