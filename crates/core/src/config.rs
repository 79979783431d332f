//! Match configuration.
//!
//! Every field has a serde default, so a partial JSON document (or none at all)
//! yields a playable configuration. Environment variables prefixed `TOWERS_`
//! overlay the defaults for headless drivers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::*;

/// Whether moving a resting piece restarts its lock delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockGrace {
    /// Every successful move or cycle restarts the lock timer
    Reset,
    /// The lock timer keeps running regardless of input
    NoReset,
    /// Restarts allowed up to the given count per piece
    Limited(u8),
}

impl LockGrace {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reset" => Some(LockGrace::Reset),
            "no_reset" | "noreset" => Some(LockGrace::NoReset),
            other => other
                .strip_prefix("limited:")
                .and_then(|n| n.parse().ok())
                .map(LockGrace::Limited),
        }
    }
}

/// When a match is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndMode {
    /// At most one seat is still alive
    LastSeatStanding,
    /// Every live seat belongs to the same partner pair
    LastTeamStanding,
    /// Every seat is dead
    AllSeatsDead,
}

impl EndMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "last_seat_standing" | "seat" => Some(EndMode::LastSeatStanding),
            "last_team_standing" | "team" => Some(EndMode::LastTeamStanding),
            "all_seats_dead" | "all" => Some(EndMode::AllSeatsDead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of boards in the match (1-8).
    pub seats: usize,
    /// Seconds per row while falling.
    pub fall_interval: f32,
    /// Seconds a resting piece waits before locking.
    pub lock_delay: f32,
    pub lock_grace: LockGrace,
    /// Break animation before collapse.
    pub break_delay: f32,
    /// Broken cells per earned power block.
    pub power_threshold: u32,
    /// Retained power queue capacity.
    pub power_capacity: usize,
    /// Speed-up duration per severity tier.
    pub speed_up_duration: f32,
    /// Yahoo shield duration.
    pub yahoo_duration: f32,
    /// Length of the materialized piece stream.
    pub sequence_length: usize,
    pub end_mode: EndMode,
    /// Ticks of predicted local state kept for reconciliation.
    pub prediction_history: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seats: MAX_SEATS,
            fall_interval: FALL_INTERVAL_SECS,
            lock_delay: LOCK_DELAY_SECS,
            lock_grace: LockGrace::Limited(LOCK_RESET_LIMIT),
            break_delay: BREAK_DELAY_SECS,
            power_threshold: POWER_THRESHOLD,
            power_capacity: POWER_CAPACITY,
            speed_up_duration: SPEED_UP_SECS,
            yahoo_duration: YAHOO_SECS,
            sequence_length: 4096,
            end_mode: EndMode::LastSeatStanding,
            prediction_history: 256,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Defaults overlaid with `TOWERS_*` environment variables.
    ///
    /// Unparseable values fall back to the default, matching how the rest of the
    /// environment handling behaves.
    pub fn from_env() -> Self {
        use std::env;

        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            env::var(key).ok().and_then(|s| s.trim().parse().ok())
        }

        let mut config = Self::default();
        if let Some(seats) = parsed("TOWERS_SEATS") {
            config.seats = seats;
        }
        if let Some(v) = parsed("TOWERS_FALL_INTERVAL") {
            config.fall_interval = v;
        }
        if let Some(v) = parsed("TOWERS_LOCK_DELAY") {
            config.lock_delay = v;
        }
        if let Some(grace) = env::var("TOWERS_LOCK_GRACE")
            .ok()
            .and_then(|s| LockGrace::from_str(s.trim()))
        {
            config.lock_grace = grace;
        }
        if let Some(v) = parsed("TOWERS_POWER_THRESHOLD") {
            config.power_threshold = v;
        }
        if let Some(mode) = env::var("TOWERS_END_MODE")
            .ok()
            .and_then(|s| EndMode::from_str(s.trim()))
        {
            config.end_mode = mode;
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, msg: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                msg: msg.into(),
            }
        }

        if self.seats == 0 || self.seats > MAX_SEATS {
            return Err(invalid("seats", format!("{} not in 1..={}", self.seats, MAX_SEATS)));
        }
        if !(self.fall_interval.is_finite() && self.fall_interval > 0.0) {
            return Err(invalid(
                "fall_interval",
                format!("{} must be positive", self.fall_interval),
            ));
        }
        for (field, value) in [
            ("lock_delay", self.lock_delay),
            ("break_delay", self.break_delay),
            ("speed_up_duration", self.speed_up_duration),
            ("yahoo_duration", self.yahoo_duration),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("{} must not be negative", value)));
            }
        }
        if self.power_threshold == 0 {
            return Err(invalid("power_threshold", "must be at least 1"));
        }
        if self.sequence_length < MAX_SEATS {
            return Err(invalid(
                "sequence_length",
                format!("must be at least {}", MAX_SEATS),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_grace, LockGrace::Limited(LOCK_RESET_LIMIT));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            GameConfig::from_json_str(r#"{"seats": 4, "lock_grace": "no_reset"}"#).unwrap();
        assert_eq!(config.seats, 4);
        assert_eq!(config.lock_grace, LockGrace::NoReset);
        assert_eq!(config.fall_interval, FALL_INTERVAL_SECS);
    }

    #[test]
    fn limited_grace_from_json() {
        let config = GameConfig::from_json_str(r#"{"lock_grace": {"limited": 3}}"#).unwrap();
        assert_eq!(config.lock_grace, LockGrace::Limited(3));
    }

    #[test]
    fn rejects_bad_seat_count() {
        let err = GameConfig::from_json_str(r#"{"seats": 9}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "seats", .. }));
    }

    #[test]
    fn fall_interval_must_be_positive() {
        let err = GameConfig::from_json_str(r#"{"fall_interval": 0.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "fall_interval", .. }));

        // Unknown keys from older configs are ignored.
        let config = GameConfig::from_json_str(r#"{"soft_drop_interval": 0.05}"#).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            GameConfig::from_json_str("{seats"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn parse_grace_names() {
        assert_eq!(LockGrace::from_str("reset"), Some(LockGrace::Reset));
        assert_eq!(LockGrace::from_str("limited:4"), Some(LockGrace::Limited(4)));
        assert_eq!(LockGrace::from_str("sometimes"), None);
        assert_eq!(EndMode::from_str("team"), Some(EndMode::LastTeamStanding));
    }
}
