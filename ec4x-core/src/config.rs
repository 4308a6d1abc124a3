//! Runtime game configuration.
//!
//! The dice tables and cost constants live in [`crate::defines`]; this
//! struct carries the knobs a host may override per game (round limits,
//! victory thresholds, grace periods). It is loaded once and treated as
//! immutable for the life of the process.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::defines;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("configuration already installed")]
    AlreadyInstalled,
}

/// Per-game tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Round at which the losing side may retreat from a theater.
    pub retreat_round: u32,
    /// Hard cap on rounds per combat theater.
    pub max_combat_rounds: u32,
    /// Turns a fighter or total-squadron violation is tolerated.
    pub capacity_grace_turns: u32,
    /// Prestige at or above this wins the game.
    pub victory_prestige: i32,
    /// Prestige below this starts the defensive-collapse countdown.
    pub collapse_prestige: i32,
    /// Consecutive collapse turns before elimination.
    pub collapse_turns: u32,
    /// Turn limit (0 = play until victory).
    pub turn_limit: u32,
    /// Compute the state checksum every N turns (0 = disabled).
    pub checksum_frequency: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            retreat_round: defines::combat::RETREAT_ROUND,
            max_combat_rounds: defines::combat::MAX_ROUNDS,
            capacity_grace_turns: defines::capacity::GRACE_TURNS,
            victory_prestige: defines::victory::PRESTIGE_VICTORY,
            collapse_prestige: defines::victory::COLLAPSE_PRESTIGE,
            collapse_turns: defines::victory::COLLAPSE_TURNS,
            turn_limit: defines::victory::DEFAULT_TURN_LIMIT,
            checksum_frequency: 1,
        }
    }
}

impl GameConfig {
    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_combat_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_combat_rounds must be at least 1".into(),
            ));
        }
        if self.retreat_round > self.max_combat_rounds {
            return Err(ConfigError::Invalid(format!(
                "retreat_round {} exceeds max_combat_rounds {}",
                self.retreat_round, self.max_combat_rounds
            )));
        }
        if self.collapse_turns == 0 {
            return Err(ConfigError::Invalid(
                "collapse_turns must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

static REGISTRY: OnceLock<GameConfig> = OnceLock::new();

/// Install the process-wide configuration. May be called once; later
/// calls fail so a running game cannot have its rules swapped.
pub fn install(config: GameConfig) -> Result<(), ConfigError> {
    config.validate()?;
    REGISTRY.set(config).map_err(|_| ConfigError::AlreadyInstalled)
}

/// The process-wide configuration; defaults if none was installed.
pub fn get() -> &'static GameConfig {
    REGISTRY.get_or_init(GameConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn retreat_after_cap_rejected() {
        let cfg = GameConfig {
            retreat_round: 11,
            max_combat_rounds: 10,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_rounds_rejected() {
        let cfg = GameConfig {
            max_combat_rounds: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
