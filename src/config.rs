//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default storage key for session snapshots.
pub const DEFAULT_PERSIST_KEY: &str = "memory_game_session_v1";

/// Options recognized at engine construction.
///
/// Deserializes from camelCase JSON; missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Number of matching keys to include in the deck.
    pub pairs: u32,
    /// Mismatch count that ends the session.
    pub max_distortions: u32,
    /// Delay before a mismatched pair flips back face-down.
    pub flip_back_delay_ms: u64,
    /// Seed for the PRNG; `None` (or empty) means non-reproducible decks.
    pub seed: Option<String>,
    /// Storage key for snapshots.
    pub persist_key: String,
    /// Coalescing window for snapshot writes.
    pub persist_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pairs: 4,
            max_distortions: 20,
            flip_back_delay_ms: 1100,
            seed: None,
            persist_key: DEFAULT_PERSIST_KEY.to_string(),
            persist_debounce_ms: 160,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style seed setter.
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Builder-style pair count setter.
    pub fn with_pairs(mut self, pairs: u32) -> Self {
        self.pairs = pairs;
        self
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs == 0 {
            return Err(ConfigError::ZeroPairs);
        }
        if self.max_distortions == 0 {
            return Err(ConfigError::ZeroMaxDistortions);
        }
        Ok(())
    }

    /// The seed string, with empty treated as absent.
    pub fn seed_str(&self) -> Option<&str> {
        self.seed.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pairs, 4);
        assert_eq!(config.max_distortions, 20);
        assert_eq!(config.flip_back_delay_ms, 1100);
        assert_eq!(config.seed, None);
        assert_eq!(config.persist_key, "memory_game_session_v1");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{"pairs": 6, "seed": "dawn"}"#).unwrap();
        assert_eq!(config.pairs, 6);
        assert_eq!(config.seed_str(), Some("dawn"));
        assert_eq!(config.max_distortions, 20);
        assert_eq!(config.persist_debounce_ms, 160);
    }

    #[test]
    fn test_camel_case_keys() {
        let config = EngineConfig::from_json_str(
            r#"{"maxDistortions": 3, "flipBackDelayMs": 50, "persistKey": "slot_2"}"#,
        )
        .unwrap();
        assert_eq!(config.max_distortions, 3);
        assert_eq!(config.flip_back_delay_ms, 50);
        assert_eq!(config.persist_key, "slot_2");
    }

    #[test]
    fn test_rejects_zero_pairs() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"pairs": 0}"#),
            Err(ConfigError::ZeroPairs)
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"maxDistortions": 0}"#),
            Err(ConfigError::ZeroMaxDistortions)
        ));
    }

    #[test]
    fn test_empty_seed_is_absent() {
        let config = EngineConfig::default().with_seed("");
        assert_eq!(config.seed_str(), None);
    }
}
