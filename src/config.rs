//! Settings read from the environment (and `.env`, loaded by `main`).

use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::gateway::Channel;
use crate::quiz::scorer::DEFAULT_PASS_THRESHOLD;

const DEFAULT_QUESTION_BANK: &str = "questions.json";

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub question_bank: PathBuf,
    pub channel: Channel,
    pub pass_threshold: f64,
    pub shuffle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            question_bank: PathBuf::from(DEFAULT_QUESTION_BANK),
            channel: Channel::default(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            shuffle: true,
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a variable is set to something unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a value is set to something unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("QUESTION_BANK") {
            config.question_bank = PathBuf::from(path);
        }

        if let Some(value) = lookup("QUIZ_CHANNEL") {
            config.channel = match value.trim().to_lowercase().as_str() {
                "poll" => Channel::Poll,
                "buttons" => Channel::Buttons,
                _ => return Err(invalid("QUIZ_CHANNEL", value)),
            };
        }

        if let Some(value) = lookup("PASS_THRESHOLD") {
            config.pass_threshold = match value.trim().parse::<f64>() {
                Ok(threshold) if (0.0..=100.0).contains(&threshold) => threshold,
                _ => return Err(invalid("PASS_THRESHOLD", value)),
            };
        }

        if let Some(value) = lookup("SHUFFLE_QUESTIONS") {
            config.shuffle = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid("SHUFFLE_QUESTIONS", value)),
            };
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, value: String) -> ConfigError {
    ConfigError::Invalid { key, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.pass_threshold, 70.0);
        assert_eq!(config.channel, Channel::Poll);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("QUESTION_BANK", "/data/bank.json"),
            ("QUIZ_CHANNEL", "Buttons"),
            ("PASS_THRESHOLD", "80"),
            ("SHUFFLE_QUESTIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.question_bank, PathBuf::from("/data/bank.json"));
        assert_eq!(config.channel, Channel::Buttons);
        assert_eq!(config.pass_threshold, 80.0);
        assert!(!config.shuffle);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            Config::from_lookup(lookup(&[("QUIZ_CHANNEL", "carrier-pigeon")])).unwrap_err(),
            ConfigError::Invalid {
                key: "QUIZ_CHANNEL",
                value: "carrier-pigeon".into()
            }
        );
        assert!(Config::from_lookup(lookup(&[("PASS_THRESHOLD", "170")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SHUFFLE_QUESTIONS", "maybe")])).is_err());
    }
}
