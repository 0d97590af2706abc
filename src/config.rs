//! Namespace configuration.
//!
//! Defaults come from [`crate::forum::constants`]. Embedders can override
//! them from the environment with [`ForumConfig::from_env`] or deserialize
//! the struct from JSON.

use crate::error::{Result, ThreadTreeError};
use crate::forum::MessageLimits;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable: register unknown boards on first use (`true`/`false`).
pub const ENV_AUTO_CREATE_BOARDS: &str = "THREADTREE_AUTO_CREATE_BOARDS";
/// Environment variable: maximum title size in bytes.
pub const ENV_MAX_TITLE_SIZE: &str = "THREADTREE_MAX_TITLE_SIZE";
/// Environment variable: maximum body size in bytes.
pub const ENV_MAX_BODY_SIZE: &str = "THREADTREE_MAX_BODY_SIZE";
/// Environment variable: maximum number of boards per message.
pub const ENV_MAX_BOARDS_PER_MESSAGE: &str = "THREADTREE_MAX_BOARDS_PER_MESSAGE";

/// Configuration for one message namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    /// Register boards named by incoming messages instead of reporting them
    /// as unknown.
    pub auto_create_boards: bool,
    /// Size limits applied to incoming messages.
    #[serde(flatten)]
    pub limits: MessageLimits,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            auto_create_boards: false,
            limits: MessageLimits::default(),
        }
    }
}

impl ForumConfig {
    /// Builds a configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns a `Config` error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = parse_var(&lookup, ENV_AUTO_CREATE_BOARDS)? {
            config.auto_create_boards = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_TITLE_SIZE)? {
            config.limits.max_title_size = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_BODY_SIZE)? {
            config.limits.max_body_size = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_BOARDS_PER_MESSAGE)? {
            config.limits.max_boards_per_message = value;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that the limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_title_size == 0 {
            return Err(ThreadTreeError::config("max_title_size must be positive"));
        }
        if self.limits.max_boards_per_message == 0 {
            return Err(ThreadTreeError::config(
                "max_boards_per_message must be positive",
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ThreadTreeError::config(format!("{} has an invalid value '{}'", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ForumConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ForumConfig::default());
        assert!(!config.auto_create_boards);
    }

    #[test]
    fn test_overrides() {
        let config = ForumConfig::from_lookup(lookup(&[
            (ENV_AUTO_CREATE_BOARDS, "true"),
            (ENV_MAX_BODY_SIZE, " 2048 "),
            (ENV_MAX_BOARDS_PER_MESSAGE, "2"),
        ]))
        .unwrap();
        assert!(config.auto_create_boards);
        assert_eq!(config.limits.max_body_size, 2048);
        assert_eq!(config.limits.max_boards_per_message, 2);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = ForumConfig::from_lookup(lookup(&[(ENV_MAX_TITLE_SIZE, "lots")])).unwrap_err();
        assert!(matches!(err, ThreadTreeError::Config(_)));
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(ForumConfig::from_lookup(lookup(&[(ENV_MAX_BOARDS_PER_MESSAGE, "0")])).is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let config: ForumConfig =
            serde_json::from_str(r#"{"auto_create_boards": true, "max_body_size": 10}"#).unwrap();
        assert!(config.auto_create_boards);
        assert_eq!(config.limits.max_body_size, 10);
        assert_eq!(
            config.limits.max_title_size,
            MessageLimits::default().max_title_size
        );
    }
}
