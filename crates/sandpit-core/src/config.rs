//! Sandbox configuration with environment-variable loading
//!
//! One `SandboxConfig` instance is handed to each backend at construction
//! and never mutated mid-call; per-request overrides live on the request
//! itself. Environment surface: `SANDPIT_TIMEOUT` (seconds),
//! `SANDPIT_MEMORY_LIMIT` (bytes or a size string such as `128m`),
//! `SANDPIT_NETWORK_ENABLED`, `SANDPIT_SECURITY_SCREEN`.

use std::env;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MEMORY_LIMIT: u64 = 128 * 1024 * 1024;

/// Extra time allowed for forced reclamation after a deadline expires.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub timeout: Duration,
    pub memory_limit: u64,
    pub network_enabled: bool,
    pub security_screen_enabled: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            network_enabled: false,
            security_screen_enabled: true,
        }
    }
}

impl SandboxConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("SANDPIT_TIMEOUT") {
            match raw.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => log::warn!("ignoring unparsable SANDPIT_TIMEOUT: {:?}", raw),
            }
        }
        if let Ok(raw) = env::var("SANDPIT_MEMORY_LIMIT") {
            match parse_memory_size(&raw) {
                Some(bytes) => config.memory_limit = bytes,
                None => log::warn!("ignoring unparsable SANDPIT_MEMORY_LIMIT: {:?}", raw),
            }
        }
        if let Ok(raw) = env::var("SANDPIT_NETWORK_ENABLED") {
            config.network_enabled = parse_bool(&raw);
        }
        if let Ok(raw) = env::var("SANDPIT_SECURITY_SCREEN") {
            config.security_screen_enabled = parse_bool(&raw);
        }

        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse a human-readable size string: plain bytes, or a `k`/`m`/`g`
/// suffix (optionally followed by `b`), case-insensitive.
pub fn parse_memory_size(raw: &str) -> Option<u64> {
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }
    if let Ok(bytes) = s.parse::<u64>() {
        return Some(bytes);
    }

    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = &s[digits.len()..];
    let value: u64 = digits.parse().ok()?;
    let multiplier: u64 = match suffix {
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.memory_limit, 128 * 1024 * 1024);
        assert!(!config.network_enabled);
        assert!(config.security_screen_enabled);
    }

    #[test]
    fn test_parse_memory_size() {
        assert_eq!(parse_memory_size("1048576"), Some(1 << 20));
        assert_eq!(parse_memory_size("128m"), Some(128 << 20));
        assert_eq!(parse_memory_size("128MB"), Some(128 << 20));
        assert_eq!(parse_memory_size("1g"), Some(1 << 30));
        assert_eq!(parse_memory_size("512k"), Some(512 << 10));
        assert_eq!(parse_memory_size("lots"), None);
        assert_eq!(parse_memory_size(""), None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("SANDPIT_TIMEOUT", "5");
        std::env::set_var("SANDPIT_MEMORY_LIMIT", "64m");
        std::env::set_var("SANDPIT_NETWORK_ENABLED", "true");
        std::env::set_var("SANDPIT_SECURITY_SCREEN", "false");

        let config = SandboxConfig::from_env();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.memory_limit, 64 << 20);
        assert!(config.network_enabled);
        assert!(!config.security_screen_enabled);

        std::env::remove_var("SANDPIT_TIMEOUT");
        std::env::remove_var("SANDPIT_MEMORY_LIMIT");
        std::env::remove_var("SANDPIT_NETWORK_ENABLED");
        std::env::remove_var("SANDPIT_SECURITY_SCREEN");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        std::env::set_var("SANDPIT_TIMEOUT", "soon");
        let config = SandboxConfig::from_env();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        std::env::remove_var("SANDPIT_TIMEOUT");
    }
}
