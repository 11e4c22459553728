//! TOML configuration with serde defaults.
//!
//! Every section and field is optional; a missing file yields the defaults
//! below. CLI flags override the gateway and storage fields after load.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("vault.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Session lifetime in seconds. Sessions are short-lived by design;
    /// expiry requires a fresh login.
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Registration attempts allowed per client origin per hour. 0 disables.
    pub register_per_hour: u32,
    /// Login attempts allowed per client origin per minute. 0 disables.
    pub login_per_minute: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            register_per_hour: 3,
            login_per_minute: 5,
        }
    }
}

impl Config {
    /// Load from a TOML file, or return defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.limits.register_per_hour, 3);
        assert_eq!(config.limits.login_per_minute, 5);
        assert_eq!(config.auth.session_ttl_secs, 3600);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            port = 8443

            [limits]
            login_per_minute = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 8443);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.limits.login_per_minute, 10);
        assert_eq!(config.limits.register_per_hour, 3);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[gateway]\nhosty = \"oops\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_file_path_yields_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.storage.db_path, PathBuf::from("vault.db"));
    }
}
