// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup into an
//! immutable [`AppConfig`] and handed to the router through
//! [`AppState`](crate::state::AppState).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SHLINK_HTTP_TIMEOUT_SECS` | Timeout for each outbound SHLink/FHIR request | `30` |
//! | `MAX_INFLATED_BYTES` | Cap on zlib output while decoding HC1 | unbounded |
//! | `SERVICE_VERSION` | Version reported by `/status` | crate version |

use std::time::Duration;

use crate::hcert::DecodeOptions;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const SHLINK_HTTP_TIMEOUT_ENV: &str = "SHLINK_HTTP_TIMEOUT_SECS";
pub const MAX_INFLATED_BYTES_ENV: &str = "MAX_INFLATED_BYTES";
pub const SERVICE_VERSION_ENV: &str = "SERVICE_VERSION";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_SHLINK_HTTP_TIMEOUT_SECS: u64 = 30;

/// Service name reported by `/status`.
pub const SERVICE_NAME: &str = "HCERT & SHLink Validator";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub shlink_timeout: Duration,
    pub max_inflated_bytes: Option<usize>,
    pub service_version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_format: LogFormat::default(),
            shlink_timeout: Duration::from_secs(DEFAULT_SHLINK_HTTP_TIMEOUT_SECS),
            max_inflated_bytes: None,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn parse<T: std::str::FromStr>(
    name: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value,
    })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = get(PORT_ENV) {
            config.port = parse(PORT_ENV, port, "a port number")?;
        }
        if let Some(format) = get(LOG_FORMAT_ENV) {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: LOG_FORMAT_ENV,
                        expected: "`json` or `pretty`",
                        value: format,
                    })
                }
            };
        }
        if let Some(secs) = get(SHLINK_HTTP_TIMEOUT_ENV) {
            let secs: u64 = parse(SHLINK_HTTP_TIMEOUT_ENV, secs, "a number of seconds")?;
            config.shlink_timeout = Duration::from_secs(secs);
        }
        if let Some(cap) = get(MAX_INFLATED_BYTES_ENV) {
            config.max_inflated_bytes = Some(parse(MAX_INFLATED_BYTES_ENV, cap, "a byte count")?);
        }
        if let Some(version) = get(SERVICE_VERSION_ENV) {
            config.service_version = version;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_inflated_bytes: self.max_inflated_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
        assert_eq!(cfg.shlink_timeout, Duration::from_secs(30));
        assert_eq!(cfg.decode_options(), DecodeOptions::default());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("SHLINK_HTTP_TIMEOUT_SECS", "5"),
            ("MAX_INFLATED_BYTES", "65536"),
            ("SERVICE_VERSION", "2.1.0"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_address(), "127.0.0.1:9000");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.shlink_timeout, Duration::from_secs(5));
        assert_eq!(cfg.decode_options().max_inflated_bytes, Some(65536));
        assert_eq!(cfg.service_version, "2.1.0");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = config(&[("PORT", ""), ("MAX_INFLATED_BYTES", "  ")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_inflated_bytes, None);
    }

    #[test]
    fn rejects_invalid_values() {
        for (name, value) in [
            ("PORT", "eighty"),
            ("PORT", "70000"),
            ("LOG_FORMAT", "xml"),
            ("SHLINK_HTTP_TIMEOUT_SECS", "-1"),
            ("MAX_INFLATED_BYTES", "lots"),
        ] {
            let err = config(&[(name, value)]).unwrap_err();
            assert!(err.to_string().starts_with(name), "{err}");
        }
    }
}
