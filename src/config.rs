// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and [`AppConfig`], which is loaded
//! from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for blobs and metadata | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `IO_TIMEOUT_SECS` | Deadline per vault operation, `0` disables | `30` |
//! | `MAX_UPLOAD_BYTES` | Request body limit | `67108864` |
//! | `TLS_CERT_PATH` | PEM certificate chain, enables HTTPS with `TLS_KEY_PATH` | unset |
//! | `TLS_KEY_PATH` | PEM private key | unset |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
///
/// Holds `active/`, `trash/` and the metadata database. Must be a single
/// volume so blob moves are renames.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const IO_TIMEOUT_ENV: &str = "IO_TIMEOUT_SECS";
pub const MAX_UPLOAD_ENV: &str = "MAX_UPLOAD_BYTES";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is set but {1} is not; HTTPS needs both")]
    IncompleteTls(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    /// `None` disables the deadline.
    pub io_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
    pub tls: Option<TlsFiles>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_format: LogFormat::default(),
            io_timeout: Some(Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            tls: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`. Unset or blank variables take
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(host) = get(HOST_ENV) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = get(PORT_ENV) {
            config.port = parse(PORT_ENV, &port)?;
        }
        if let Some(format) = get(LOG_FORMAT_ENV) {
            config.log_format = match format.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: LOG_FORMAT_ENV,
                        value: format,
                        reason: "expected json or pretty".to_string(),
                    })
                }
            };
        }
        if let Some(secs) = get(IO_TIMEOUT_ENV) {
            let secs: u64 = parse(IO_TIMEOUT_ENV, &secs)?;
            config.io_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(bytes) = get(MAX_UPLOAD_ENV) {
            let bytes: usize = parse(MAX_UPLOAD_ENV, &bytes)?;
            if bytes == 0 {
                return Err(ConfigError::Invalid {
                    var: MAX_UPLOAD_ENV,
                    value: bytes.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            config.max_upload_bytes = bytes;
        }

        config.tls = match (get(TLS_CERT_ENV), get(TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => return Err(ConfigError::IncompleteTls(TLS_CERT_ENV, TLS_KEY_ENV)),
            (None, Some(_)) => return Err(ConfigError::IncompleteTls(TLS_KEY_ENV, TLS_CERT_ENV)),
            (None, None) => None,
        };

        Ok(config)
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: HOST_ENV,
            value: self.host.clone(),
            reason: e.to_string(),
        })
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.io_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_upload_bytes, 64 * 1024 * 1024);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_all_variables() {
        let config = load(&[
            (DATA_DIR_ENV, "/srv/vault"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9443"),
            (LOG_FORMAT_ENV, "JSON"),
            (IO_TIMEOUT_ENV, "5"),
            (MAX_UPLOAD_ENV, "1024"),
            (TLS_CERT_ENV, "/etc/tls/cert.pem"),
            (TLS_KEY_ENV, "/etc/tls/key.pem"),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/vault"));
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9443");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.io_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(
            config.tls,
            Some(TlsFiles {
                cert: PathBuf::from("/etc/tls/cert.pem"),
                key: PathBuf::from("/etc/tls/key.pem"),
            })
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = load(&[(IO_TIMEOUT_ENV, "0")]).unwrap();
        assert_eq!(config.io_timeout, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[(PORT_ENV, "http")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            load(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid {
                var: "LOG_FORMAT",
                ..
            })
        ));
        assert!(matches!(
            load(&[(MAX_UPLOAD_ENV, "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(
            load(&[(TLS_CERT_ENV, "/c.pem")]),
            Err(ConfigError::IncompleteTls(TLS_CERT_ENV, TLS_KEY_ENV))
        );
    }

    #[test]
    fn bad_host_fails_bind_addr() {
        let config = load(&[(HOST_ENV, "not a host")]).unwrap();
        assert!(config.bind_addr().is_err());
    }
}
