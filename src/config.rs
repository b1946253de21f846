//! Process configuration, read from environment variables.
//!
//! `main` calls `dotenvy::dotenv()` first, so a `.env` file in the working
//! directory can supply any of these. Only the two secrets are required.
//!
//! | Variable | Default |
//! |---|---|
//! | `ADCRAFT_BIND` | `0.0.0.0:11111` |
//! | `ADCRAFT_DATA_DIR` | `adcraft_data` |
//! | `ADCRAFT_JWT_SECRET` | required |
//! | `ADCRAFT_TOKEN_TTL_SECS` | `3600` (at most one year) |
//! | `GEMINI_API_KEY` | required |
//! | `GEMINI_API_URL` | `https://generativelanguage.googleapis.com` |
//! | `GEMINI_MODEL` | `gemini-2.5-flash` |
//! | `ADCRAFT_GENERATION_TIMEOUT_SECS` | `60` |
//! | `ADCRAFT_LOG_FORMAT` | `pretty` (or `json`) |
//! | `ADCRAFT_LOG_DIR` | unset; daily log files are written there when set |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::auth::MAX_TOKEN_TTL;
use crate::generation::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::orchestrator::DEFAULT_GENERATION_TIMEOUT;

const DEFAULT_DATA_DIR: &str = "adcraft_data";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format: pretty for terminals, JSON for log shippers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected `pretty` or `json`, got `{0}`")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(UnknownLogFormat(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub generation_timeout: Duration,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            bind: parse_or(&get, "ADCRAFT_BIND", || {
                SocketAddr::from(([0, 0, 0, 0], 11111))
            })?,
            data_dir: get("ADCRAFT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            jwt_secret: required("ADCRAFT_JWT_SECRET")?,
            token_ttl: token_ttl(&get)?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_api_url: get("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            generation_timeout: Duration::from_secs(parse_or(
                &get,
                "ADCRAFT_GENERATION_TIMEOUT_SECS",
                || DEFAULT_GENERATION_TIMEOUT.as_secs(),
            )?),
            log_format: parse_or(&get, "ADCRAFT_LOG_FORMAT", LogFormat::default)?,
            log_dir: get("ADCRAFT_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn token_ttl<G>(get: &G) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    const VAR: &str = "ADCRAFT_TOKEN_TTL_SECS";
    let ttl = Duration::from_secs(parse_or(get, VAR, || DEFAULT_TOKEN_TTL_SECS)?);
    if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
        return Err(ConfigError::Invalid {
            var: VAR,
            value: ttl.as_secs().to_string(),
            reason: format!("must be between 1 and {} seconds", MAX_TOKEN_TTL.as_secs()),
        });
    }
    Ok(ttl)
}

fn parse_or<T, G, D>(get: &G, var: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
    D: FnOnce() -> T,
{
    match get(var) {
        None => Ok(default()),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const SECRETS: [(&str, &str); 2] = [("ADCRAFT_JWT_SECRET", "s3cret"), ("GEMINI_API_KEY", "key")];

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let config = config(&SECRETS).unwrap();
        assert_eq!(config.bind, "0.0.0.0:11111".parse::<SocketAddr>().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("adcraft_data"));
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.gemini_api_url, DEFAULT_API_URL);
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn missing_secret_names_the_variable() {
        let err = config(&[("GEMINI_API_KEY", "key")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("ADCRAFT_JWT_SECRET"));

        let err = config(&[("ADCRAFT_JWT_SECRET", "s"), ("GEMINI_API_KEY", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let mut vars = SECRETS.to_vec();
        vars.push(("ADCRAFT_GENERATION_TIMEOUT_SECS", "soon"));
        match config(&vars).unwrap_err() {
            ConfigError::Invalid { var, value, .. } => {
                assert_eq!(var, "ADCRAFT_GENERATION_TIMEOUT_SECS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = SECRETS.to_vec();
        vars.extend([
            ("ADCRAFT_BIND", "127.0.0.1:8080"),
            ("ADCRAFT_LOG_FORMAT", "JSON"),
            ("ADCRAFT_LOG_DIR", "/var/log/adcraft"),
            ("ADCRAFT_TOKEN_TTL_SECS", "120"),
        ]);
        let config = config(&vars).unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/adcraft")));
        assert_eq!(config.token_ttl, Duration::from_secs(120));
    }

    #[test]
    fn token_ttl_out_of_range_is_rejected() {
        for value in ["0", "31536001", "18446744073709551615"] {
            let mut vars = SECRETS.to_vec();
            vars.push(("ADCRAFT_TOKEN_TTL_SECS", value));
            match config(&vars).unwrap_err() {
                ConfigError::Invalid { var, value: got, reason } => {
                    assert_eq!(var, "ADCRAFT_TOKEN_TTL_SECS");
                    assert_eq!(got, value);
                    assert_eq!(reason, "must be between 1 and 31536000 seconds");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let mut vars = SECRETS.to_vec();
        vars.push(("ADCRAFT_TOKEN_TTL_SECS", "31536000"));
        assert_eq!(config(&vars).unwrap().token_ttl, MAX_TOKEN_TTL);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut vars = SECRETS.to_vec();
        vars.push(("ADCRAFT_LOG_FORMAT", "xml"));
        match config(&vars).unwrap_err() {
            ConfigError::Invalid { var, reason, .. } => {
                assert_eq!(var, "ADCRAFT_LOG_FORMAT");
                assert_eq!(reason, UnknownLogFormat("xml".to_string()).to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
