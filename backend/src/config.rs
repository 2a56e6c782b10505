//! Runtime settings read from the environment.
//!
//! `main` loads an optional `.env` file first, so every variable below can also
//! live there. Parsing goes through [`Settings::from_lookup`] which takes any
//! key lookup, keeping it independent of the process environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_ENGINE_COMMAND: &str = "python predict.py";
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ENGINE_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub strict_validation: bool,
    pub engine: EngineConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let workers = parse_or("WORKERS", get("WORKERS"), num_cpus::get())?;
        if workers == 0 {
            return Err(invalid("WORKERS", "0", "must be at least 1"));
        }

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
        if allowed_origins.is_empty() {
            return Err(ConfigError::Empty("ALLOWED_ORIGINS"));
        }

        let max_body_bytes = parse_or("MAX_BODY_BYTES", get("MAX_BODY_BYTES"), DEFAULT_MAX_BODY_BYTES)?;
        let strict_validation = match get("STRICT_VALIDATION") {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                invalid("STRICT_VALIDATION", &raw, "expected true/false")
            })?,
        };

        let command = get("ENGINE_COMMAND").unwrap_or_else(|| DEFAULT_ENGINE_COMMAND.to_string());
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::Empty("ENGINE_COMMAND"))?;
        let args = parts.collect();

        let timeout_secs = parse_or(
            "ENGINE_TIMEOUT_SECS",
            get("ENGINE_TIMEOUT_SECS"),
            DEFAULT_ENGINE_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(invalid("ENGINE_TIMEOUT_SECS", "0", "must be at least 1"));
        }
        let max_output_bytes = parse_or(
            "ENGINE_MAX_OUTPUT_BYTES",
            get("ENGINE_MAX_OUTPUT_BYTES"),
            DEFAULT_ENGINE_MAX_OUTPUT_BYTES,
        )?;

        Ok(Self {
            host,
            port,
            workers,
            allowed_origins,
            max_body_bytes,
            strict_validation,
            engine: EngineConfig {
                program,
                args,
                working_dir: get("ENGINE_WORKDIR").map(PathBuf::from),
                timeout: Duration::from_secs(timeout_secs),
                max_output_bytes,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
