use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DATABASE_URL_ENV: &str = "databaseUrl";
const DATABASE_URL_FALLBACK_ENV: &str = "DATABASE_URL";
const TIME_POLICY_ENV: &str = "PROGRAM_TIME_POLICY";
const RESPONSE_SHAPE_ENV: &str = "PROGRAM_RESPONSE_SHAPE";
const STATUS_MAPPING_ENV: &str = "ERROR_STATUS_MAPPING";
const TLS_VERIFY_ENV: &str = "DATABASE_TLS_VERIFY";
const CONNECT_TIMEOUT_ENV: &str = "DATABASE_CONNECT_TIMEOUT_SECS";
const CA_FILE_ENV: &str = "DATABASE_CA_FILE";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Where the `time` column value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePolicy {
    /// Always bind `0`.
    #[default]
    Zero,
    /// Bind the `time` field of the request body; the field becomes required.
    Request,
    /// Bind the current Unix time in milliseconds.
    Now,
}

impl FromStr for TimePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "request" => Ok(Self::Request),
            "now" => Ok(Self::Now),
            _ => Err(()),
        }
    }
}

/// What the success response carries under `result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    #[default]
    Title,
    Row,
}

impl FromStr for ResponseShape {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "row" => Ok(Self::Row),
            _ => Err(()),
        }
    }
}

/// How failures map to HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusMapping {
    /// Every failure is a 500.
    #[default]
    Legacy,
    /// 400 for bad input, 502/503 for store failures.
    Split,
}

impl FromStr for StatusMapping {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "split" => Ok(Self::Split),
            _ => Err(()),
        }
    }
}

/// Handler configuration, read once at cold start and injected into the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub time_policy: TimePolicy,
    pub response_shape: ResponseShape,
    pub status_mapping: StatusMapping,
    pub tls_verify: bool,
    pub connect_timeout: Option<Duration>,
    /// PEM bundle trusted when verifying the server certificate, e.g. the RDS CA bundle.
    pub ca_file: Option<PathBuf>,
}

impl Config {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            time_policy: TimePolicy::default(),
            response_shape: ResponseShape::default(),
            status_mapping: StatusMapping::default(),
            tls_verify: true,
            connect_timeout: None,
            ca_file: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL_ENV)
            .or_else(|| lookup(DATABASE_URL_FALLBACK_ENV))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(DATABASE_URL_ENV.to_string()))?;

        let mut config = Self::new(database_url);

        if let Some(value) = lookup(TIME_POLICY_ENV) {
            config.time_policy = parse_var(TIME_POLICY_ENV, value)?;
        }
        if let Some(value) = lookup(RESPONSE_SHAPE_ENV) {
            config.response_shape = parse_var(RESPONSE_SHAPE_ENV, value)?;
        }
        if let Some(value) = lookup(STATUS_MAPPING_ENV) {
            config.status_mapping = parse_var(STATUS_MAPPING_ENV, value)?;
        }
        if let Some(value) = lookup(TLS_VERIFY_ENV) {
            config.tls_verify = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: TLS_VERIFY_ENV,
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup(CONNECT_TIMEOUT_ENV) {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: CONNECT_TIMEOUT_ENV,
                    value: value.clone(),
                })?;
            config.connect_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(value) = lookup(CA_FILE_ENV) {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    name: CA_FILE_ENV,
                    value,
                });
            }
            config.ca_file = Some(PathBuf::from(value.trim()));
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
