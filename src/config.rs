//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

use crate::iban::IbanCodec;
use crate::security::{PinHasher, DEFAULT_ITERATIONS};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL. Without one the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// ISO country code used in generated IBANs
    pub iban_country_code: String,

    /// Bank identifier used in generated IBANs
    pub iban_bank_code: String,

    /// Key-stretching rounds for new PIN hashes
    pub pin_hash_iterations: u32,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any name -> value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let iban_country_code = lookup("IBAN_COUNTRY_CODE").unwrap_or_else(|| "NL".to_string());
        let iban_bank_code = lookup("IBAN_BANK_CODE").unwrap_or_else(|| "BANK".to_string());
        IbanCodec::new(&iban_country_code, &iban_bank_code)
            .map_err(|_| ConfigError::InvalidValue("IBAN_COUNTRY_CODE/IBAN_BANK_CODE"))?;

        let pin_hash_iterations = match lookup("PIN_HASH_ITERATIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue("PIN_HASH_ITERATIONS"))?,
            None => DEFAULT_ITERATIONS,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            iban_country_code,
            iban_bank_code,
            pin_hash_iterations,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// IBAN codec for the configured bank
    pub fn iban_codec(&self) -> Result<IbanCodec, ConfigError> {
        IbanCodec::new(&self.iban_country_code, &self.iban_bank_code)
            .map_err(|_| ConfigError::InvalidValue("IBAN_COUNTRY_CODE/IBAN_BANK_CODE"))
    }

    pub fn pin_hasher(&self) -> PinHasher {
        PinHasher::new(self.pin_hash_iterations)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
