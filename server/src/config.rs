//! Server configuration
//!
//! Everything is read from environment variables. Unset variables fall back
//! to development defaults; values that are set but malformed fail startup.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::backend::storage::DATABASE_URL;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid bind address {0}: expected host:port")]
    InvalidBindAddr(String),

    #[error("Invalid MPESA_MODE {0}. Must be one of: simulated, daraja")]
    InvalidMpesaMode(String),

    #[error("Invalid MPESA_ENV {0}. Must be one of: sandbox, production")]
    InvalidMpesaEnvironment(String),

    #[error("{0} must be set when MPESA_MODE=daraja")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => "https://sandbox.safaricom.co.ke",
            MpesaEnvironment::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" | "prod" => Ok(MpesaEnvironment::Production),
            _ => Err(ConfigError::InvalidMpesaEnvironment(s.to_string())),
        }
    }
}

/// Credentials and callback URLs for the Safaricom Daraja API
#[derive(Clone, PartialEq)]
pub struct DarajaConfig {
    pub environment: MpesaEnvironment,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub initiator_name: String,
    pub security_credential: String,
    pub result_url: String,
    pub timeout_url: String,
}

impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("environment", &self.environment)
            .field("shortcode", &self.shortcode)
            .field("initiator_name", &self.initiator_name)
            .field("result_url", &self.result_url)
            .field("timeout_url", &self.timeout_url)
            .finish_non_exhaustive()
    }
}

/// Which gateway M-Pesa disbursements go through
#[derive(Debug, Clone, PartialEq)]
pub enum MpesaMode {
    /// Accept every payout locally without calling Safaricom
    Simulated,
    Daraja(DarajaConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    pub mpesa: MpesaMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DATABASE_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cors_origin: "http://localhost:8080".to_string(),
            mpesa: MpesaMode::Simulated,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = var("LOAN_DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(addr) = var("LOAN_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(addr.clone()))?;
        }

        if let Some(origin) = var("LOAN_CORS_ORIGIN") {
            config.cors_origin = origin;
        }

        let mode = var("MPESA_MODE").unwrap_or_else(|| "simulated".to_string());
        config.mpesa = match mode.to_lowercase().as_str() {
            "simulated" => MpesaMode::Simulated,
            "daraja" => {
                let required = |name: &'static str| var(name).ok_or(ConfigError::MissingVariable(name));
                MpesaMode::Daraja(DarajaConfig {
                    environment: match var("MPESA_ENV") {
                        Some(env) => env.parse()?,
                        None => MpesaEnvironment::default(),
                    },
                    consumer_key: required("MPESA_CONSUMER_KEY")?,
                    consumer_secret: required("MPESA_CONSUMER_SECRET")?,
                    shortcode: var("MPESA_SHORTCODE").unwrap_or_else(|| "174379".to_string()),
                    initiator_name: var("MPESA_INITIATOR_NAME")
                        .unwrap_or_else(|| "testapi".to_string()),
                    security_credential: required("MPESA_SECURITY_CREDENTIAL")?,
                    result_url: required("MPESA_RESULT_URL")?,
                    timeout_url: required("MPESA_TIMEOUT_URL")?,
                })
            }
            _ => return Err(ConfigError::InvalidMpesaMode(mode)),
        };

        Ok(config)
    }
}
