// src/config.rs

use std::env;
use std::fmt;

use crate::utils::hash::hash_password;

/// Problems found while reading the environment.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} must be set", name),
            ConfigError::Invalid { name, reason } => write!(f, "{} is invalid: {}", name, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. Without it the service keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Admin session length in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: String,
    /// Argon2 PHC string. Admin login is disabled when absent.
    pub admin_password_hash: Option<String>,
    pub exam_time_limit_minutes: u64,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Reads the configuration. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = parse_or("JWT_EXPIRATION", 86_400)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_email =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());

        let admin_password_hash = match (env::var("ADMIN_PASSWORD_HASH"), env::var("ADMIN_PASSWORD")) {
            (Ok(hash), _) => Some(hash),
            (Err(_), Ok(plain)) => Some(hash_password(&plain).map_err(|e| ConfigError::Invalid {
                name: "ADMIN_PASSWORD",
                reason: e.to_string(),
            })?),
            _ => None,
        };

        let exam_time_limit_minutes = parse_or("EXAM_TIME_LIMIT_MINUTES", 30)?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_email,
            admin_password_hash,
            exam_time_limit_minutes,
            bind_addr,
            cors_origins,
        })
    }

    /// Exam time limit in seconds, as sent to participants.
    pub fn time_limit_seconds(&self) -> u64 {
        self.exam_time_limit_minutes * 60
    }
}

fn parse_or(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("'{}' is not a whole number", raw),
        }),
        Err(_) => Ok(default),
    }
}
