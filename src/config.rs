//! Configuration for Wriders
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// MongoDB (production)
    Mongo,
    /// In-process store, data is lost on restart
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Wriders - serialized book publishing service
#[derive(Parser, Debug, Clone)]
#[command(name = "wriders")]
#[command(about = "Publishing and reading service for serialized books")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (insecure default JWT secret, memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Storage backend
    #[arg(long, env = "STORE", value_enum, default_value = "mongo")]
    pub store: StoreKind,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "wriders")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Reading speed used for anonymous readers and new accounts
    #[arg(long, env = "DEFAULT_WPM", default_value = "250")]
    pub default_wpm: u32,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Effective JWT secret (uses an insecure default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some("dev-only-insecure-secret".to_string()),
            (None, false) => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if let Some(secret) = &self.jwt_secret {
            if secret.len() < 16 {
                return Err("JWT_SECRET must be at least 16 characters".to_string());
            }
        }

        if !(50..=1500).contains(&self.default_wpm) {
            return Err("DEFAULT_WPM must be between 50 and 1500".to_string());
        }

        if self.max_body_bytes < 1024 {
            return Err("MAX_BODY_BYTES must be at least 1024".to_string());
        }

        Ok(())
    }

    /// Arguments suitable for tests: dev mode, memory store
    pub fn for_tests() -> Self {
        Self::parse_from(["wriders", "--dev-mode", "--store", "memory"])
    }
}
