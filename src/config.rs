// src/config.rs

use std::{env, path::PathBuf};

use dotenvy::dotenv;
use thiserror::Error;

/// Minimum quiz score (percent) for a module to count as completed.
pub const DEFAULT_PASS_THRESHOLD: i32 = 70;

/// Profile images are capped at 5 MiB.
pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Book PDFs are capped at 10 MiB.
pub const MAX_BOOK_BYTES: usize = 10 * 1024 * 1024;

/// Course images and module files are capped at 20 MiB each.
pub const MAX_COURSE_FILE_BYTES: usize = 20 * 1024 * 1024;

/// A course may carry at most this many uploaded module files per request.
pub const MAX_MODULE_FILES: usize = 10;

/// Lifetime of a signed file download link.
pub const SIGNED_FILE_TTL_SECONDS: u64 = 10 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub pass_threshold: i32,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: 2 * 60 * 60,
            rust_log: "info".to_string(),
            admin_email: None,
            admin_password: None,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://localhost:3000".to_string(),
            port: 3000,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_body_bytes: 64 * 1024 * 1024,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let defaults = Self::new(required("DATABASE_URL")?, required("JWT_SECRET")?);

        let pass_threshold = parsed("PASS_THRESHOLD", defaults.pass_threshold)?;
        if !(0..=100).contains(&pass_threshold) {
            return Err(ConfigError::Invalid {
                name: "PASS_THRESHOLD",
                reason: format!("{} is outside 0..=100", pass_threshold),
            });
        }

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.allowed_origins.clone(),
        };

        Ok(Self {
            jwt_expiration: parsed("JWT_EXPIRATION", defaults.jwt_expiration)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| defaults.rust_log.clone()),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            pass_threshold,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| defaults.upload_dir.clone()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| defaults.public_base_url.clone()),
            port: parsed("PORT", defaults.port)?,
            allowed_origins,
            max_body_bytes: parsed("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            ..defaults
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
