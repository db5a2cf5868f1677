use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub users_file: PathBuf,
    pub recipes_file: PathBuf,
    /// Wall-clock offset used to decide which day and week "today" is.
    pub utc_offset: UtcOffset,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutriplan".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutriplan-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };

        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()
            .context("APP_PORT must be a port number")?;

        let utc_offset = match std::env::var("APP_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw)?,
            Err(_) => UtcOffset::UTC,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            users_file: std::env::var("USERS_FILE")
                .unwrap_or_else(|_| "data/users.json".into())
                .into(),
            recipes_file: std::env::var("RECIPES_FILE")
                .unwrap_or_else(|_| "data/recipes.json".into())
                .into(),
            utc_offset,
            jwt,
        })
    }
}

/// Parses offsets of the form `+02:00` / `-05:30`.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(raw.trim(), &format)
        .with_context(|| format!("APP_UTC_OFFSET {raw:?} is not a +HH:MM offset"))
}
