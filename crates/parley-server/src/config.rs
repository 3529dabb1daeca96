use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLEY_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let db_path = lookup("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()).into();
        let host = lookup("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("PARLEY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
        })
    }
}
