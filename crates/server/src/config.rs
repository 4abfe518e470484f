use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "server";

/// Development fallback for `JWT_SECRET`; startup warns while it is in use.
pub const DEV_JWT_SECRET: &str = "quiz-dev-secret";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub http_url: String,
    pub bind_host: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 4000,
            http_url: "http://localhost:".into(),
            bind_host: "0.0.0.0".into(),
            database_url: "sqlite://./data/quiz.db".into(),
            jwt_secret: DEV_JWT_SECRET.into(),
            token_ttl_seconds: 24 * 60 * 60,
        }
    }
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// `HTTP_URL` is a prefix the port is appended to, e.g. `http://localhost:4000`.
    pub fn public_url(&self) -> String {
        format!("{}{}", self.http_url, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Defaults, then an optional `server.toml`, then process environment
/// (`PORT`, `HTTP_URL`, `BIND_HOST`, `DATABASE_URL`, `JWT_SECRET`,
/// `TOKEN_TTL_SECONDS`).
pub fn load_settings() -> anyhow::Result<Settings> {
    build_settings(Environment::default().try_parsing(true))
}

pub(crate) fn build_settings(environment: Environment) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    Config::builder()
        .set_default("port", i64::from(defaults.port))?
        .set_default("http_url", defaults.http_url)?
        .set_default("bind_host", defaults.bind_host)?
        .set_default("database_url", defaults.database_url)?
        .set_default("jwt_secret", defaults.jwt_secret)?
        .set_default("token_ttl_seconds", defaults.token_ttl_seconds)?
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(environment)
        .build()
        .context("failed to read server settings")?
        .try_deserialize()
        .context("invalid server settings")
}

/// Plain file paths become `sqlite://` urls; anything with a scheme passes
/// through. Windows drive paths use the single-colon `sqlite:C:/...` form.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite://")
        .or_else(|| raw_database_url.strip_prefix("sqlite:"));
    match path {
        Some(path) if has_drive_letter(path) => format!("sqlite:{}", path.replace('\\', "/")),
        Some(_) => raw_database_url.to_string(),
        None if raw_database_url.contains("://") => raw_database_url.to_string(),
        None if has_drive_letter(raw_database_url) => {
            format!("sqlite:{}", raw_database_url.replace('\\', "/"))
        }
        None => format!("sqlite://{raw_database_url}"),
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
