// pgswap/src/database/mod.rs
pub mod catalog;
pub mod names;
pub mod router;

use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::errors::{AppError, Result};

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection identity for one database on the server.
///
/// `user` and `password` are kept exactly as they appear in the connection URL
/// (percent-encoded), so `url()` reproduces them without double encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub connect_timeout: u64,
}

impl DatabaseConfig {
    /// Parses a `postgres://` or `postgresql://` connection URL.
    pub fn from_url(database_url: &str) -> Result<Self> {
        let parsed = Url::parse(database_url).map_err(|e| {
            AppError::Configuration(format!("Invalid database URL format: {}", e))
        })?;
        if parsed.scheme() != "postgres" && parsed.scheme() != "postgresql" {
            return Err(AppError::Configuration(format!(
                "Database URL must use the postgres:// scheme, got \"{}://\"",
                parsed.scheme()
            )));
        }

        let name = parsed.path().trim_start_matches('/').to_string();
        if name.is_empty() {
            return Err(AppError::Configuration(
                "Database name not found in database URL path".to_string(),
            ));
        }

        let connect_timeout = parsed
            .query_pairs()
            .find(|(key, _)| key == "connect_timeout")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        Ok(DatabaseConfig {
            host: parsed.host_str().unwrap_or("localhost").to_string(),
            port: parsed.port().unwrap_or(DEFAULT_PORT),
            user: parsed.username().to_string(),
            password: parsed.password().unwrap_or("").to_string(),
            name,
            connect_timeout,
        })
    }

    /// Returns a copy of this configuration pointing at another database.
    pub fn with_name(&self, name: &str) -> Self {
        let mut derived = self.clone();
        derived.name = name.to_string();
        derived
    }

    pub fn url(&self) -> String {
        self.render_url(&self.password)
    }

    /// The connection URL with the password masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        if self.password.is_empty() {
            self.url()
        } else {
            self.render_url("***")
        }
    }

    fn render_url(&self, password: &str) -> String {
        let credentials = match (self.user.is_empty(), password.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("{}@", self.user),
            (false, false) => format!("{}:{}@", self.user, password),
        };
        format!(
            "postgresql://{}{}:{}/{}",
            credentials, self.host, self.port, self.name
        )
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        Ok(PgConnectOptions::from_str(&self.url())?)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Environment understood by libpq-based tools and most application frameworks.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("DATABASE_URL".to_string(), self.url()),
            ("PGHOST".to_string(), self.host.clone()),
            ("PGPORT".to_string(), self.port.to_string()),
            ("PGDATABASE".to_string(), self.name.clone()),
        ];
        if !self.user.is_empty() {
            env.push(("PGUSER".to_string(), self.user.clone()));
        }
        if !self.password.is_empty() {
            env.push(("PGPASSWORD".to_string(), self.password.clone()));
        }
        env
    }
}
