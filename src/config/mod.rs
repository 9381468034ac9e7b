// pgswap/src/config/mod.rs
pub mod options;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::database::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::hooks::HookDefinition;

pub const DEFAULT_SETTINGS_FILE: &str = "pgswap.json";
pub const DEFAULT_STORAGE_LOCATION: &str = ".pgswap/";
pub const DEFAULT_DATABASE_ALIAS: &str = "default";
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

// Structs for deserializing the settings file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonS3StorageConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

/// A named bundle of options, selected with `--config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    pub dump_key: Option<String>,
    pub instance: Option<String>,
    pub database: Option<String>,
    pub storage_location: Option<String>,
    pub reversible: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub pre_dump_hooks: Option<Vec<String>>,
    pub pre_swap_hooks: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    #[serde(default)]
    pub databases: BTreeMap<String, String>,
    pub maintenance_database: Option<String>,
    pub storage_location: Option<String>,
    pub allow_dump: Option<bool>,
    pub allow_restore: Option<bool>,
    pub allow_copy: Option<bool>,
    pub instance: Option<String>,
    pub database: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub pre_dump_hooks: Option<Vec<String>>,
    pub pre_swap_hooks: Option<Vec<String>>,
    pub reversible: Option<bool>,
    #[serde(default)]
    pub configs: BTreeMap<String, PresetConfig>,
    #[serde(default)]
    pub hooks: BTreeMap<String, HookDefinition>,
    pub s3: Option<JsonS3StorageConfig>,
    pub statement_timeout: Option<u64>,
    pub lock_timeout: Option<u64>,
    pub validate_dump_keys: Option<bool>,
}

/// Credentials and endpoint for S3-compatible storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct S3Settings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl S3Settings {
    /// Environment passed to the `aws` CLI.
    pub fn env(&self) -> Vec<(String, String)> {
        [
            ("AWS_ACCESS_KEY_ID", &self.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &self.secret_access_key),
            ("AWS_DEFAULT_REGION", &self.region),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

/// Optional server-side timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementTimeouts {
    pub lock_timeout: Option<u64>,
    pub statement_timeout: Option<u64>,
}

impl StatementTimeouts {
    /// Statements that start every batch sent to the server.
    pub fn preamble(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(ms) = self.lock_timeout {
            statements.push(format!("SET lock_timeout = {}", ms));
        }
        if let Some(ms) = self.statement_timeout {
            statements.push(format!("SET statement_timeout = {}", ms));
        }
        statements
    }
}

/// Global settings. Built once per invocation and passed explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub databases: BTreeMap<String, DatabaseConfig>,
    pub maintenance_database: String,
    pub storage_location: String,
    pub allow_dump: bool,
    pub allow_restore: bool,
    pub allow_copy: bool,
    pub instance: String,
    pub database: String,
    pub exclude: Vec<String>,
    pub pre_dump_hooks: Vec<String>,
    pub pre_swap_hooks: Vec<String>,
    pub reversible: bool,
    pub configs: BTreeMap<String, PresetConfig>,
    pub hooks: BTreeMap<String, HookDefinition>,
    pub s3: Option<S3Settings>,
    pub timeouts: StatementTimeouts,
    pub validate_dump_keys: bool,
}

impl Settings {
    /// Loads the settings file. A missing file yields the defaults, with the
    /// default database taken from `DATABASE_URL`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                AppError::Configuration(format!(
                    "Failed to read settings file at {}: {}",
                    path.display(),
                    e
                ))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                AppError::Configuration(format!(
                    "Failed to parse JSON from settings file at {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            debug!("No settings file at {}, using defaults", path.display());
            RawJsonConfig::default()
        };

        Settings::from_raw(raw, std::env::var("DATABASE_URL").ok(), default_instance())
    }

    pub fn from_raw(
        raw: RawJsonConfig,
        database_url: Option<String>,
        default_instance: String,
    ) -> Result<Self> {
        let mut urls = raw.databases;
        if let Some(url) = database_url {
            urls.entry(DEFAULT_DATABASE_ALIAS.to_string()).or_insert(url);
        }

        let databases = urls
            .iter()
            .map(|(alias, url)| {
                DatabaseConfig::from_url(url)
                    .map(|config| (alias.clone(), config))
                    .map_err(|e| {
                        AppError::Configuration(format!("Database \"{}\": {}", alias, e))
                    })
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        for (name, hook) in &raw.hooks {
            hook.validate(name)?;
        }

        Ok(Settings {
            databases,
            maintenance_database: raw
                .maintenance_database
                .unwrap_or_else(|| DEFAULT_MAINTENANCE_DATABASE.to_string()),
            storage_location: normalize_storage_location(
                raw.storage_location.as_deref().unwrap_or(DEFAULT_STORAGE_LOCATION),
            ),
            allow_dump: raw.allow_dump.unwrap_or(true),
            allow_restore: raw.allow_restore.unwrap_or(true),
            allow_copy: raw.allow_copy.unwrap_or(true),
            instance: raw.instance.unwrap_or(default_instance),
            database: raw
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE_ALIAS.to_string()),
            exclude: raw.exclude.unwrap_or_default(),
            pre_dump_hooks: raw.pre_dump_hooks.unwrap_or_default(),
            pre_swap_hooks: raw.pre_swap_hooks.unwrap_or_default(),
            reversible: raw.reversible.unwrap_or(false),
            configs: raw.configs,
            hooks: raw.hooks,
            s3: raw.s3.map(|s3| S3Settings {
                access_key_id: s3.access_key_id.filter(|s| !s.is_empty()),
                secret_access_key: s3.secret_access_key.filter(|s| !s.is_empty()),
                region: s3.region.filter(|s| !s.is_empty()),
                endpoint_url: s3.endpoint_url.filter(|s| !s.is_empty()),
            }),
            timeouts: StatementTimeouts {
                lock_timeout: raw.lock_timeout,
                statement_timeout: raw.statement_timeout,
            },
            validate_dump_keys: raw.validate_dump_keys.unwrap_or(true),
        })
    }

    pub fn database_config(&self, alias: &str) -> Result<&DatabaseConfig> {
        self.databases.get(alias).ok_or_else(|| {
            AppError::Configuration(format!(
                "\"{}\" is not a valid database. Add it to \"databases\" in the settings file or set DATABASE_URL.",
                alias
            ))
        })
    }

    /// Configuration of the database DDL connects through, on the same server as `alias`.
    pub fn maintenance_config(&self, alias: &str) -> Result<DatabaseConfig> {
        Ok(self.database_config(alias)?.with_name(&self.maintenance_database))
    }
}

pub fn normalize_storage_location(location: &str) -> String {
    if location.ends_with('/') {
        location.to_string()
    } else {
        format!("{}/", location)
    }
}

fn default_instance() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
