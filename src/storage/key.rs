//! Dump keys: `<instance>/<database>/<config>/<timestamp>.dump`.
//!
//! The timestamp is UTC with microseconds, so keys under one prefix sort by
//! recency as plain strings.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::StorageClient;
use crate::errors::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%6f";
pub const DUMP_EXTENSION: &str = ".dump";

static DUMP_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z0-9_-]+)/([A-Za-z0-9_-]+)/([A-Za-z0-9_-]+)/\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}-\d{6}\.dump$",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpKeyParts {
    pub instance: String,
    pub database: String,
    pub config: String,
}

/// Replaces anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub fn format(instance: &str, database: &str, config: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}/{}{}",
        sanitize(instance),
        sanitize(database),
        sanitize(config),
        timestamp.format(TIMESTAMP_FORMAT),
        DUMP_EXTENSION
    )
}

pub fn matches_pattern(key: &str) -> bool {
    DUMP_KEY_PATTERN.is_match(key)
}

pub fn parse(key: &str) -> Option<DumpKeyParts> {
    let captures = DUMP_KEY_PATTERN.captures(key)?;
    Some(DumpKeyParts {
        instance: captures[1].to_string(),
        database: captures[2].to_string(),
        config: captures[3].to_string(),
    })
}

/// Key validation as configured by `validate_dump_keys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpKeyScheme {
    validate: bool,
}

impl DumpKeyScheme {
    pub fn new(validate: bool) -> Self {
        DumpKeyScheme { validate }
    }

    pub fn is_valid(&self, key: &str) -> bool {
        !self.validate || matches_pattern(key)
    }

    /// Valid keys under `prefix`, most recent first.
    pub async fn list(&self, storage: &StorageClient, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = storage
            .list(prefix)
            .await?
            .into_iter()
            .filter(|key| self.is_valid(key))
            .collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));
        Ok(keys)
    }
}
