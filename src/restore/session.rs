// pgswap/src/restore/session.rs
use tracing::info;

use crate::database::DatabaseConfig;
use crate::database::catalog::Catalog;
use crate::database::names::DatabaseNameSet;
use crate::errors::{AppError, Result};
use crate::storage::StorageClient;
use crate::storage::key::DumpKeyScheme;

/// Local keys that name a role database rather than a database on the server.
pub const RESERVED_LOCAL_KEYS: [&str; 4] = [":pre", ":previous", ":post", ":current"];

pub fn is_local_key(dump_key: &str) -> bool {
    dump_key.starts_with(':')
}

/// Database name a local key refers to.
pub fn local_database_name(names: &DatabaseNameSet, dump_key: &str) -> String {
    match dump_key {
        ":pre" | ":previous" => names.pre.name.clone(),
        ":post" | ":current" => names.post.name.clone(),
        other => other.trim_start_matches(':').to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreSource {
    /// A dump in storage, addressed by its full key.
    Remote { key: String },
    /// A database already on the server, copied by template.
    Local { key: String, database: DatabaseConfig },
}

impl RestoreSource {
    /// The key reported back to the caller.
    pub fn key(&self) -> &str {
        match self {
            RestoreSource::Remote { key } | RestoreSource::Local { key, .. } => key,
        }
    }
}

/// Everything one restore needs to know about where data comes from and goes.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreSession {
    pub names: DatabaseNameSet,
    pub source: RestoreSource,
    pub reversible: bool,
}

impl RestoreSession {
    pub async fn resolve<C: Catalog>(
        canonical: &DatabaseConfig,
        dump_key: &str,
        reversible: bool,
        catalog: &C,
        storage: &StorageClient,
        scheme: DumpKeyScheme,
    ) -> Result<Self> {
        let names = DatabaseNameSet::derive(canonical);

        let source = if is_local_key(dump_key) {
            let name = local_database_name(&names, dump_key);
            if !catalog.exists(&name).await? {
                return Err(AppError::NotFound(format!(
                    "Local database \"{}\" does not exist. Use \"pgswap ls --local\" to see local database keys.",
                    name
                )));
            }
            RestoreSource::Local {
                key: dump_key.to_string(),
                database: canonical.with_name(&name),
            }
        } else if scheme.is_valid(dump_key) {
            RestoreSource::Remote {
                key: dump_key.to_string(),
            }
        } else {
            let key = scheme
                .list(storage, dump_key)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Could not find a dump key matching prefix \"{}\"",
                        dump_key
                    ))
                })?;
            info!("Resolved \"{}\" to dump key \"{}\"", dump_key, key);
            RestoreSource::Remote { key }
        };

        Ok(RestoreSession {
            names,
            source,
            reversible,
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, RestoreSource::Local { .. })
    }

    /// Whether the replaced database is kept as the `pre` role.
    pub fn retains_history(&self) -> bool {
        self.reversible
    }

    /// Whether the staged data is copied into the `post` role. Restoring
    /// `post` itself keeps the existing copy.
    pub fn snapshots_post(&self) -> bool {
        match &self.source {
            RestoreSource::Local { database, .. } => {
                self.reversible && database.name != self.names.post.name
            }
            RestoreSource::Remote { .. } => self.reversible,
        }
    }
}
