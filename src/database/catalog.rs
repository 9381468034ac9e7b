// pgswap/src/database/catalog.rs
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, Pool, Postgres};
use tracing::{debug, warn};

use super::DatabaseConfig;
use crate::config::StatementTimeouts;
use crate::errors::{AppError, Result};

/// Server-level DDL needed to stage, swap and clean up databases.
///
/// Every statement runs against the maintenance database, never against the
/// database being changed.
#[allow(async_fn_in_trait)]
pub trait Catalog {
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Names of all non-template databases that accept connections.
    async fn list_databases(&self) -> Result<Vec<String>>;

    async fn terminate_connections(&self, name: &str) -> Result<()>;

    /// Terminates connections and drops the database. Absence is not an error.
    async fn drop_database(&self, name: &str) -> Result<()>;

    async fn create_database(&self, name: &str, template: Option<&str>) -> Result<()>;

    async fn rename_database(&self, from: &str, to: &str) -> Result<()>;

    /// Current `search_path` as seen by a session on `database`.
    async fn search_path(&self, database: &DatabaseConfig) -> Result<String>;

    async fn set_search_path(&self, name: &str, search_path: &str) -> Result<()>;
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct PgCatalog {
    pool: Pool<Postgres>,
    timeouts: StatementTimeouts,
}

impl PgCatalog {
    pub async fn connect(maintenance: &DatabaseConfig, timeouts: StatementTimeouts) -> Result<Self> {
        debug!("Connecting to maintenance database {}", maintenance.redacted_url());
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(maintenance.acquire_timeout())
            .connect_with(maintenance.connect_options()?)
            .await
            .map_err(|e| {
                AppError::ExternalTool(format!(
                    "Failed to connect to maintenance database \"{}\" on {}: {}",
                    maintenance.name, maintenance.host, e
                ))
            })?;
        Ok(PgCatalog { pool, timeouts })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Acquires the maintenance session and applies the configured timeouts,
    /// so every batch of statements starts with them.
    async fn session(&self) -> Result<PoolConnection<Postgres>> {
        let mut conn = self.pool.acquire().await?;
        for statement in self.timeouts.preamble() {
            (&mut *conn)
                .execute(statement.as_str())
                .await
                .map_err(|e| AppError::ExternalTool(format!("Failed to run \"{}\": {}", statement, e)))?;
        }
        Ok(conn)
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        let mut conn = self.session().await?;
        (&mut *conn)
            .execute(sql)
            .await
            .map_err(|e| AppError::ExternalTool(format!("Failed to run \"{}\": {}", sql, e)))?;
        Ok(())
    }
}

impl Catalog for PgCatalog {
    async fn exists(&self, name: &str) -> Result<bool> {
        let mut conn = self.session().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists)
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let mut conn = self.session().await?;
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT datname FROM pg_database WHERE datistemplate = false AND datallowconn = true ORDER BY datname",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(names)
    }

    async fn terminate_connections(&self, name: &str) -> Result<()> {
        let mut conn = self.session().await?;
        sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1 AND pid <> pg_backend_pid()",
        )
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::ExternalTool(format!(
                "Failed to terminate connections to database \"{}\". This might require superuser privileges: {}",
                name, e
            ))
        })?;
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        self.terminate_connections(name).await?;
        self.execute_ddl(&format!("DROP DATABASE IF EXISTS {}", quote_ident(name)))
            .await
    }

    async fn create_database(&self, name: &str, template: Option<&str>) -> Result<()> {
        let mut sql = format!("CREATE DATABASE {}", quote_ident(name));
        if let Some(template) = template {
            sql.push_str(&format!(" TEMPLATE {}", quote_ident(template)));
        }
        self.execute_ddl(&sql).await
    }

    async fn rename_database(&self, from: &str, to: &str) -> Result<()> {
        self.execute_ddl(&format!(
            "ALTER DATABASE {} RENAME TO {}",
            quote_ident(from),
            quote_ident(to)
        ))
        .await
    }

    async fn search_path(&self, database: &DatabaseConfig) -> Result<String> {
        let live = match PgConnection::connect_with(&database.connect_options()?).await {
            Ok(mut conn) => {
                let path: String = sqlx::query_scalar("SHOW search_path").fetch_one(&mut conn).await?;
                let _ = conn.close().await;
                Some(path)
            }
            Err(e) => {
                warn!(
                    "Could not connect to \"{}\" to read its search_path ({}), using the server default",
                    database.name, e
                );
                None
            }
        };

        match live {
            Some(path) => Ok(path),
            None => {
                let mut conn = self.session().await?;
                Ok(sqlx::query_scalar("SHOW search_path").fetch_one(&mut *conn).await?)
            }
        }
    }

    async fn set_search_path(&self, name: &str, search_path: &str) -> Result<()> {
        self.execute_ddl(&format!(
            "ALTER DATABASE {} SET search_path TO {}",
            quote_ident(name),
            search_path
        ))
        .await
    }
}
