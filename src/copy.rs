// pgswap/src/copy.rs
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

use crate::config::Settings;
use crate::config::options::{self, OptionArgs};
use crate::database::DatabaseConfig;
use crate::database::catalog::{Catalog, PgCatalog};
use crate::database::names::DatabaseNameSet;
use crate::errors::{AppError, Result};
use crate::restore::session::{RESERVED_LOCAL_KEYS, is_local_key};

static DATABASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Checks a copy target key and returns the database name it stands for.
pub fn copy_target(source: &DatabaseConfig, dump_key: Option<&str>) -> Result<String> {
    let dump_key = dump_key
        .ok_or_else(|| AppError::Validation("Must provide a dump key to copy".to_string()))?;
    if !is_local_key(dump_key) {
        return Err(AppError::Validation(format!(
            "Copy target \"{}\" must be a local key starting with \":\"",
            dump_key
        )));
    }
    if RESERVED_LOCAL_KEYS.contains(&dump_key) {
        return Err(AppError::Validation(format!(
            "Cannot copy to \"{}\", it is reserved for restore history",
            dump_key
        )));
    }

    let name = &dump_key[1..];
    if !DATABASE_NAME.is_match(name) {
        return Err(AppError::Validation(format!(
            "\"{}\" is not a valid database name",
            name
        )));
    }
    if DatabaseNameSet::derive(source).is_role_name(name) {
        return Err(AppError::Validation(format!(
            "Cannot copy to \"{}\", it is managed by restore",
            dump_key
        )));
    }
    if name == source.name {
        return Err(AppError::Validation(
            "Target database cannot be the same as source database.".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Copies `source` into the database named by `dump_key` with `CREATE DATABASE ... TEMPLATE`.
pub async fn perform_copy<C: Catalog>(
    catalog: &C,
    source: &DatabaseConfig,
    dump_key: Option<&str>,
) -> Result<String> {
    let target = copy_target(source, dump_key)?;
    info!("Copying \"{}\" to \"{}\"", source.name, target);

    catalog.drop_database(&target).await?;
    catalog.terminate_connections(&source.name).await?;
    catalog.create_database(&target, Some(&source.name)).await?;

    info!("Successfully copied \"{}\" to \":{}\"", source.name, target);
    Ok(format!(":{}", target))
}

/// Public entry point for `pgswap copy`.
pub async fn run_copy_flow(settings: &Settings, args: OptionArgs) -> Result<String> {
    if !settings.allow_copy {
        return Err(AppError::OperationDisabled("Copy not allowed.".to_string()));
    }

    let opts = options::resolve(settings, args)?;
    let source = settings.database_config(&opts.database)?;
    copy_target(source, opts.dump_key.as_deref())?;

    let catalog = PgCatalog::connect(
        &settings.maintenance_config(&opts.database)?,
        settings.timeouts,
    )
    .await?;
    let result = perform_copy(&catalog, source, opts.dump_key.as_deref()).await;
    catalog.close().await;
    result
}
