// pgswap/src/ls.rs
use std::collections::BTreeSet;

use crate::config::Settings;
use crate::config::options::{self, OptionArgs};
use crate::database::catalog::{Catalog, PgCatalog};
use crate::errors::{AppError, Result};
use crate::storage::StorageClient;
use crate::storage::key::{self, DumpKeyScheme};

/// What `ls` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    Keys,
    Instances,
    Databases,
    Configs,
    Local,
}

impl ListView {
    pub fn from_flags(instances: bool, databases: bool, configs: bool, local: bool) -> Result<Self> {
        let selected = [
            (instances, ListView::Instances),
            (databases, ListView::Databases),
            (configs, ListView::Configs),
            (local, ListView::Local),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, view)| view)
        .collect::<Vec<_>>();

        match selected.as_slice() {
            [] => Ok(ListView::Keys),
            [view] => Ok(*view),
            _ => Err(AppError::Validation(
                "Can only use one of --instances, --databases, --configs, or --local.".to_string(),
            )),
        }
    }
}

/// Keys most recent first, or the unique sorted segment the view asks for.
pub fn project(keys: Vec<String>, view: ListView) -> Vec<String> {
    let segment: fn(key::DumpKeyParts) -> String = match view {
        ListView::Instances => |parts: key::DumpKeyParts| parts.instance,
        ListView::Databases => |parts: key::DumpKeyParts| parts.database,
        ListView::Configs => |parts: key::DumpKeyParts| parts.config,
        ListView::Keys | ListView::Local => return keys,
    };
    keys.iter()
        .filter_map(|k| key::parse(k))
        .map(segment)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub async fn list_dump_keys(
    scheme: DumpKeyScheme,
    storage: &StorageClient,
    prefix: &str,
    view: ListView,
) -> Result<Vec<String>> {
    Ok(project(scheme.list(storage, prefix).await?, view))
}

/// Every database on the server as a local restore key.
pub async fn list_local<C: Catalog>(catalog: &C) -> Result<Vec<String>> {
    Ok(catalog
        .list_databases()
        .await?
        .into_iter()
        .map(|name| format!(":{}", name))
        .collect())
}

/// Public entry point for `pgswap ls`.
pub async fn run_ls_flow(
    settings: &Settings,
    args: OptionArgs,
    prefix: Option<String>,
    view: ListView,
) -> Result<Vec<String>> {
    let opts = options::resolve(settings, args)?;

    if view == ListView::Local {
        let catalog = PgCatalog::connect(
            &settings.maintenance_config(&opts.database)?,
            settings.timeouts,
        )
        .await?;
        let result = list_local(&catalog).await;
        catalog.close().await;
        return result;
    }

    let storage = StorageClient::from_location(&opts.storage_location, settings.s3.as_ref())?;
    let scheme = DumpKeyScheme::new(settings.validate_dump_keys);
    list_dump_keys(scheme, &storage, prefix.as_deref().unwrap_or(""), view).await
}
