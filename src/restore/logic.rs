// pgswap/src/restore/logic.rs
use std::fmt;
use tracing::{error, info, warn};

use super::session::{RestoreSession, RestoreSource};
use crate::config::Settings;
use crate::config::options::EffectiveOptions;
use crate::database::catalog::Catalog;
use crate::database::router::ConnectionRouter;
use crate::errors::{AppError, Result};
use crate::hooks::{HookRunner, run_hooks};
use crate::storage::StorageClient;
use crate::storage::key::DumpKeyScheme;
use crate::utils::shell::{Shell, ShellCommand};
use crate::utils::shell_quote;

/// Collaborators of one restore.
pub struct RestoreContext<'a, C: Catalog, S: Shell, H: HookRunner> {
    pub settings: &'a Settings,
    pub router: &'a ConnectionRouter,
    pub catalog: &'a C,
    pub storage: &'a StorageClient,
    pub shell: &'a S,
    pub hooks: &'a H,
    pub scheme: DumpKeyScheme,
    pub pg_restore: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Resolving,
    Staging,
    SnapshotPost,
    Hooked,
    Swapping,
    Retained,
    Cleaned,
    Done,
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestoreStage::Resolving => "resolving",
            RestoreStage::Staging => "staging",
            RestoreStage::SnapshotPost => "snapshotting post",
            RestoreStage::Hooked => "running pre-swap hooks",
            RestoreStage::Swapping => "swapping",
            RestoreStage::Retained => "retaining history",
            RestoreStage::Cleaned => "cleaning up",
            RestoreStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Restores a dump or local database into the canonical database and
/// returns the key that was restored.
///
/// The data is staged in `temp` and promoted with two renames. Any failure
/// before [`RestoreStage::Swapping`] leaves the canonical database untouched.
pub async fn perform_restore_orchestration<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    opts: &EffectiveOptions,
) -> Result<String> {
    let mut stage = RestoreStage::Resolving;
    let result = run_stages(ctx, opts, &mut stage).await;
    if let Err(e) = &result {
        error!("Restore failed while {}: {}", stage, e);
    }
    result
}

async fn run_stages<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    opts: &EffectiveOptions,
    stage: &mut RestoreStage,
) -> Result<String> {
    let dump_key = opts
        .dump_key
        .as_deref()
        .ok_or_else(|| AppError::Validation("Must provide a dump key to restore".to_string()))?;
    let canonical = ctx.settings.database_config(&opts.database)?;
    let session = RestoreSession::resolve(
        canonical,
        dump_key,
        opts.reversible,
        ctx.catalog,
        ctx.storage,
        ctx.scheme,
    )
    .await?;

    *stage = RestoreStage::Staging;
    stage_temp(ctx, &session).await?;

    if session.snapshots_post() {
        *stage = RestoreStage::SnapshotPost;
        snapshot_post(ctx, &session).await?;
    }

    if !opts.pre_swap_hooks.is_empty() {
        *stage = RestoreStage::Hooked;
        let route = ctx.router.route(&opts.database, &session.names.temp)?;
        let result = run_hooks(ctx.hooks, &route, &opts.pre_swap_hooks, "pre-swap").await;
        route.close().await;
        result?;
    }

    *stage = RestoreStage::Swapping;
    swap(ctx, &session).await?;

    if session.retains_history() {
        *stage = RestoreStage::Retained;
        retain_previous(ctx, &session).await?;
    } else {
        *stage = RestoreStage::Cleaned;
        clean_up(ctx, &session).await?;
    }

    *stage = RestoreStage::Done;
    info!(
        "Successfully restored \"{}\" into database \"{}\"",
        session.source.key(),
        session.names.canonical.name
    );
    Ok(session.source.key().to_string())
}

async fn stage_temp<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    session: &RestoreSession,
) -> Result<()> {
    let temp = &session.names.temp;

    match &session.source {
        RestoreSource::Local { database, .. } if database.name == temp.name => {
            info!("Restoring from \"{}\" in place", temp.name);
        }
        RestoreSource::Local { database, .. } => {
            info!("Creating \"{}\" from \"{}\"", temp.name, database.name);
            ctx.catalog.drop_database(&temp.name).await?;
            ctx.catalog.terminate_connections(&database.name).await?;
            ctx.catalog
                .create_database(&temp.name, Some(&database.name))
                .await?;
        }
        RestoreSource::Remote { key } => {
            info!("Restoring \"{}\" into \"{}\"", key, temp.name);
            ctx.catalog.drop_database(&temp.name).await?;
            ctx.catalog.create_database(&temp.name, None).await?;

            let read_fragment = ctx.storage.read_fragment(key);
            let command_for = |url: &str| {
                format!(
                    "{} {} --verbose --no-acl --no-owner -d {}",
                    read_fragment,
                    shell_quote(&ctx.pg_restore),
                    url
                )
            };
            info!("{}", command_for("<DB_URL>"));
            // pg_restore exits non-zero on harmless warnings, so its status is not checked.
            ctx.shell
                .run(
                    &ShellCommand::new(command_for(&shell_quote(&temp.url())))
                        .envs(ctx.storage.credential_env())
                        .ignore_errors(),
                )
                .await?;
        }
    }

    let search_path = ctx.catalog.search_path(&session.names.canonical).await?;
    ctx.catalog
        .set_search_path(&temp.name, &search_path)
        .await
}

async fn snapshot_post<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    session: &RestoreSession,
) -> Result<()> {
    let names = &session.names;
    info!("Keeping a copy of the restored data in \"{}\"", names.post.name);
    ctx.catalog.drop_database(&names.post.name).await?;
    ctx.catalog.terminate_connections(&names.temp.name).await?;
    ctx.catalog
        .create_database(&names.post.name, Some(&names.temp.name))
        .await
}

async fn swap<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    session: &RestoreSession,
) -> Result<()> {
    let names = &session.names;
    info!("Swapping \"{}\" into \"{}\"", names.temp.name, names.canonical.name);
    ctx.catalog.drop_database(&names.swap.name).await?;

    // Absent on the first restore into a fresh server.
    let moved_aside: Result<()> = async {
        ctx.catalog
            .terminate_connections(&names.canonical.name)
            .await?;
        ctx.catalog
            .rename_database(&names.canonical.name, &names.swap.name)
            .await
    }
    .await;
    if let Err(e) = moved_aside {
        warn!(
            "Could not move \"{}\" aside, continuing: {}",
            names.canonical.name, e
        );
    }

    ctx.catalog.terminate_connections(&names.temp.name).await?;
    ctx.catalog
        .rename_database(&names.temp.name, &names.canonical.name)
        .await
}

async fn retain_previous<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    session: &RestoreSession,
) -> Result<()> {
    let names = &session.names;
    ctx.catalog.drop_database(&names.pre.name).await?;
    if ctx.catalog.exists(&names.swap.name).await? {
        info!("Keeping the replaced data in \"{}\"", names.pre.name);
        ctx.catalog.terminate_connections(&names.swap.name).await?;
        ctx.catalog
            .rename_database(&names.swap.name, &names.pre.name)
            .await?;
    }
    Ok(())
}

async fn clean_up<C: Catalog, S: Shell, H: HookRunner>(
    ctx: &RestoreContext<'_, C, S, H>,
    session: &RestoreSession,
) -> Result<()> {
    let names = &session.names;
    ctx.catalog.drop_database(&names.swap.name).await?;
    if !session.is_local() {
        ctx.catalog.drop_database(&names.pre.name).await?;
        ctx.catalog.drop_database(&names.post.name).await?;
    }
    Ok(())
}
