// pgswap/src/dump/logic.rs
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Settings;
use crate::config::options::EffectiveOptions;
use crate::database::router::ConnectionRouter;
use crate::errors::Result;
use crate::hooks::{HookRunner, run_hooks};
use crate::storage::{StorageClient, key};
use crate::utils::shell::{Shell, ShellCommand};
use crate::utils::shell_quote;

/// Collaborators of one dump.
pub struct DumpContext<'a, S: Shell, H: HookRunner> {
    pub settings: &'a Settings,
    pub router: &'a ConnectionRouter,
    pub storage: &'a StorageClient,
    pub shell: &'a S,
    pub hooks: &'a H,
    pub pg_dump: String,
}

/// Dumps the selected database into storage and returns the new dump key.
pub async fn perform_dump_orchestration<S: Shell, H: HookRunner>(
    ctx: &DumpContext<'_, S, H>,
    opts: &EffectiveOptions,
    now: DateTime<Utc>,
) -> Result<String> {
    let source = ctx.settings.database_config(&opts.database)?;
    let dump_key = key::format(&opts.instance, &opts.database, &opts.config, now);

    if !opts.pre_dump_hooks.is_empty() {
        let route = ctx.router.route(&opts.database, source)?;
        let result = run_hooks(ctx.hooks, &route, &opts.pre_dump_hooks, "pre-dump").await;
        route.close().await;
        result?;
    }

    let excludes: String = opts
        .exclude
        .iter()
        .map(|table| format!(" --exclude-table-data={}", shell_quote(table)))
        .collect();
    let write_fragment = ctx.storage.write_fragment(&dump_key)?;
    let command_for = |url: &str| {
        format!(
            "{} -Fc --no-acl --no-owner {}{} {}",
            shell_quote(&ctx.pg_dump),
            url,
            excludes,
            write_fragment
        )
    };

    info!("Creating dump \"{}\"", dump_key);
    info!("{}", command_for("<DB_URL>"));
    ctx.shell
        .run(
            &ShellCommand::new(command_for(&shell_quote(&source.url())))
                .envs(ctx.storage.credential_env()),
        )
        .await?;

    info!("Successfully created dump \"{}\"", dump_key);
    Ok(dump_key)
}
