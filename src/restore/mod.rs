pub(crate) mod logic;
pub mod session;

use crate::config::Settings;
use crate::config::options::{self, OptionArgs};
use crate::database::catalog::PgCatalog;
use crate::database::router::ConnectionRouter;
use crate::errors::{AppError, Result};
use crate::hooks::RegisteredHooks;
use crate::storage::StorageClient;
use crate::storage::key::DumpKeyScheme;
use crate::utils::find_executable;
use crate::utils::shell::SystemShell;

/// Public entry point for `pgswap restore`. Returns the restored key.
pub async fn run_restore_flow(settings: &Settings, args: OptionArgs) -> Result<String> {
    if !settings.allow_restore {
        return Err(AppError::OperationDisabled("Restore not allowed.".to_string()));
    }

    let opts = options::resolve(settings, args)?;
    if opts.dump_key.is_none() {
        return Err(AppError::Validation(
            "Must provide a dump key to restore".to_string(),
        ));
    }

    let storage = StorageClient::from_location(&opts.storage_location, settings.s3.as_ref())?;
    let pg_restore = find_executable("pg_restore")?;
    let catalog = PgCatalog::connect(
        &settings.maintenance_config(&opts.database)?,
        settings.timeouts,
    )
    .await?;

    let router = ConnectionRouter::new(settings.databases.clone());
    let shell = SystemShell;
    let hooks = RegisteredHooks::new(&settings.hooks, &shell);
    let ctx = logic::RestoreContext {
        settings,
        router: &router,
        catalog: &catalog,
        storage: &storage,
        shell: &shell,
        hooks: &hooks,
        scheme: DumpKeyScheme::new(settings.validate_dump_keys),
        pg_restore: pg_restore.to_string_lossy().into_owned(),
    };

    let result = logic::perform_restore_orchestration(&ctx, &opts).await;
    catalog.close().await;
    result
}
