pub(crate) mod logic;

use chrono::Utc;

use crate::config::Settings;
use crate::config::options::{self, OptionArgs};
use crate::database::router::ConnectionRouter;
use crate::errors::{AppError, Result};
use crate::hooks::RegisteredHooks;
use crate::storage::StorageClient;
use crate::utils::find_executable;
use crate::utils::shell::SystemShell;

/// Public entry point for `pgswap dump`. Returns the key of the new dump.
pub async fn run_dump_flow(settings: &Settings, args: OptionArgs) -> Result<String> {
    if !settings.allow_dump {
        return Err(AppError::OperationDisabled("Dump not allowed.".to_string()));
    }

    let opts = options::resolve(settings, args)?;
    let storage = StorageClient::from_location(&opts.storage_location, settings.s3.as_ref())?;
    let pg_dump = find_executable("pg_dump")?;

    let router = ConnectionRouter::new(settings.databases.clone());
    let shell = SystemShell;
    let hooks = RegisteredHooks::new(&settings.hooks, &shell);
    let ctx = logic::DumpContext {
        settings,
        router: &router,
        storage: &storage,
        shell: &shell,
        hooks: &hooks,
        pg_dump: pg_dump.to_string_lossy().into_owned(),
    };

    logic::perform_dump_orchestration(&ctx, &opts, Utc::now()).await
}
