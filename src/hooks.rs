// pgswap/src/hooks.rs
use serde::Deserialize;
use sqlx::Executor;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::database::router::Route;
use crate::errors::{AppError, Result};
use crate::utils::shell::{Shell, ShellCommand};

/// A command registered under `hooks` in the settings file.
///
/// Exactly one of `shell` or `sql` is set. `database` names the connection
/// alias the hook runs against; it defaults to the routed alias.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookDefinition {
    pub shell: Option<String>,
    pub sql: Option<String>,
    pub database: Option<String>,
}

impl HookDefinition {
    pub fn validate(&self, name: &str) -> Result<()> {
        match (&self.shell, &self.sql) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(AppError::Configuration(format!(
                "Hook \"{}\" must define exactly one of \"shell\" or \"sql\"",
                name
            ))),
        }
    }
}

/// Runs a named hook while `route` points the default alias at staged data.
#[allow(async_fn_in_trait)]
pub trait HookRunner {
    async fn run(&self, name: &str, route: &Route<'_>) -> Result<()>;
}

/// Hooks from the settings file, shell hooks executed through `shell`.
pub struct RegisteredHooks<'a, S: Shell> {
    hooks: &'a BTreeMap<String, HookDefinition>,
    shell: &'a S,
}

impl<'a, S: Shell> RegisteredHooks<'a, S> {
    pub fn new(hooks: &'a BTreeMap<String, HookDefinition>, shell: &'a S) -> Self {
        RegisteredHooks { hooks, shell }
    }
}

impl<S: Shell> HookRunner for RegisteredHooks<'_, S> {
    async fn run(&self, name: &str, route: &Route<'_>) -> Result<()> {
        let hook = self.hooks.get(name).ok_or_else(|| {
            AppError::Configuration(format!(
                "Hook \"{}\" is not registered in \"hooks\" of the settings file.",
                name
            ))
        })?;

        // Fails for any alias other than the routed one.
        route.connection(hook.database.as_deref().unwrap_or(route.alias()))?;

        if let Some(command) = &hook.shell {
            return self
                .shell
                .run(&ShellCommand::new(command.clone()).envs(route.env()))
                .await;
        }
        if let Some(sql) = &hook.sql {
            let pool = route.pool().await?;
            pool.execute(sql.as_str()).await.map_err(|e| {
                AppError::ExternalTool(format!("SQL hook \"{}\" failed: {}", name, e))
            })?;
        }
        Ok(())
    }
}

/// Runs `names` in order, stopping at the first failure.
pub async fn run_hooks<H: HookRunner>(
    runner: &H,
    route: &Route<'_>,
    names: &[String],
    stage: &str,
) -> Result<()> {
    for name in names {
        info!("Running \"{}\" {} hook", name, stage);
        if let Err(e) = runner.run(name, route).await {
            error!("{} hook \"{}\" failed: {}", stage, name, e);
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConfig;
    use crate::database::router::ConnectionRouter;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingShell {
        commands: Mutex<Vec<ShellCommand>>,
    }

    impl Shell for RecordingShell {
        async fn run(&self, command: &ShellCommand) -> Result<()> {
            self.commands.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    fn router() -> ConnectionRouter {
        let mut connections = BTreeMap::new();
        connections.insert(
            "default".to_string(),
            DatabaseConfig::from_url("postgres://app@localhost/orders").unwrap(),
        );
        connections.insert(
            "analytics".to_string(),
            DatabaseConfig::from_url("postgres://app@localhost/analytics").unwrap(),
        );
        ConnectionRouter::new(connections)
    }

    fn hook(shell: Option<&str>, sql: Option<&str>, database: Option<&str>) -> HookDefinition {
        HookDefinition {
            shell: shell.map(str::to_string),
            sql: sql.map(str::to_string),
            database: database.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_requires_exactly_one_command() {
        assert!(hook(Some("true"), None, None).validate("a").is_ok());
        assert!(hook(None, Some("SELECT 1"), None).validate("a").is_ok());
        assert!(matches!(
            hook(None, None, None).validate("a"),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            hook(Some("true"), Some("SELECT 1"), None).validate("a"),
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_shell_hook_sees_routed_database() -> anyhow::Result<()> {
        let mut hooks = BTreeMap::new();
        hooks.insert("migrate".to_string(), hook(Some("./manage.py migrate"), None, None));
        let shell = RecordingShell::default();
        let runner = RegisteredHooks::new(&hooks, &shell);

        let router = router();
        let temp = DatabaseConfig::from_url("postgres://app@localhost/orders__temp")?;
        let route = router.route("default", &temp)?;
        run_hooks(&runner, &route, &["migrate".to_string()], "pre-swap").await?;
        route.close().await;

        let commands = shell.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].line, "./manage.py migrate");
        assert!(commands[0]
            .env
            .contains(&("PGDATABASE".to_string(), "orders__temp".to_string())));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_hook_is_configuration_error() -> anyhow::Result<()> {
        let hooks = BTreeMap::new();
        let shell = RecordingShell::default();
        let runner = RegisteredHooks::new(&hooks, &shell);
        let router = router();
        let temp = DatabaseConfig::from_url("postgres://app@localhost/orders__temp")?;
        let route = router.route("default", &temp)?;

        let result = run_hooks(&runner, &route, &["missing".to_string()], "pre-dump").await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_hook_on_other_alias_is_refused() -> anyhow::Result<()> {
        let mut hooks = BTreeMap::new();
        hooks.insert("report".to_string(), hook(Some("./report"), None, Some("analytics")));
        let shell = RecordingShell::default();
        let runner = RegisteredHooks::new(&hooks, &shell);
        let router = router();
        let temp = DatabaseConfig::from_url("postgres://app@localhost/orders__temp")?;
        let route = router.route("default", &temp)?;

        let result = runner.run("report", &route).await;
        assert!(matches!(result, Err(AppError::Routing(_))));
        assert!(shell.commands.lock().unwrap().is_empty());
        Ok(())
    }
}
