// pgswap/src/utils/shell.rs
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{AppError, Result};

/// One shell pipeline plus the environment it runs with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellCommand {
    pub line: String,
    pub env: Vec<(String, String)>,
    pub ignore_errors: bool,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Self {
        ShellCommand {
            line: line.into(),
            ..Default::default()
        }
    }

    pub fn envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn ignore_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }
}

/// Executes shell pipelines. Failures never include the command line, which
/// may carry credentials.
#[allow(async_fn_in_trait)]
pub trait Shell {
    async fn run(&self, command: &ShellCommand) -> Result<()>;
}

/// Runs commands with `bash -o pipefail -c`, streaming output into the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl Shell for SystemShell {
    async fn run(&self, command: &ShellCommand) -> Result<()> {
        let mut child = Command::new("bash")
            .arg("-o")
            .arg("pipefail")
            .arg("-c")
            .arg(&command.line)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::ExternalTool(format!("Failed to start bash: {}", e)))?;

        let (stdout, stderr) = tokio::join!(
            forward_lines(child.stdout.take()),
            forward_lines(child.stderr.take())
        );
        stdout?;
        stderr?;

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }
        if command.ignore_errors {
            warn!("Command exited with {}, continuing", status);
            return Ok(());
        }
        debug!("Command exited with {}", status);
        Err(AppError::ExternalTool("Error running command.".to_string()))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<()> {
    let Some(stream) = stream else {
        return Ok(());
    };
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        info!("{}", line);
    }
    Ok(())
}
