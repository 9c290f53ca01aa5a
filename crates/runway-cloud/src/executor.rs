use std::process::{Output, Stdio};

use crate::command::{CommandError, Tool};

/// Abstraction over `aws` / `docker` CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture stdout.
    async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, CommandError>;

    /// Execute a command, streaming output to the terminal.
    async fn exec_streaming(&self, tool: Tool, args: &[String]) -> Result<(), CommandError>;

    /// Execute a command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        tool: Tool,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, CommandError>;
}

/// Spawns the real CLI binaries.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, CommandError> {
        tracing::debug!(%tool, ?args, "exec");

        let output = tokio::process::Command::new(tool.program())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CommandError::NotFound { tool, source: e })?;

        captured(tool, args, output)
    }

    async fn exec_streaming(&self, tool: Tool, args: &[String]) -> Result<(), CommandError> {
        tracing::debug!(%tool, ?args, "exec (streaming)");

        let status = tokio::process::Command::new(tool.program())
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| CommandError::NotFound { tool, source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::CommandFailed {
                tool,
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }

    async fn exec_with_stdin(
        &self,
        tool: Tool,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, CommandError> {
        use tokio::io::AsyncWriteExt;

        tracing::debug!(%tool, ?args, "exec (stdin)");

        let mut child = tokio::process::Command::new(tool.program())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CommandError::NotFound { tool, source: e })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| CommandError::StdinWrite { tool, source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| CommandError::StdinWrite { tool, source: e })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CommandError::NotFound { tool, source: e })?;

        captured(tool, args, output)
    }
}

fn captured(tool: Tool, args: &[String], output: Output) -> Result<String, CommandError> {
    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| CommandError::InvalidUtf8 { tool, source: e })
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(CommandError::CommandFailed {
            tool,
            args: args.to_vec(),
            stderr,
        })
    }
}
