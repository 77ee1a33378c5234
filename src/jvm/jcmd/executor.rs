use super::JcmdError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `tool args..` and returns its stdout.
///
/// A non-zero exit is an error; jcmd reports unknown pids that way.
pub async fn execute_command(
    tool: &Path,
    args: &[&str],
    timeout_duration: Option<Duration>,
) -> Result<String, JcmdError> {
    let timeout_duration = timeout_duration.unwrap_or(DEFAULT_TIMEOUT);
    let command = format!("{} {}", tool.display(), args.join(" "));
    debug!(%command, "executing");

    let output = timeout(
        timeout_duration,
        Command::new(tool).args(args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| JcmdError::Timeout {
        command: command.clone(),
    })?
    .map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => JcmdError::ToolNotFound(tool.display().to_string()),
        _ => JcmdError::ExecutionFailed {
            command: command.clone(),
            source: e,
        },
    })?;

    if !output.status.success() {
        return Err(JcmdError::NonZeroExit {
            command,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
