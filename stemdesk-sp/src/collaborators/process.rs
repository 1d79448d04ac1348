//! Child process invocation shared by the command-backed collaborators

use super::ModelError;
use std::ffi::OsStr;
use std::process::Stdio;
use stemdesk_common::config::ModelCommand;
use tokio::process::Command;
use tracing::debug;

/// Run `<program> <args..> <extra..>` and return its stdout
///
/// The child is killed if the returned future is dropped, so callers can bound it with
/// `tokio::time::timeout`.
pub(crate) async fn run_model<I, S>(
    command: &ModelCommand,
    extra_args: I,
    env: Option<(&str, &str)>,
) -> Result<String, ModelError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = command.program.display().to_string();

    let mut child = Command::new(&command.program);
    child
        .args(&command.args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some((key, value)) = env {
        child.env(key, value);
    }

    debug!(program = %program, "Running model program");

    let output = match child.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ModelError::ProgramNotFound(program));
        }
        Err(e) => return Err(ModelError::Execution(format!("{}: {}", program, e))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ModelError::Execution(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| ModelError::Parse(format!("{} printed non-UTF-8 output: {}", program, e)))
}
