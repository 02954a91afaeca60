//! Shared subprocess execution
//!
//! Every scheduler interaction (submit, cancel, per-job query, batched
//! query) funnels through [`run_command`]: spawn the argv tokens as a
//! child process, wait, capture both streams.

use tokio::process::Command;
use tracing::debug;

use sluice_core::{BackendError, Result};

/// Runs one scheduler command to completion, capturing its output
///
/// Returns `(stdout, stderr)` on a zero exit. A nonzero exit becomes a
/// `Process` error carrying the command line and both captured streams; a
/// spawn or read failure becomes an `Io` error. No retries and no timeout
/// at this layer.
pub(crate) async fn run_command(argv: &[String]) -> Result<(String, String)> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| BackendError::configuration("empty command"))?;

    debug!(command = ?argv, "running scheduler command");

    let output = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !stdout.trim().is_empty() {
        debug!("command stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("command stderr: {}", stderr.trim());
    }

    if !output.status.success() {
        return Err(BackendError::Process {
            command: argv.join(" "),
            status: output.status.code(),
            stdout,
            stderr,
        });
    }

    Ok((stdout, stderr))
}
