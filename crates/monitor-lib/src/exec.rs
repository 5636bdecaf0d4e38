//! External tool invocation
//!
//! All runtime and telemetry data enters through short-lived child
//! processes. This helper runs one and hands back stdout, folding a
//! non-zero exit or undecodable output into a plain error string that the
//! caller wraps in its own `MonitorError` variant.

use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Upper bound on any single tool invocation; a wedged child must not
/// stall the cycle loop indefinitely
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `program` with `args` and return its stdout as UTF-8 text
pub(crate) async fn command_stdout(program: &str, args: &[&str]) -> Result<String, String> {
    debug!(program, ?args, "invoking external tool");

    let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new(program).args(args).output())
        .await
        .map_err(|_| format!("{program} timed out after {}s", COMMAND_TIMEOUT.as_secs()))?
        .map_err(|e| format!("failed to spawn {program}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8(output.stdout).map_err(|e| format!("{program} produced non-UTF-8 output: {e}"))
}
