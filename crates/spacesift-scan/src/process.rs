//! Running external tools under a wall-clock limit.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use spacesift_core::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a successful tool run.
#[derive(Debug, Default)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion, killing it once `timeout` has elapsed.
///
/// Both pipes are drained on helper threads so a chatty tool can never
/// block on a full pipe while we wait for it.
pub(crate) fn run_with_timeout(
    tool: &'static str,
    mut command: Command,
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                reap(&mut child);
                return Err(ToolError::Timeout { tool, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                reap(&mut child);
                return Err(ToolError::Spawn { tool, source });
            }
        }
    };

    let output = ToolOutput {
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    };

    if !status.success() {
        return Err(ToolError::Failed {
            tool,
            status: status.to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

/// Kill `child` and wait for it so it does not linger as a zombie.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
