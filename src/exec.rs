use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, trace};

use crate::error::DiscoveryError;

/// Run one external command to completion and return everything it wrote to
/// stdout as text.
///
/// - `input`, when given, is fed to the child's stdin while its output is
///   drained, then the pipe is closed, so line-oriented filters see the
///   same bytes they would in a shell pipeline at any input size. A child
///   that exits without reading all of it is not an error.
/// - Stdout is accumulated in full, however many chunks the pipe delivers;
///   a partial listing is never returned.
/// - The child is spawned with `kill_on_drop`, so abandoning this future
///   (cancellation, timeout expiry) also reaps the process.
///
/// A nonzero exit maps to [`DiscoveryError::CommandFailed`], an absent
/// executable to [`DiscoveryError::ToolUnavailable`], any other launch or
/// pipe problem to [`DiscoveryError::Spawn`], and exceeding `limit` to
/// [`DiscoveryError::TimedOut`].
pub async fn run_capture(
    command: &str,
    args: &[String],
    input: Option<&str>,
    limit: Duration,
) -> Result<String, DiscoveryError> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DiscoveryError::ToolUnavailable {
                command: command.to_string(),
            }
        } else {
            DiscoveryError::Spawn {
                command: command.to_string(),
                source: e,
            }
        }
    })?;

    // Feed stdin and drain stdout together under one limit. Writing the
    // whole input before reading anything back would stall once both
    // pipes fill up.
    let stdin = child.stdin.take();
    let run = async move {
        let feed = async move {
            let (Some(mut stdin), Some(text)) = (stdin, input) else {
                return Ok(());
            };
            let written = stdin.write_all(text.as_bytes()).await;
            // The handle drops on return, closing the pipe so the child
            // sees EOF. A child that exits without consuming all of its
            // input still gets its output returned.
            match written {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        output
    };

    let output = match time::timeout(limit, run).await {
        Ok(res) => res.map_err(|e| DiscoveryError::Spawn {
            command: command.to_string(),
            source: e,
        })?,
        Err(_) => {
            return Err(DiscoveryError::TimedOut {
                command: command.to_string(),
                limit,
            })
        }
    };

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(command, code, stderr = %stderr.trim(), "external stage failed");
        return Err(DiscoveryError::CommandFailed {
            command: command.to_string(),
            args: args.to_vec(),
            code,
        });
    }

    trace!(command, bytes = output.stdout.len(), "external stage completed");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
