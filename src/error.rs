use std::time::Duration;

use thiserror::Error;

/// Failures raised by the discovery pipeline.
///
/// Every kind aborts only the cycle it occurred in, except
/// [`DiscoveryError::ToolUnavailable`]: once the listing tool itself is
/// missing no later cycle can succeed, so the stream emits it and ends.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// An external stage ran but exited nonzero. `code` is `-1` when the
    /// child was killed by a signal instead of exiting.
    #[error("`{command}` exited with code {code}")]
    CommandFailed {
        command: String,
        args: Vec<String>,
        code: i32,
    },

    /// The command could not be launched or driven for a reason other than
    /// absence (permissions, resource limits, a broken stdin pipe).
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The listing tool does not exist on this host.
    #[error("`{command}` not found on this host")]
    ToolUnavailable { command: String },

    /// The command exceeded its execution bound and was killed.
    #[error("`{command}` did not finish within {limit:?}")]
    TimedOut { command: String, limit: Duration },
}

impl DiscoveryError {
    /// True when no subsequent discovery cycle can succeed either.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DiscoveryError::ToolUnavailable { .. })
    }

    /// The command this failure originated from.
    pub fn command(&self) -> &str {
        match self {
            DiscoveryError::CommandFailed { command, .. }
            | DiscoveryError::Spawn { command, .. }
            | DiscoveryError::ToolUnavailable { command }
            | DiscoveryError::TimedOut { command, .. } => command,
        }
    }
}
