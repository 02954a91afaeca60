//! Error types for scheduler backends

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur when driving a batch-scheduler backend
///
/// The variants are deliberately coarse: callers need to distinguish
/// "the job specification is wrong" (never retried), "the scheduler CLI
/// failed" and "the scheduler CLI produced output we could not understand"
/// (scheduler misbehavior vs. adapter bugs), not individual syscalls.
/// No automatic retries happen anywhere in this crate family; retry and
/// backoff policy belongs to the caller.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing or malformed job specification, or a caller contract
    /// violation (e.g. cancelling a job that was never submitted)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The scheduler CLI ran but exited nonzero
    #[error("scheduler command `{command}` failed (status {status:?}): {stderr}")]
    Process {
        /// The command line that was executed
        command: String,
        /// Exit status code, if the process exited normally
        status: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The scheduler CLI could not be spawned or its output not read
    #[error("failed to run scheduler command: {0}")]
    Io(#[from] std::io::Error),

    /// Scheduler output did not match the expected positional or tabular
    /// shape
    #[error("unexpected scheduler output ({context}): {output:?}")]
    Parse {
        /// What was being parsed when the mismatch was found
        context: String,
        /// The offending output, for diagnostics
        output: String,
    },

    /// A batched poll query failed inside the listener loop
    ///
    /// Wraps the underlying failure so the loop's owner can tell a dead
    /// poll loop apart from a failed per-job call.
    #[error("poll loop query failed: {0}")]
    PollLoop(#[source] Box<BackendError>),
}

impl BackendError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a parse error from a context description and the raw output
    pub fn parse(context: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            output: output.into(),
        }
    }

    /// Wrap an error that occurred inside the listener's poll loop
    pub fn poll_loop(source: BackendError) -> Self {
        Self::PollLoop(Box::new(source))
    }

    /// Check if this error is a caller contract violation
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this error came from the external process (spawn failure
    /// or nonzero exit)
    pub fn is_process(&self) -> bool {
        matches!(self, Self::Process { .. } | Self::Io(_))
    }

    /// Check if this error is an output-shape mismatch
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check if this error was surfaced by the listener's poll loop
    pub fn is_poll_loop(&self) -> bool {
        matches!(self, Self::PollLoop(_))
    }
}
