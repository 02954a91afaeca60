//! The backend seam
//!
//! Each batch system (Slurm, and by extension any other scheduler) provides
//! one implementation of [`Backend`]. The trait is object-safe so callers
//! can hold an `Arc<dyn Backend>` and stay scheduler-agnostic.

use async_trait::async_trait;

use crate::error::Result;
use crate::job::{ExitCode, JobHandle, JobId, JobStatus};

/// Lifecycle operations against one external batch-scheduling system
///
/// All operations are single-shot, blocking invocations of the scheduler's
/// CLI: no internal retries, no internal timeouts. Calls for different
/// handles may run concurrently; access to one handle is serialized by the
/// `&mut` receivers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submits the job and records the scheduler-assigned identifier on
    /// the handle
    ///
    /// Spawns exactly one external process. A nonzero exit propagates as a
    /// process error carrying the captured output; output that does not
    /// match the scheduler's submission template is a parse error, so
    /// callers can tell "scheduler rejected the job" apart from
    /// "scheduler behaved unexpectedly".
    async fn submit(&self, handle: &mut JobHandle) -> Result<JobId>;

    /// Issues a fire-and-forget cancellation for the submitted job
    ///
    /// Does not wait for or verify the cancellation and does not touch the
    /// handle's status. Cancelling an unsubmitted handle is a contract
    /// violation, not a silent no-op.
    async fn cancel(&self, handle: &JobHandle) -> Result<()>;

    /// Queries the scheduler for the job's current status
    ///
    /// Each call issues a fresh external query; callers needing batched
    /// efficiency over many jobs should use the backend's listener
    /// instead. On a terminal state the exit-code token is stored on the
    /// handle. A process failure propagates as an error and is never
    /// interpreted as "job finished".
    async fn status(&self, handle: &mut JobHandle) -> Result<JobStatus>;

    /// Returns the stored exit-code token
    ///
    /// If none has been observed yet, performs exactly one [`status`]
    /// call first, then returns whatever is stored — possibly still
    /// `None` if the job has not finished.
    ///
    /// [`status`]: Backend::status
    async fn exitcode(&self, handle: &mut JobHandle) -> Result<Option<ExitCode>>;
}
