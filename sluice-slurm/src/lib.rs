//! Slurm backend for Sluice
//!
//! Submits jobs to the Slurm batch scheduler, tracks their lifecycle, and
//! reports terminal outcomes, shielding callers from the `sbatch` /
//! `scancel` / `sacct` command-line surface and its text output.
//!
//! Two polling styles are offered:
//! - per-job [`Backend::status`] calls (one external query per call), and
//! - the batched [`SlurmListener`], which queries the scheduler once per
//!   interval for a whole user/partition scope and publishes finished jobs
//!   to a results channel.
//!
//! # Example
//!
//! ```no_run
//! use sluice_core::{Backend, JobHandle, JobSpec, RunArgs};
//! use sluice_slurm::{SlurmBackend, SlurmConfig};
//!
//! #[tokio::main]
//! async fn main() -> sluice_core::Result<()> {
//!     let backend = SlurmBackend::new(SlurmConfig::default());
//!
//!     let spec = JobSpec::new()
//!         .with_name("fit")
//!         .with_partition("short")
//!         .with_run_script("run.sh")
//!         .with_run_args(RunArgs::List(vec!["--seed".into(), "7".into()]));
//!
//!     let mut handle = JobHandle::new(spec);
//!     let job_id = backend.submit(&mut handle).await?;
//!     println!("submitted job {job_id}");
//!
//!     let status = backend.status(&mut handle).await?;
//!     println!("job {job_id} is {status:?}");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod listener;
pub mod parse;
mod process;

// Re-export commonly used types
pub use backend::SlurmBackend;
pub use command::{CommandWrapper, IdentityWrapper, PassthroughResolver, ScriptResolver};
pub use config::SlurmConfig;
pub use listener::{FinishedJob, ListenerHandle, ListenerScope, PollBatch, SlurmListener};
pub use sluice_core::{Backend, BackendError, Result};
