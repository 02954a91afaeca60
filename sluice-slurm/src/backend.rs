//! Slurm backend adapter
//!
//! Implements the [`Backend`] lifecycle operations by building Slurm CLI
//! commands, spawning them, and feeding the captured output through the
//! parser.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sluice_core::{
    Backend, BackendError, ExitCode, JobHandle, JobId, JobStatus, Result,
};

use crate::command::{
    self, CommandWrapper, IdentityWrapper, PassthroughResolver, ScriptResolver,
};
use crate::config::SlurmConfig;
use crate::parse;
use crate::process::run_command;

/// Columns requested from the accounting query for one job
const STATUS_COLUMNS: &str = "Job,State,ExitCode";

/// Backend adapter for the Slurm batch scheduler
///
/// One instance serves any number of job handles; it holds configuration
/// and the two command hooks, nothing per-job.
pub struct SlurmBackend {
    config: SlurmConfig,
    resolver: Arc<dyn ScriptResolver>,
    wrapper: Arc<dyn CommandWrapper>,
}

impl SlurmBackend {
    /// Creates a backend with passthrough script resolution and no
    /// command wrapping
    pub fn new(config: SlurmConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(PassthroughResolver),
            wrapper: Arc::new(IdentityWrapper),
        }
    }

    /// Replaces the run-script resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn ScriptResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the command wrapper
    pub fn with_wrapper(mut self, wrapper: Arc<dyn CommandWrapper>) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// The backend configuration
    pub fn config(&self) -> &SlurmConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for SlurmBackend {
    async fn submit(&self, handle: &mut JobHandle) -> Result<JobId> {
        if handle.is_submitted() {
            return Err(BackendError::configuration(format!(
                "job already submitted with identifier {}",
                handle.job_id().unwrap_or_default()
            )));
        }

        let argv = command::build_submit_command(
            &self.config,
            handle.spec(),
            self.resolver.as_ref(),
            self.wrapper.as_ref(),
        )?;
        let (stdout, _stderr) = run_command(&argv).await?;

        let job_id = parse::parse_submission_output(&stdout)?;
        handle.assign_job_id(job_id)?;
        info!(job_id, name = ?handle.spec().name, "job submitted");

        Ok(job_id)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<()> {
        let job_id = handle.require_job_id()?;

        let argv = command::build_cancel_command(&self.config, job_id, self.wrapper.as_ref())?;
        debug!(job_id, "cancelling job");

        // Fire and forget: a nonzero scancel exit is not acted upon, but a
        // command that cannot even be spawned still surfaces.
        match run_command(&argv).await {
            Ok(_) => Ok(()),
            Err(BackendError::Process { status, stderr, .. }) => {
                warn!(job_id, ?status, "scancel exited nonzero: {}", stderr.trim());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn status(&self, handle: &mut JobHandle) -> Result<JobStatus> {
        let job_id = handle.require_job_id()?;

        let spec = handle.spec();
        let argv = command::build_query_command(
            &self.config,
            STATUS_COLUMNS,
            spec.partition.as_deref(),
            spec.clusters.as_deref(),
            Some(job_id),
            None,
            self.wrapper.as_ref(),
        )?;
        let (stdout, _stderr) = run_command(&argv).await?;

        let records = parse::parse_status_table(&stdout)?;
        // Step rows share the parent identifier and are noise; of the
        // surviving rows the last one wins.
        let last = records.iter().filter(|r| !r.is_step_row()).next_back();

        match last {
            // Not visible yet, or still in the running set: the handle's
            // current status stands. A handle that already reached
            // `Finished` stays there — terminal states never regress.
            None => Ok(handle.status()),
            Some(row) if parse::is_running_state(&row.state) => Ok(handle.status()),
            Some(row) => {
                debug!(job_id, state = %row.state, exitcode = %row.exitcode, "job finished");
                handle.record_finished(ExitCode::from(row.exitcode.as_str()));
                Ok(JobStatus::Finished)
            }
        }
    }

    async fn exitcode(&self, handle: &mut JobHandle) -> Result<Option<ExitCode>> {
        if handle.exitcode().is_none() {
            self.status(handle).await?;
        }
        Ok(handle.exitcode().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::JobSpec;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// Writes an executable stand-in script and returns its (closed) path
    fn stub_script(body: &str) -> tempfile::TempPath {
        let mut f = tempfile::Builder::new()
            .suffix(".sh")
            .tempfile()
            .expect("create temp file");
        writeln!(f, "#!/bin/sh").expect("write shebang");
        writeln!(f, "{body}").expect("write body");
        f.flush().expect("flush");
        let mut perms = f.as_file().metadata().expect("metadata").permissions();
        perms.set_mode(0o755);
        f.as_file().set_permissions(perms).expect("chmod");
        // Close the write handle so the script can be executed
        f.into_temp_path()
    }

    fn backend_with_sbatch(stub: &tempfile::TempPath) -> SlurmBackend {
        let mut config = SlurmConfig::default();
        config.sbatch_bin = stub.to_str().expect("path").to_string();
        SlurmBackend::new(config)
    }

    fn backend_with_sacct(stub: &tempfile::TempPath) -> SlurmBackend {
        let mut config = SlurmConfig::default();
        config.sacct_bin = stub.to_str().expect("path").to_string();
        SlurmBackend::new(config)
    }

    fn submitted_handle(job_id: JobId) -> JobHandle {
        let mut handle = JobHandle::new(JobSpec::new().with_run_script("run.sh"));
        handle.assign_job_id(job_id).expect("assign");
        handle
    }

    #[tokio::test]
    async fn test_submit_parses_job_id() {
        let stub = stub_script("echo 'Submitted batch job 4242'");
        let backend = backend_with_sbatch(&stub);

        let mut handle = JobHandle::new(JobSpec::new().with_run_script("run.sh"));
        let job_id = backend.submit(&mut handle).await.expect("submit");

        assert_eq!(job_id, 4242);
        assert_eq!(handle.job_id(), Some(4242));
        assert_eq!(handle.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_submit_nonzero_exit_is_process_error() {
        let stub = stub_script("echo 'sbatch: error: invalid partition' >&2\nexit 1");
        let backend = backend_with_sbatch(&stub);

        let mut handle = JobHandle::new(JobSpec::new().with_run_script("run.sh"));
        let err = backend.submit(&mut handle).await.unwrap_err();

        assert!(err.is_process());
        match err {
            BackendError::Process { status, stderr, .. } => {
                assert_eq!(status, Some(1));
                assert!(stderr.contains("invalid partition"));
            }
            other => panic!("expected process error, got {other:?}"),
        }
        assert!(!handle.is_submitted());
    }

    #[tokio::test]
    async fn test_submit_unexpected_output_is_parse_error() {
        let stub = stub_script("echo 'something unexpected'");
        let backend = backend_with_sbatch(&stub);

        let mut handle = JobHandle::new(JobSpec::new().with_run_script("run.sh"));
        let err = backend.submit(&mut handle).await.unwrap_err();

        assert!(err.is_parse());
        assert!(!err.is_process());
    }

    #[tokio::test]
    async fn test_submit_twice_is_contract_violation() {
        let stub = stub_script("echo 'Submitted batch job 1'");
        let backend = backend_with_sbatch(&stub);

        let mut handle = submitted_handle(99);
        let err = backend.submit(&mut handle).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_cancel_without_job_id_is_contract_violation() {
        let backend = SlurmBackend::new(SlurmConfig::default());
        let handle = JobHandle::new(JobSpec::new());

        let err = backend.cancel(&handle).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_cancel_ignores_nonzero_exit() {
        let stub = stub_script("exit 1");
        let mut config = SlurmConfig::default();
        config.scancel_bin = stub.to_str().expect("path").to_string();
        let backend = SlurmBackend::new(config);

        let handle = submitted_handle(4242);
        backend.cancel(&handle).await.expect("fire and forget");
        // status untouched
        assert_eq!(handle.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_status_running_with_step_rows() {
        let stub = stub_script(
            "echo 'Job|State|ExitCode'\necho '4242|RUNNING|'\necho '4242.batch|RUNNING|'",
        );
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(4242);
        let status = backend.status(&mut handle).await.expect("status");

        assert_eq!(status, JobStatus::Running);
        assert!(handle.exitcode().is_none());
    }

    #[tokio::test]
    async fn test_status_finished_stores_exit_code() {
        let stub = stub_script("echo 'Job|State|ExitCode'\necho '4242|COMPLETED|0:0'");
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(4242);
        let status = backend.status(&mut handle).await.expect("status");

        assert_eq!(status, JobStatus::Finished);
        assert_eq!(handle.exitcode().unwrap().as_str(), "0:0");
        assert!(
            handle
                .exitcode()
                .unwrap()
                .is_success(&backend.config().success_code)
        );
    }

    #[tokio::test]
    async fn test_status_no_rows_reports_running() {
        // Job submitted but not yet visible in accounting
        let stub = stub_script("echo 'Job|State|ExitCode'");
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(4242);
        let status = backend.status(&mut handle).await.expect("status");

        assert_eq!(status, JobStatus::Running);
        assert!(handle.exitcode().is_none());
    }

    #[tokio::test]
    async fn test_status_idempotent_on_finished_job() {
        let stub = stub_script("echo 'Job|State|ExitCode'\necho '4242|FAILED|1:0'");
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(4242);
        let first = backend.status(&mut handle).await.expect("status");
        let second = backend.status(&mut handle).await.expect("status");

        assert_eq!(first, JobStatus::Finished);
        assert_eq!(second, JobStatus::Finished);
        assert_eq!(handle.exitcode().unwrap().as_str(), "1:0");
    }

    #[tokio::test]
    async fn test_status_query_failure_is_not_a_status() {
        let stub = stub_script("echo 'sacct: error' >&2\nexit 1");
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(4242);
        let err = backend.status(&mut handle).await.unwrap_err();

        assert!(err.is_process());
        assert_eq!(handle.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_exitcode_triggers_exactly_one_status_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        let count_file = dir.path().join("queries");
        let stub = stub_script(&format!(
            "echo q >> {}\necho 'Job|State|ExitCode'\necho '7|COMPLETED|0:0'",
            count_file.display()
        ));
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(7);
        let code = backend.exitcode(&mut handle).await.expect("exitcode");
        assert_eq!(code.unwrap().as_str(), "0:0");

        let queries = std::fs::read_to_string(&count_file).expect("count file");
        assert_eq!(queries.lines().count(), 1);

        // A second call returns the stored value without a fresh query
        let code = backend.exitcode(&mut handle).await.expect("exitcode");
        assert_eq!(code.unwrap().as_str(), "0:0");
        let queries = std::fs::read_to_string(&count_file).expect("count file");
        assert_eq!(queries.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_exitcode_unset_while_running() {
        let stub = stub_script("echo 'Job|State|ExitCode'\necho '7|PENDING|'");
        let backend = backend_with_sacct(&stub);

        let mut handle = submitted_handle(7);
        let code = backend.exitcode(&mut handle).await.expect("exitcode");
        assert!(code.is_none());
    }
}
