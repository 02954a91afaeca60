//! Job domain types
//!
//! These types are shared between callers (which own job handles) and
//! scheduler backends (which mutate them during submit/status calls).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Identifier assigned by the scheduler at submission time
pub type JobId = u64;

/// Specification of a batch job
///
/// All fields are optional; absent fields are omitted from the generated
/// submission command, never defaulted to a placeholder. The scheduler
/// option fields (`partition`, `exclude`, `clusters`, `qos`, `mem`, `time`,
/// `export`) are passed through verbatim — their meaning belongs to the
/// scheduler, not to this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name, shown in scheduler listings
    pub name: Option<String>,
    /// Path of the output log written by the scheduler
    pub log: Option<PathBuf>,
    /// Script executed on the worker node (required at submit time)
    pub run_script: Option<PathBuf>,
    /// Arguments passed to the run script
    pub run_args: Option<RunArgs>,
    /// Partition the job runs on
    pub partition: Option<String>,
    /// Worker node(s) to exclude
    pub exclude: Option<String>,
    /// Cluster(s) the job runs in
    pub clusters: Option<String>,
    /// Quality-of-service tag
    pub qos: Option<String>,
    /// Memory limit
    pub mem: Option<String>,
    /// Time limit
    pub time: Option<String>,
    /// Environment exports propagated to the job
    pub export: Option<String>,
}

impl JobSpec {
    /// Creates an empty specification
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the output log path
    pub fn with_log(mut self, log: impl Into<PathBuf>) -> Self {
        self.log = Some(log.into());
        self
    }

    /// Sets the run script
    pub fn with_run_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.run_script = Some(script.into());
        self
    }

    /// Sets the run arguments
    pub fn with_run_args(mut self, args: RunArgs) -> Self {
        self.run_args = Some(args);
        self
    }

    /// Sets the partition
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Sets the excluded node(s)
    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    /// Sets the cluster(s)
    pub fn with_clusters(mut self, clusters: impl Into<String>) -> Self {
        self.clusters = Some(clusters.into());
        self
    }

    /// Sets the quality-of-service tag
    pub fn with_qos(mut self, qos: impl Into<String>) -> Self {
        self.qos = Some(qos.into());
        self
    }

    /// Sets the memory limit
    pub fn with_mem(mut self, mem: impl Into<String>) -> Self {
        self.mem = Some(mem.into());
        self
    }

    /// Sets the time limit
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Sets the environment export list
    pub fn with_export(mut self, export: impl Into<String>) -> Self {
        self.export = Some(export.into());
        self
    }
}

/// Arguments passed to the run script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunArgs {
    /// A pre-joined argument string, appended verbatim. The caller is
    /// responsible for its internal quoting.
    Joined(String),
    /// Ordered tokens, space-joined before the final shell-word split.
    /// Tokens containing embedded whitespace are NOT individually escaped;
    /// use [`RunArgs::Joined`] with explicit quoting for those.
    List(Vec<String>),
}

impl RunArgs {
    /// Renders the arguments as the string appended to the submit command
    pub fn render(&self) -> String {
        match self {
            RunArgs::Joined(s) => s.clone(),
            RunArgs::List(tokens) => tokens.join(" "),
        }
    }
}

/// Job lifecycle status
///
/// `Finished` is terminal; a handle never transitions backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Finished,
}

/// Opaque exit-code token reported by the scheduler
///
/// The token has the form `<returncode>:<signal>` but is treated as a
/// pass-through value; the only interpretation offered is an equality
/// check against a configured success token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCode(String);

impl ExitCode {
    /// Wraps a raw exit-code token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares the token against a configured success token
    pub fn is_success(&self, expected: &str) -> bool {
        self.0 == expected
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExitCode {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// The caller-owned handle for one unit of work
///
/// A handle starts unsubmitted (no identifier). Submission assigns the
/// scheduler's identifier and the handle is `Running` until a terminal
/// state is observed, at which point it is `Finished` with an exit code.
/// The fields are private so the `unsubmitted → Running → Finished`
/// transition order and the "exit code iff finished" invariant cannot be
/// broken from outside.
///
/// Handles are not internally synchronized. `&mut self` receivers make the
/// caller serialize access by ownership; wrap the handle in a lock if
/// several tasks must poll the same job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    spec: JobSpec,
    job_id: Option<JobId>,
    status: JobStatus,
    exitcode: Option<ExitCode>,
}

impl JobHandle {
    /// Creates an unsubmitted handle for the given specification
    pub fn new(spec: JobSpec) -> Self {
        Self {
            spec,
            job_id: None,
            status: JobStatus::Running,
            exitcode: None,
        }
    }

    /// The job specification
    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// The scheduler-assigned identifier, if submitted
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    /// Whether the job has been submitted
    pub fn is_submitted(&self) -> bool {
        self.job_id.is_some()
    }

    /// Last known status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Last observed exit code; `Some` iff the job has finished
    pub fn exitcode(&self) -> Option<&ExitCode> {
        self.exitcode.as_ref()
    }

    /// The identifier, or a contract-violation error if unsubmitted
    pub fn require_job_id(&self) -> Result<JobId> {
        self.job_id.ok_or_else(|| {
            BackendError::configuration("job has no identifier; it was never submitted")
        })
    }

    /// Records the identifier returned by a successful submission
    ///
    /// Identifiers are unique per submission, so assigning twice is a
    /// contract violation.
    pub fn assign_job_id(&mut self, job_id: JobId) -> Result<()> {
        if let Some(existing) = self.job_id {
            return Err(BackendError::configuration(format!(
                "job already submitted with identifier {existing}"
            )));
        }
        self.job_id = Some(job_id);
        Ok(())
    }

    /// Records a terminal state with its exit-code token
    ///
    /// `Finished` is terminal: later observations may overwrite the token
    /// with the scheduler's (identical) value but never revert the status.
    pub fn record_finished(&mut self, exitcode: ExitCode) {
        self.status = JobStatus::Finished;
        self.exitcode = Some(exitcode);
    }
}

/// One parsed row of scheduler status output
///
/// Transient: consumed immediately to update a [`JobHandle`] or populate a
/// poll batch, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJobRecord {
    /// Raw identifier field; may carry a step suffix such as `.batch`
    pub job_field: String,
    /// Raw state token (e.g. `PENDING`, `COMPLETED`, `FAILED`)
    pub state: String,
    /// Raw exit-code token; empty while the job is running
    pub exitcode: String,
}

impl ScheduledJobRecord {
    /// Whether this row is an internal step record (batch or extern step)
    ///
    /// Step rows share the parent job's identifier and are filtering
    /// noise, not job states.
    pub fn is_step_row(&self) -> bool {
        self.job_field.contains(".batch") || self.job_field.contains(".extern")
    }

    /// Parses the identifier field as a job id
    pub fn job_id(&self) -> Result<JobId> {
        self.job_field.trim().parse::<JobId>().map_err(|_| {
            BackendError::parse("job identifier column", self.job_field.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = JobSpec::new()
            .with_name("fit")
            .with_partition("short")
            .with_mem("4G");
        assert_eq!(spec.name.as_deref(), Some("fit"));
        assert_eq!(spec.partition.as_deref(), Some("short"));
        assert_eq!(spec.mem.as_deref(), Some("4G"));
        assert!(spec.qos.is_none());
        assert!(spec.run_script.is_none());
    }

    #[test]
    fn test_run_args_render() {
        let joined = RunArgs::Joined("--seed 7 'a b'".to_string());
        assert_eq!(joined.render(), "--seed 7 'a b'");

        let list = RunArgs::List(vec!["--seed".into(), "7".into()]);
        assert_eq!(list.render(), "--seed 7");
    }

    #[test]
    fn test_handle_lifecycle() {
        let mut handle = JobHandle::new(JobSpec::new());
        assert!(!handle.is_submitted());
        assert!(handle.require_job_id().is_err());
        assert!(handle.exitcode().is_none());

        handle.assign_job_id(4242).unwrap();
        assert_eq!(handle.job_id(), Some(4242));
        assert_eq!(handle.status(), JobStatus::Running);

        // Double submission is a contract violation
        let err = handle.assign_job_id(4243).unwrap_err();
        assert!(err.is_configuration());

        handle.record_finished(ExitCode::from("0:0"));
        assert_eq!(handle.status(), JobStatus::Finished);
        assert_eq!(handle.exitcode().unwrap().as_str(), "0:0");
    }

    #[test]
    fn test_exit_code_success_check() {
        assert!(ExitCode::new("0:0").is_success("0:0"));
        assert!(!ExitCode::from("1:0").is_success("0:0"));
        assert_eq!(ExitCode::from("137:9").to_string(), "137:9");
    }

    #[test]
    fn test_step_row_detection() {
        let row = ScheduledJobRecord {
            job_field: "4242.batch".to_string(),
            state: "RUNNING".to_string(),
            exitcode: String::new(),
        };
        assert!(row.is_step_row());

        let row = ScheduledJobRecord {
            job_field: "4242.extern".to_string(),
            state: "COMPLETED".to_string(),
            exitcode: "0:0".to_string(),
        };
        assert!(row.is_step_row());

        let row = ScheduledJobRecord {
            job_field: "4242".to_string(),
            state: "RUNNING".to_string(),
            exitcode: String::new(),
        };
        assert!(!row.is_step_row());
        assert_eq!(row.job_id().unwrap(), 4242);
    }

    #[test]
    fn test_record_bad_identifier() {
        let row = ScheduledJobRecord {
            job_field: "not-a-number".to_string(),
            state: "FAILED".to_string(),
            exitcode: "1:0".to_string(),
        };
        assert!(row.job_id().unwrap_err().is_parse());
    }
}
