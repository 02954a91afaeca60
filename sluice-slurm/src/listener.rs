//! Batched status listener
//!
//! Amortizes status polling across many outstanding jobs: one accounting
//! query per interval for a whole user/partition/clusters scope, with the
//! jobs that left the running set published as a batch to an injected
//! results sink. Callers that track a single job can keep using
//! per-handle `status()` calls instead.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use sluice_core::{
    BackendError, ExitCode, JobId, JobStatus, Result, ScheduledJobRecord,
};

use crate::command::{self, CommandWrapper, IdentityWrapper};
use crate::config::SlurmConfig;
use crate::parse;
use crate::process::run_command;

/// Columns requested from the batched accounting query
const LISTEN_COLUMNS: &str = "JobID,State,ExitCode";

/// Which jobs a listener watches
///
/// Scope is passed in explicitly; the listener never reads ambient global
/// state. [`ListenerScope::for_current_user`] is the one convenience that
/// touches the environment, and only at the call site.
#[derive(Debug, Clone, Default)]
pub struct ListenerScope {
    /// Restrict the query to this user's jobs
    pub user: Option<String>,
    /// Restrict the query to one partition
    pub partition: Option<String>,
    /// Restrict the query to specific cluster(s)
    pub clusters: Option<String>,
}

impl ListenerScope {
    /// Creates an unrestricted scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes the query to a user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Scopes the query to a partition
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Scopes the query to cluster(s)
    pub fn with_clusters(mut self, clusters: impl Into<String>) -> Self {
        self.clusters = Some(clusters.into());
        self
    }

    /// Scope for the invoking user, read from `$USER`
    pub fn for_current_user() -> Result<Self> {
        let user = std::env::var("USER").map_err(|_| {
            BackendError::configuration("USER environment variable not set")
        })?;
        Ok(Self::new().with_user(user))
    }
}

/// One job observed to have left the running set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedJob {
    /// Scheduler-assigned identifier
    pub job_id: JobId,
    /// Always [`JobStatus::Finished`]; carried so consumers can feed the
    /// entry straight into their own job bookkeeping
    pub status: JobStatus,
    /// The job's exit-code token
    pub exitcode: ExitCode,
}

/// The batch published after each poll
///
/// An ordered mapping: identifiers are unique within a batch, ordered by
/// when each was first discovered during the poll's row scan. Jobs still
/// in the running set are absent — silence means "still running".
pub type PollBatch = Vec<FinishedJob>;

/// Background polling loop over a whole job scope
///
/// Publishes one [`PollBatch`] per interval to the injected sender, empty
/// batches included, so consumers can tell a quiet poll from a stalled
/// loop. The loop never terminates on its own and never retries: a query
/// failure ends [`run`] with a `PollLoop` error, surfaced to the owner
/// through the [`ListenerHandle`].
///
/// [`run`]: SlurmListener::run
pub struct SlurmListener {
    config: SlurmConfig,
    scope: ListenerScope,
    wrapper: Box<dyn CommandWrapper>,
    sender: mpsc::UnboundedSender<PollBatch>,
}

impl SlurmListener {
    /// Creates a listener publishing to `sender`
    pub fn new(
        config: SlurmConfig,
        scope: ListenerScope,
        sender: mpsc::UnboundedSender<PollBatch>,
    ) -> Self {
        Self {
            config,
            scope,
            wrapper: Box::new(IdentityWrapper),
            sender,
        }
    }

    /// Replaces the command wrapper
    pub fn with_wrapper(mut self, wrapper: Box<dyn CommandWrapper>) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// Spawns the polling loop on its own task
    pub fn spawn(self) -> ListenerHandle {
        let join = tokio::spawn(async move { self.run().await });
        ListenerHandle { join }
    }

    /// Runs the polling loop on the current task
    ///
    /// Queries immediately, then once per configured interval. Returns
    /// `Ok(())` only when the receiving side of the results sink is
    /// dropped; any query or parse failure returns a `PollLoop` error.
    pub async fn run(&self) -> Result<()> {
        let argv = command::build_query_command(
            &self.config,
            LISTEN_COLUMNS,
            self.scope.partition.as_deref(),
            self.scope.clusters.as_deref(),
            None,
            self.scope.user.as_deref(),
            self.wrapper.as_ref(),
        )?;

        info!(
            scope = ?self.scope,
            interval = ?self.config.poll_interval,
            "starting batched status listener"
        );

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            let batch = match self.poll_once(&argv).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("batched status query failed: {e}");
                    return Err(BackendError::poll_loop(e));
                }
            };

            debug!(finished = batch.len(), "publishing poll batch");
            if self.sender.send(batch).is_err() {
                info!("results receiver dropped; listener stopping");
                return Ok(());
            }
        }
    }

    /// Performs one query and reduces its rows to a batch
    async fn poll_once(&self, argv: &[String]) -> Result<PollBatch> {
        let (stdout, _stderr) = run_command(argv).await?;
        let records = parse::parse_status_table(&stdout)?;
        Self::batch_from_records(&records)
    }

    /// Reduces one poll's records to the published batch
    ///
    /// Rows are scanned once in output order; the record for an
    /// identifier is overwritten in place, so the last row wins
    /// deterministically if the scheduler ever emits conflicting
    /// duplicates. Batch order is the order identifiers were first seen.
    fn batch_from_records(records: &[ScheduledJobRecord]) -> Result<PollBatch> {
        let mut order: Vec<JobId> = Vec::new();
        let mut latest: HashMap<JobId, &ScheduledJobRecord> = HashMap::new();

        for record in records.iter().filter(|r| !r.is_step_row()) {
            let job_id = record.job_id()?;
            if !latest.contains_key(&job_id) {
                order.push(job_id);
            }
            latest.insert(job_id, record);
        }

        let mut batch = Vec::new();
        for job_id in order {
            let record = latest[&job_id];
            if parse::is_running_state(&record.state) {
                continue;
            }
            batch.push(FinishedJob {
                job_id,
                status: JobStatus::Finished,
                exitcode: ExitCode::from(record.exitcode.as_str()),
            });
        }
        Ok(batch)
    }
}

/// Owner-side handle for a spawned listener
pub struct ListenerHandle {
    join: JoinHandle<Result<()>>,
}

impl ListenerHandle {
    /// Stops the polling loop
    pub fn stop(&self) {
        self.join.abort();
    }

    /// Whether the loop has ended (stopped, receiver dropped, or failed)
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the loop to end and returns its outcome
    ///
    /// A loop ended by [`stop`] joins as `Ok(())`; a loop that died on a
    /// query failure joins with the `PollLoop` error.
    ///
    /// [`stop`]: ListenerHandle::stop
    pub async fn join(self) -> Result<()> {
        match self.join.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}
