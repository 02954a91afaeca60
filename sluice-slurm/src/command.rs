//! Submission and query command construction
//!
//! Commands are assembled as a single string in a fixed flag order, passed
//! through the caller's [`CommandWrapper`] hook, and only then split into
//! argv tokens with shell-word semantics (quotes and escapes honored, no
//! variable expansion). The resulting token vector is handed to the process
//! spawner directly; no secondary shell is involved.

use std::path::Path;

use sluice_core::{BackendError, JobId, JobSpec, Result};

use crate::config::SlurmConfig;

/// Resolves a run-script path into the exact script invocation token
///
/// This is where a deployment injects preambles or makes the script
/// executable — e.g. resolving `run.sh` into `bash run.sh` or into a
/// staged copy of the script.
pub trait ScriptResolver: Send + Sync {
    /// Returns the invocation token for the given run script
    fn resolve(&self, run_script: &Path) -> String;
}

/// Uses the script path itself as the invocation token
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl ScriptResolver for PassthroughResolver {
    fn resolve(&self, run_script: &Path) -> String {
        run_script.display().to_string()
    }
}

/// Hook applied to each fully assembled command string before it is split
/// into argv tokens
///
/// Deployments use this to run every scheduler command through an outer
/// tool (a container runtime, an SSH hop). The default leaves the command
/// untouched.
pub trait CommandWrapper: Send + Sync {
    /// Returns the (possibly rewritten) command string
    fn wrap(&self, command: String) -> String;
}

/// Leaves the command unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityWrapper;

impl CommandWrapper for IdentityWrapper {
    fn wrap(&self, command: String) -> String {
        command
    }
}

/// Builds the argv tokens for submitting `spec`
///
/// Each set field contributes exactly one flag, in fixed order: name, log,
/// partition, excluded nodes, clusters, QoS, memory, time, export, then
/// the resolved run script, then the run arguments. Absent fields
/// contribute nothing.
pub fn build_submit_command(
    config: &SlurmConfig,
    spec: &JobSpec,
    resolver: &dyn ScriptResolver,
    wrapper: &dyn CommandWrapper,
) -> Result<Vec<String>> {
    let run_script = spec.run_script.as_deref().ok_or_else(|| {
        BackendError::configuration("job specification has no run script")
    })?;

    let mut command = format!("{} ", config.sbatch_bin);
    if let Some(name) = &spec.name {
        command.push_str(&format!("-J {name} "));
    }
    if let Some(log) = &spec.log {
        command.push_str(&format!("-o {} ", log.display()));
    }
    if let Some(partition) = &spec.partition {
        command.push_str(&format!("-p {partition} "));
    }
    if let Some(exclude) = &spec.exclude {
        command.push_str(&format!("-x {exclude} "));
    }
    if let Some(clusters) = &spec.clusters {
        command.push_str(&format!("-M {clusters} "));
    }
    if let Some(qos) = &spec.qos {
        command.push_str(&format!("--qos={qos} "));
    }
    if let Some(mem) = &spec.mem {
        command.push_str(&format!("--mem={mem} "));
    }
    if let Some(time) = &spec.time {
        command.push_str(&format!("--time={time} "));
    }
    if let Some(export) = &spec.export {
        command.push_str(&format!("--export={export} "));
    }
    command.push_str(&resolver.resolve(run_script));
    if let Some(args) = &spec.run_args {
        command.push(' ');
        command.push_str(&args.render());
    }

    split_command(wrapper.wrap(command.trim_end().to_string()))
}

/// Builds the argv tokens for cancelling `job_id`
pub fn build_cancel_command(
    config: &SlurmConfig,
    job_id: JobId,
    wrapper: &dyn CommandWrapper,
) -> Result<Vec<String>> {
    split_command(wrapper.wrap(format!("{} {job_id}", config.scancel_bin)))
}

/// Builds the argv tokens for an accounting query
///
/// The query can be scoped by partition, clusters, a single job identifier
/// and/or a user; the per-job status path passes the job identifier, the
/// batched listener passes the user. Output is requested pipe-delimited
/// (`-P`) with the given column list.
pub fn build_query_command(
    config: &SlurmConfig,
    columns: &str,
    partition: Option<&str>,
    clusters: Option<&str>,
    job_id: Option<JobId>,
    user: Option<&str>,
    wrapper: &dyn CommandWrapper,
) -> Result<Vec<String>> {
    let mut command = format!("{} ", config.sacct_bin);
    if let Some(partition) = partition {
        command.push_str(&format!("-r {partition} "));
    }
    if let Some(clusters) = clusters {
        command.push_str(&format!("-M {clusters} "));
    }
    if let Some(job_id) = job_id {
        command.push_str(&format!("-j {job_id} "));
    }
    if let Some(user) = user {
        command.push_str(&format!("-u {user} "));
    }
    command.push_str(&format!("-P -o {columns}"));

    split_command(wrapper.wrap(command))
}

/// Splits an assembled command string into argv tokens
///
/// Shell-word semantics: quotes and escapes are honored, nothing is
/// expanded. An unterminated quote means the caller handed us a malformed
/// field, which is a configuration error rather than a parse error — no
/// scheduler output is involved yet.
fn split_command(command: String) -> Result<Vec<String>> {
    match shlex::split(&command) {
        Some(tokens) if !tokens.is_empty() => Ok(tokens),
        _ => Err(BackendError::configuration(format!(
            "command cannot be split into tokens: {command:?}"
        ))),
    }
}
