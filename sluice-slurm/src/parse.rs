//! Scheduler output parsing
//!
//! Turns the two text surfaces of the Slurm CLI into typed values: the
//! single-line submission acknowledgement and the pipe-delimited
//! accounting tables. Parse failures are kept distinct from process
//! failures so monitoring can tell scheduler misbehavior apart from
//! adapter bugs.

use sluice_core::{BackendError, JobId, Result, ScheduledJobRecord};

/// State tokens meaning "not yet finished"
///
/// Any state outside this set is treated as terminal.
pub const RUN_STATES: &[&str] = &["PENDING", "RUNNING"];

/// Whether a raw state token belongs to the running set
pub fn is_running_state(state: &str) -> bool {
    RUN_STATES.contains(&state.trim())
}

/// Parses the job identifier out of the submission acknowledgement
///
/// The scheduler answers in the fixed template `Submitted batch job <id>`;
/// the identifier is the 4th whitespace-separated token of the first line.
pub fn parse_submission_output(stdout: &str) -> Result<JobId> {
    let first_line = stdout.lines().next().unwrap_or("");
    let token = first_line.split_whitespace().nth(3).ok_or_else(|| {
        BackendError::parse("submission acknowledgement", stdout.to_string())
    })?;
    token
        .parse::<JobId>()
        .map_err(|_| BackendError::parse("submission job identifier", stdout.to_string()))
}

/// Parses a pipe-delimited accounting table into status records
///
/// The first line is the column header and is skipped; every following
/// non-empty line must have exactly the three requested columns
/// (identifier, state, exit code). Step rows are NOT filtered here —
/// callers drop them with [`ScheduledJobRecord::is_step_row`] so that the
/// filtering decision stays visible at the call site.
pub fn parse_status_table(output: &str) -> Result<Vec<ScheduledJobRecord>> {
    let mut records = Vec::new();
    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('|');
        let (Some(job_field), Some(state), Some(exitcode), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(BackendError::parse("status table row", line.to_string()));
        };
        records.push(ScheduledJobRecord {
            job_field: job_field.to_string(),
            state: state.to_string(),
            exitcode: exitcode.to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submission_output() {
        assert_eq!(
            parse_submission_output("Submitted batch job 4242\n").unwrap(),
            4242
        );
    }

    #[test]
    fn test_parse_submission_output_ignores_trailing_lines() {
        let out = "Submitted batch job 17\nsbatch: remote cluster note\n";
        assert_eq!(parse_submission_output(out).unwrap(), 17);
    }

    #[test]
    fn test_parse_submission_output_wrong_shape() {
        let err = parse_submission_output("sbatch: error: invalid partition\n").unwrap_err();
        assert!(err.is_parse());

        let err = parse_submission_output("Submitted batch job banana\n").unwrap_err();
        assert!(err.is_parse());

        let err = parse_submission_output("").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_status_table() {
        let out = "JobID|State|ExitCode\n4242|RUNNING|\n4242.batch|RUNNING|\n";
        let records = parse_status_table(out).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].job_field, "4242");
        assert_eq!(records[0].state, "RUNNING");
        assert_eq!(records[0].exitcode, "");
        assert!(records[1].is_step_row());
    }

    #[test]
    fn test_parse_status_table_header_only() {
        let records = parse_status_table("JobID|State|ExitCode\n").unwrap();
        assert!(records.is_empty());
        assert!(parse_status_table("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_status_table_malformed_row() {
        let err = parse_status_table("JobID|State|ExitCode\n4242|RUNNING\n").unwrap_err();
        assert!(err.is_parse());

        let err =
            parse_status_table("JobID|State|ExitCode\n4242|RUNNING||extra\n").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_state_with_qualifier_is_terminal() {
        // sacct reports e.g. "CANCELLED by 1000"; anything outside the
        // running set is terminal.
        assert!(!is_running_state("CANCELLED by 1000"));
        assert!(!is_running_state("COMPLETED"));
        assert!(!is_running_state("FAILED"));
        assert!(is_running_state("PENDING"));
        assert!(is_running_state("RUNNING"));
    }
}
