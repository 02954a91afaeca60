//! Slurm backend configuration
//!
//! Defines the configurable surface of the backend: which binaries to
//! invoke, what the success exit-code token looks like, and how often the
//! batched listener polls.

use std::time::Duration;

use sluice_core::{BackendError, Result};

/// Slurm backend configuration
///
/// The command names default to the standard Slurm CLI tools but are
/// configurable so deployments with wrapper scripts (or tests with
/// stand-in scripts) can redirect them.
#[derive(Debug, Clone)]
pub struct SlurmConfig {
    /// Submission command (default `sbatch`)
    pub sbatch_bin: String,

    /// Cancellation command (default `scancel`)
    pub scancel_bin: String,

    /// Accounting query command (default `sacct`)
    pub sacct_bin: String,

    /// Exit-code token that counts as success (default `0:0`)
    pub success_code: String,

    /// How often the batched listener queries the scheduler
    pub poll_interval: Duration,
}

impl SlurmConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            sbatch_bin: "sbatch".to_string(),
            scancel_bin: "scancel".to_string(),
            sacct_bin: "sacct".to_string(),
            success_code: "0:0".to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Creates a configuration from environment variables
    ///
    /// Recognized variables, all optional:
    /// - SLUICE_SBATCH
    /// - SLUICE_SCANCEL
    /// - SLUICE_SACCT
    /// - SLUICE_SUCCESS_CODE
    /// - SLUICE_POLL_INTERVAL (seconds)
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(bin) = std::env::var("SLUICE_SBATCH") {
            config.sbatch_bin = bin;
        }
        if let Ok(bin) = std::env::var("SLUICE_SCANCEL") {
            config.scancel_bin = bin;
        }
        if let Ok(bin) = std::env::var("SLUICE_SACCT") {
            config.sacct_bin = bin;
        }
        if let Ok(code) = std::env::var("SLUICE_SUCCESS_CODE") {
            config.success_code = code;
        }
        if let Some(secs) = std::env::var("SLUICE_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_secs(secs);
        }

        config
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sbatch_bin.is_empty() {
            return Err(BackendError::configuration("sbatch_bin cannot be empty"));
        }
        if self.scancel_bin.is_empty() {
            return Err(BackendError::configuration("scancel_bin cannot be empty"));
        }
        if self.sacct_bin.is_empty() {
            return Err(BackendError::configuration("sacct_bin cannot be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(BackendError::configuration(
                "poll_interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlurmConfig::default();
        assert_eq!(config.sbatch_bin, "sbatch");
        assert_eq!(config.scancel_bin, "scancel");
        assert_eq!(config.sacct_bin, "sacct");
        assert_eq!(config.success_code, "0:0");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SlurmConfig::default();
        assert!(config.validate().is_ok());

        config.sacct_bin = String::new();
        assert!(config.validate().unwrap_err().is_configuration());

        config.sacct_bin = "sacct".to_string();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().unwrap_err().is_configuration());
    }
}
