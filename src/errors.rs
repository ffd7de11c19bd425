//! Typed error hierarchy for the Scriptor orchestrator.
//!
//! Four enums cover the four failure classes:
//! - `ConfigError`: invalid flag values, raised before anything is spawned
//! - `PreconditionError`: filesystem preconditions on the run directories
//! - `ChainStateError`: reading or writing the persisted chain state
//! - `RunError`: infrastructure failures of a single run (never escape the run)

use std::path::PathBuf;
use thiserror::Error;

/// Errors in the command line configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for --{flag}: '{value}'")]
    InvalidOption { flag: &'static str, value: String },

    #[error("Invalid --show-browser configuration '{value}': {source}")]
    InvalidShowBrowser {
        value: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid --input JSON: {0}")]
    InvalidInputJson(#[source] serde_json::Error),
}

/// Errors from checking the directories a run depends on.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("{role} directory '{path}' does not exist")]
    DirectoryMissing { role: &'static str, path: PathBuf },

    #[error("{role} directory '{path}' is not a directory")]
    NotADirectory { role: &'static str, path: PathBuf },

    #[error("WARC input '{path}' does not exist")]
    WarcInputMissing { path: PathBuf },

    #[error("output directory '{path}' is not empty")]
    OutputNotEmpty { path: PathBuf },

    #[error("Failed to prepare {role} directory '{path}': {source}")]
    Io {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the chain state file.
#[derive(Debug, Error)]
pub enum ChainStateError {
    #[error("Failed to read chain state file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chain state file at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write chain state file at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chain state file at {path} has no run ordinal left after {next_run}")]
    OrdinalOverflow { path: PathBuf, next_run: u32 },
}

/// Infrastructure failures while executing one run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file {path}: {source}")]
    LogOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write log file: {0}")]
    LogWriteFailed(#[source] std::io::Error),

    #[error("Failed to spawn container process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Container process has no captured stdout")]
    StdoutUnavailable,

    #[error("Failed to read container output: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Failed to wait for container process: {0}")]
    WaitFailed(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_flag_and_value() {
        let err = ConfigError::InvalidOption {
            flag: "replay",
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for --replay: 'x'");
    }

    #[test]
    fn precondition_error_carries_path() {
        let err = PreconditionError::OutputNotEmpty {
            path: PathBuf::from("/out/chain-2"),
        };
        match &err {
            PreconditionError::OutputNotEmpty { path } => {
                assert_eq!(path, &PathBuf::from("/out/chain-2"))
            }
            _ => panic!("Expected OutputNotEmpty"),
        }
        assert!(err.to_string().contains("/out/chain-2"));
    }

    #[test]
    fn run_error_spawn_failed_is_matchable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "docker not found");
        let err = RunError::SpawnFailed {
            command: "docker".into(),
            source: io_err,
        };
        match &err {
            RunError::SpawnFailed { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            _ => panic!("Expected SpawnFailed"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_std_error(&ConfigError::InvalidOption {
            flag: "unrandomize",
            value: "sometimes".into(),
        });
        assert_std_error(&PreconditionError::WarcInputMissing {
            path: PathBuf::from("/x.warc"),
        });
        assert_std_error(&RunError::StdoutUnavailable);
    }
}
