//! Directory layout of a run and the filesystem preconditions checked
//! before anything is spawned.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ConfigError, PreconditionError};

/// Directory inside a run's output directory holding orchestrator log files.
pub const LOGS_DIRECTORY: &str = "logs";

/// Pass-through log of the container output, inside `LOGS_DIRECTORY`.
pub const LOG_FILE_NAME: &str = "scriptor.log";

/// Name of the script options file in an input directory.
pub const SCRIPT_OPTIONS_FILE_NAME: &str = "config.json";

/// Entries an output directory may already contain without counting as
/// non-empty: log output of this same tool from an earlier attempt.
pub const TOLERATED_OUTPUT_ENTRIES: &[&str] = &[LOGS_DIRECTORY];

/// Input and output directory of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectories {
    pub input: Option<PathBuf>,
    pub output: PathBuf,
}

impl RunDirectories {
    pub fn log_directory(&self) -> PathBuf {
        self.output.join(LOGS_DIRECTORY)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_directory().join(LOG_FILE_NAME)
    }
}

/// What `--input` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Directory(PathBuf),
    /// The contents of a `config.json`, given inline.
    Inline(String),
    /// Read the `config.json` from standard input.
    Stdin,
}

impl InputSource {
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            InputSource::Stdin
        } else if value.trim_start().starts_with('{') {
            InputSource::Inline(value.to_string())
        } else {
            InputSource::Directory(PathBuf::from(value))
        }
    }
}

/// A WARC input after checking what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarcInput {
    /// A directory of archives, mounted as a whole.
    Directory(PathBuf),
    /// A single archive file.
    File(PathBuf),
}

fn absolute(role: &'static str, path: &Path) -> Result<PathBuf, PreconditionError> {
    std::path::absolute(path).map_err(|source| PreconditionError::Io {
        role,
        path: path.to_path_buf(),
        source,
    })
}

/// Check that `path` is an existing directory and return it as an absolute path.
pub fn require_directory(role: &'static str, path: &Path) -> Result<PathBuf, PreconditionError> {
    if !path.exists() {
        return Err(PreconditionError::DirectoryMissing {
            role,
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(PreconditionError::NotADirectory {
            role,
            path: path.to_path_buf(),
        });
    }
    absolute(role, path)
}

/// Resolve `--input` into a directory.
///
/// Inline or stdin configuration is written as `config.json` into a fresh
/// temporary directory. `read_stdin` is only called for `InputSource::Stdin`.
pub fn resolve_input_directory<F>(
    source: Option<&InputSource>,
    read_stdin: F,
) -> Result<Option<PathBuf>>
where
    F: FnOnce() -> std::io::Result<String>,
{
    match source {
        None => Ok(None),
        Some(InputSource::Directory(path)) => Ok(Some(require_directory("input", path)?)),
        Some(InputSource::Inline(json)) => Ok(Some(make_temporary_input_directory(json)?)),
        Some(InputSource::Stdin) => {
            let json = read_stdin().context("Failed to read input configuration from stdin")?;
            Ok(Some(make_temporary_input_directory(&json)?))
        }
    }
}

fn make_temporary_input_directory(json: &str) -> Result<PathBuf> {
    let config: serde_json::Value =
        serde_json::from_str(json).map_err(ConfigError::InvalidInputJson)?;

    let dir = std::env::temp_dir().join(format!("scriptor-input-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create input directory {}", dir.display()))?;
    let file = dir.join(SCRIPT_OPTIONS_FILE_NAME);
    fs::write(&file, json).with_context(|| format!("Failed to write {}", file.display()))?;

    tracing::info!(directory = %dir.display(), config = %config, "input.temporary_directory");
    Ok(dir)
}

/// Check the WARC input and classify it as a directory or a single file.
pub fn classify_warc_input(path: &Path) -> Result<WarcInput, PreconditionError> {
    if !path.exists() {
        return Err(PreconditionError::WarcInputMissing {
            path: path.to_path_buf(),
        });
    }
    let resolved = absolute("WARC input", path)?;
    if resolved.is_dir() {
        Ok(WarcInput::Directory(resolved))
    } else {
        Ok(WarcInput::File(resolved))
    }
}

/// Make `path` ready to receive a run's output.
///
/// With `overwrite`, existing contents are removed first. Afterwards the
/// directory must exist and contain nothing but `TOLERATED_OUTPUT_ENTRIES`.
pub fn prepare_output_directory(path: &Path, overwrite: bool) -> Result<PathBuf, PreconditionError> {
    let io_err = |source: std::io::Error| PreconditionError::Io {
        role: "output",
        path: path.to_path_buf(),
        source,
    };

    if overwrite && path.is_dir() {
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let child = entry.path();
            let file_type = entry.file_type().map_err(io_err)?;
            if file_type.is_dir() {
                fs::remove_dir_all(&child).map_err(io_err)?;
            } else {
                fs::remove_file(&child).map_err(io_err)?;
            }
        }
    }

    fs::create_dir_all(path).map_err(io_err)?;
    if !path.is_dir() {
        return Err(PreconditionError::NotADirectory {
            role: "output",
            path: path.to_path_buf(),
        });
    }

    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        if !TOLERATED_OUTPUT_ENTRIES.iter().any(|t| name == **t) {
            return Err(PreconditionError::OutputNotEmpty {
                path: path.to_path_buf(),
            });
        }
    }

    absolute("output", path)
}
