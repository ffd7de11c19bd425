//! Durable chain progress.
//!
//! Each chain has a state file `<output root>/<chain name>.json` holding the
//! ordinal of the next run and the output directory of the last committed
//! run. Run `n` of chain `c` writes to `<output root>/c-n`.
//!
//! Only one orchestrator may operate on a chain name and output root at a
//! time: `resolve_output` and the later `commit` are separate reads and
//! writes with no lock between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::ChainStateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    /// Ordinal of the next run (1-based).
    pub next_run: u32,
    /// Output directory of the most recently committed run.
    #[serde(default)]
    pub last_output_directory: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl ChainState {
    fn initial() -> Self {
        Self {
            next_run: 1,
            last_output_directory: None,
            updated_at: Utc::now(),
        }
    }
}

pub struct ChainStateStore {
    output_root: PathBuf,
}

impl ChainStateStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn state_file(&self, chain_name: &str) -> PathBuf {
        self.output_root.join(format!("{}.json", chain_name))
    }

    /// Directory of run `ordinal` of `chain_name`.
    pub fn run_directory(&self, chain_name: &str, ordinal: u32) -> PathBuf {
        self.output_root.join(format!("{}-{}", chain_name, ordinal))
    }

    /// Read the persisted state; `None` if the chain has never committed a run.
    pub fn load(&self, chain_name: &str) -> Result<Option<ChainState>, ChainStateError> {
        let path = self.state_file(chain_name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| ChainStateError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let state = serde_json::from_str(&content)
            .map_err(|source| ChainStateError::Corrupt { path, source })?;
        Ok(Some(state))
    }

    /// Output directory of the last completed run, which is the input of the
    /// next one. `None` for a fresh chain.
    pub fn resolve_input(&self, chain_name: &str) -> Result<Option<PathBuf>, ChainStateError> {
        let Some(state) = self.load(chain_name)? else {
            return Ok(None);
        };
        if let Some(dir) = state.last_output_directory {
            return Ok(Some(dir));
        }
        Ok((state.next_run > 1).then(|| self.run_directory(chain_name, state.next_run - 1)))
    }

    /// Output directory of the next run. Does not create it and does not
    /// change any state, so repeated calls return the same directory.
    pub fn resolve_output(&self, chain_name: &str) -> Result<PathBuf, ChainStateError> {
        let next = self
            .load(chain_name)?
            .map(|state| state.next_run)
            .unwrap_or(1);
        Ok(self.run_directory(chain_name, next))
    }

    /// Record `completed_output` as finished and advance the ordinal.
    ///
    /// The file is replaced atomically: a crash before the rename leaves the
    /// previous state (the same run is retried), a crash after it never
    /// reuses the ordinal.
    pub fn commit(
        &self,
        chain_name: &str,
        completed_output: &Path,
    ) -> Result<ChainState, ChainStateError> {
        let path = self.state_file(chain_name);
        let previous = self.load(chain_name)?.unwrap_or_else(ChainState::initial);
        let next_run =
            previous
                .next_run
                .checked_add(1)
                .ok_or_else(|| ChainStateError::OrdinalOverflow {
                    path: path.clone(),
                    next_run: previous.next_run,
                })?;
        let state = ChainState {
            next_run,
            last_output_directory: Some(completed_output.to_path_buf()),
            updated_at: Utc::now(),
        };

        let bytes = serde_json::to_vec_pretty(&state).map_err(|e| ChainStateError::WriteFailed {
            path: path.clone(),
            source: e.into(),
        })?;
        atomic_write(&path, &bytes).map_err(|source| ChainStateError::WriteFailed {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            chain = chain_name,
            next_run = state.next_run,
            completed = %completed_output.display(),
            "chain.commit"
        );
        Ok(state)
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent()
        && let Ok(dir) = fs::File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}
