//! The chain loop.
//!
//! Without a chain name, one run is made against the given input and output
//! directories. With a chain name, runs are made until one is not
//! continuable; each continuable run is committed to the chain state and its
//! output directory becomes the next run's input. There is no run limit.
//! An operator interrupt that arrives between runs ends the chain before the
//! next run starts.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::state::ChainStateStore;
use crate::errors::PreconditionError;
use crate::layout::{RunDirectories, prepare_output_directory};

/// Executes one run and reports whether it is continuable.
///
/// Implementations must not fail: infrastructure errors of a single run are
/// reported as "not continuable".
#[async_trait]
pub trait RunExecutor: Send {
    async fn execute(&mut self, dirs: &RunDirectories) -> bool;

    /// Consume interrupts received while no run was active. `true` if there
    /// was at least one.
    fn take_interrupt(&mut self) -> bool {
        false
    }
}

pub struct ChainDriver<E: RunExecutor> {
    executor: E,
    chain_name: Option<String>,
    /// Input given on the command line; used when the chain has no predecessor.
    input: Option<PathBuf>,
    /// The run output directory, or the chain's output root when chaining.
    output: PathBuf,
    overwrite_output: bool,
}

impl<E: RunExecutor> ChainDriver<E> {
    pub fn new(executor: E, input: Option<PathBuf>, output: PathBuf) -> Self {
        Self {
            executor,
            chain_name: None,
            input,
            output,
            overwrite_output: false,
        }
    }

    pub fn with_chain(mut self, chain_name: Option<String>) -> Self {
        self.chain_name = chain_name;
        self
    }

    pub fn with_overwrite_output(mut self, overwrite: bool) -> Self {
        self.overwrite_output = overwrite;
        self
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Run once or run the chain. Returns whether the last run was continuable.
    ///
    /// Errors are precondition or chain state failures; they abort before the
    /// affected run starts. A run directory that cannot be created only ends
    /// the chain.
    pub async fn run(&mut self) -> Result<bool> {
        tracing::info!(chain = ?self.chain_name, "run.begin");
        let Some(chain_name) = self.chain_name.clone() else {
            let Some(output) = self.prepare_output(&self.output)? else {
                return Ok(false);
            };
            if self.cancelled(1) {
                return Ok(false);
            }
            let dirs = RunDirectories {
                input: self.input.clone(),
                output,
            };
            return Ok(self.executor.execute(&dirs).await);
        };

        let store = ChainStateStore::new(self.output.clone());
        let mut run = 0u64;
        loop {
            run += 1;
            let input = store.resolve_input(&chain_name)?.or_else(|| self.input.clone());
            let Some(output) = self.prepare_output(&store.resolve_output(&chain_name)?)? else {
                return Ok(false);
            };
            if self.cancelled(run) {
                return Ok(false);
            }
            let dirs = RunDirectories { input, output };
            tracing::info!(
                run,
                input = ?dirs.input,
                output = %dirs.output.display(),
                "run.chain"
            );

            if !self.executor.execute(&dirs).await {
                tracing::info!(run, "run.chain.complete");
                return Ok(false);
            }
            store.commit(&chain_name, &dirs.output)?;
        }
    }

    /// `Ok(None)` if the directory cannot be created or cleared; that is a
    /// failure of the run, not of the invocation.
    fn prepare_output(&self, path: &Path) -> Result<Option<PathBuf>> {
        match prepare_output_directory(path, self.overwrite_output) {
            Ok(dir) => Ok(Some(dir)),
            Err(PreconditionError::Io { path, source, .. }) => {
                tracing::error!(error = %source, output = %path.display(), "docker.run.fatal");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn cancelled(&mut self, run: u64) -> bool {
        let interrupted = self.executor.take_interrupt();
        if interrupted {
            tracing::info!(run, "run.chain.cancelled");
        }
        interrupted
    }
}
