//! Process supervisor: runs the container for one run and watches it.
//!
//! One execution goes `Starting -> Running -> {Completed, TimedOut, Interrupted}`.
//! Output lines are copied byte for byte to our stdout and to
//! `logs/scriptor.log` in the run's output directory, and folded into the
//! run's `ContinuationSignal`. A timed-out child gets a termination request
//! first and is killed if it is still running after the grace period.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Stdout};
use tokio::process::{Child, Command};

use super::driver::RunExecutor;
use super::interrupts::Interrupts;
use crate::config::RunConfiguration;
use crate::container::ContainerArgsBuilder;
use crate::control::ContinuationSignal;
use crate::errors::RunError;
use crate::layout::{RunDirectories, WarcInput};
use crate::settings::DockerSettings;

/// Time a timed-out child gets between the termination request and the kill.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(10);

/// Why the supervisor ended a run itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    TimedOut,
    Interrupted,
}

/// How one run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` if the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub signal: ContinuationSignal,
    pub termination: Option<Termination>,
    pub duration: Duration,
}

impl RunOutcome {
    /// Whether the run's output may feed another run.
    ///
    /// A run that exited on its own needs a chainable record and exit code 0.
    /// A timed-out run keeps whatever record it emitted before the kill. An
    /// interrupted run never continues.
    pub fn is_continuable(&self) -> bool {
        match self.termination {
            Some(Termination::Interrupted) => false,
            Some(Termination::TimedOut) => self.signal.is_continuable(),
            None => self.signal.is_continuable() && self.exit_code == Some(0),
        }
    }
}

pub struct ProcessSupervisor {
    config: RunConfiguration,
    docker: DockerSettings,
    script_directory: Option<PathBuf>,
    warc_input: Option<WarcInput>,
    interrupts: Interrupts,
    echo_stdout: bool,
    termination_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(config: RunConfiguration, docker: DockerSettings, interrupts: Interrupts) -> Self {
        Self {
            config,
            docker,
            script_directory: None,
            warc_input: None,
            interrupts,
            echo_stdout: true,
            termination_grace: TERMINATION_GRACE,
        }
    }

    pub fn with_script_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.script_directory = dir;
        self
    }

    pub fn with_warc_input(mut self, warc: Option<WarcInput>) -> Self {
        self.warc_input = warc;
        self
    }

    /// Whether container output is copied to our stdout (default: yes).
    pub fn echo_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    pub fn args(&self, dirs: &RunDirectories) -> Vec<String> {
        ContainerArgsBuilder::new(&self.config, self.docker.image_ref())
            .script_directory(self.script_directory.clone())
            .warc_input(self.warc_input.clone())
            .build(dirs)
    }

    /// Run once, turning every infrastructure error into "not continuable".
    pub async fn run_safe(&mut self, dirs: &RunDirectories) -> bool {
        match self.execute(dirs).await {
            Ok(outcome) => outcome.is_continuable(),
            Err(e) => {
                tracing::error!(error = %e, output = %dirs.output.display(), "docker.run.fatal");
                false
            }
        }
    }

    /// Run the container once against `dirs` and wait for it to end.
    pub async fn execute(&mut self, dirs: &RunDirectories) -> Result<RunOutcome, RunError> {
        let log_dir = dirs.log_directory();
        std::fs::create_dir_all(&log_dir).map_err(|source| RunError::CreateDirFailed {
            path: log_dir.clone(),
            source,
        })?;
        let log_path = dirs.log_file();
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|source| RunError::LogOpenFailed {
                path: log_path.clone(),
                source,
            })?;
        let mut log = BufWriter::new(log_file);

        let args = self.args(dirs);
        tracing::info!(command = %self.docker.command, args = ?args, "docker.run");

        // Interrupts from before this run belong to no process.
        let stale = self.interrupts.drain();
        if stale > 0 {
            tracing::warn!(count = stale, "docker.run.stale_interrupts");
        }

        let start = Instant::now();
        let mut child = Command::new(&self.docker.command)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::SpawnFailed {
                command: self.docker.command.clone(),
                source,
            })?;
        tracing::debug!(pid = child.id().unwrap_or(0), "docker.run.spawned");

        let stdout = child.stdout.take().ok_or(RunError::StdoutUnavailable)?;
        let mut reader = BufReader::new(stdout);
        let mut line: Vec<u8> = Vec::new();
        let mut echo = self.echo_stdout.then(tokio::io::stdout);

        let mut signal = ContinuationSignal::default();
        let mut termination: Option<Termination> = None;
        let mut stdout_open = true;
        let mut force_killed = false;

        let timeout = self.config.timeout;
        let timer = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let mut timer_armed = timeout.is_some();

        let kill_timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(kill_timer);
        let mut kill_armed = false;

        // A killed child is reaped even if a descendant still holds stdout open.
        let status = loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut line), if stdout_open => {
                    match read {
                        Ok(0) => stdout_open = false,
                        Ok(_) => {
                            if !line.ends_with(b"\n") {
                                line.push(b'\n');
                            }
                            signal = signal.observe(&String::from_utf8_lossy(&line));
                            if !echo_line(&mut echo, &line).await {
                                echo = None;
                            }
                            if let Err(e) = log.write_all(&line).await {
                                break Err(RunError::LogWriteFailed(e));
                            }
                            line.clear();
                        }
                        Err(e) => break Err(RunError::ReadFailed(e)),
                    }
                }
                status = child.wait(), if !stdout_open || force_killed => {
                    break status.map_err(RunError::WaitFailed);
                }
                Some(()) = self.interrupts.recv() => {
                    if termination.is_none() && request_termination(&mut child) {
                        tracing::info!("docker.run.terminate");
                        termination = Some(Termination::Interrupted);
                    }
                }
                () = &mut timer, if timer_armed => {
                    timer_armed = false;
                    if termination.is_none() && request_termination(&mut child) {
                        tracing::info!(timeout_ms = timeout.map(|t| t.as_millis() as u64), "docker.timeout.kill");
                        termination = Some(Termination::TimedOut);
                    }
                    if child.id().is_some() {
                        kill_timer
                            .as_mut()
                            .reset(tokio::time::Instant::now() + self.termination_grace);
                        kill_armed = true;
                    }
                }
                () = &mut kill_timer, if kill_armed => {
                    kill_armed = false;
                    if child.id().is_some() {
                        tracing::warn!(
                            grace_ms = self.termination_grace.as_millis() as u64,
                            "docker.timeout.force_kill"
                        );
                        match child.start_kill() {
                            Ok(()) => force_killed = true,
                            Err(e) => tracing::warn!(error = %e, "docker.timeout.force_kill_failed"),
                        }
                    }
                }
            }
        };

        if let Some(out) = echo.as_mut()
            && let Err(e) = out.flush().await
        {
            tracing::warn!(error = %e, "docker.run.stdout_failed");
        }
        let flushed = log.flush().await.map_err(RunError::LogWriteFailed);
        drop(log);
        let status = status?;
        flushed?;

        let outcome = RunOutcome {
            exit_code: status.code(),
            signal,
            termination,
            duration: start.elapsed(),
        };
        tracing::info!(
            code = ?outcome.exit_code,
            chainable = outcome.signal.is_continuable(),
            termination = ?outcome.termination,
            duration_ms = outcome.duration.as_millis() as u64,
            "docker.run.exit"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl RunExecutor for ProcessSupervisor {
    async fn execute(&mut self, dirs: &RunDirectories) -> bool {
        self.run_safe(dirs).await
    }

    fn take_interrupt(&mut self) -> bool {
        self.interrupts.drain() > 0
    }
}

/// Copy one line to our stdout. Returns `false` once stdout is unusable;
/// the failure is logged here and echoing stops.
async fn echo_line(echo: &mut Option<Stdout>, line: &[u8]) -> bool {
    let Some(out) = echo.as_mut() else {
        return true;
    };
    match out.write_all(line).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "docker.run.stdout_failed");
            false
        }
    }
}

/// Ask a still-running child to terminate. Returns `false` if it has
/// already been reaped.
fn request_termination(child: &mut Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    #[cfg(unix)]
    {
        // SAFETY: pid belongs to our unreaped child, so it cannot have been recycled.
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        child.start_kill().is_ok()
    }
}
