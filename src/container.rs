//! Translation of a run configuration into the container launcher's argument vector.
//!
//! The builder is pure: every path it receives has already been checked and
//! made absolute by `crate::layout`, so nothing here can fail.

use std::path::{Path, PathBuf};

use crate::config::RunConfiguration;
use crate::layout::{RunDirectories, WarcInput};

pub const CONTAINER_OUTPUT_DIRECTORY: &str = "/output";
pub const CONTAINER_SCRIPT_DIRECTORY: &str = "/script";
pub const CONTAINER_INPUT_DIRECTORY: &str = "/input";
pub const CONTAINER_WARC_INPUT_DIRECTORY: &str = "/warc-input";

/// VNC port of the virtual display inside the container (5900 + DISPLAY).
pub const CONTAINER_VNC_PORT: u16 = 5942;

/// Builds `run ... <image> <entrypoint args>` for one run.
#[derive(Debug, Clone)]
pub struct ContainerArgsBuilder<'a> {
    config: &'a RunConfiguration,
    image: String,
    script_directory: Option<PathBuf>,
    warc_input: Option<WarcInput>,
}

impl<'a> ContainerArgsBuilder<'a> {
    pub fn new(config: &'a RunConfiguration, image: impl Into<String>) -> Self {
        Self {
            config,
            image: image.into(),
            script_directory: None,
            warc_input: None,
        }
    }

    pub fn script_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.script_directory = dir;
        self
    }

    pub fn warc_input(mut self, warc: Option<WarcInput>) -> Self {
        self.warc_input = warc;
        self
    }

    /// Directory mounted read-write as the container's output root.
    ///
    /// With a chain, this is the parent of the run directory: the container
    /// always sees the same root while the host rotates run directories.
    pub fn output_root(&self, output: &Path) -> PathBuf {
        if self.config.chain_active() {
            output.parent().unwrap_or(output).to_path_buf()
        } else {
            output.to_path_buf()
        }
    }

    pub fn build(&self, dirs: &RunDirectories) -> Vec<String> {
        let mut args: Vec<String> = ["run", "--interactive", "--init", "--rm"]
            .into_iter()
            .map(String::from)
            .collect();

        args.push("--volume".into());
        args.push(format!(
            "{}:{}",
            self.output_root(&dirs.output).display(),
            CONTAINER_OUTPUT_DIRECTORY
        ));

        if let Some(script) = &self.script_directory {
            args.push("--volume".into());
            args.push(read_only(script, CONTAINER_SCRIPT_DIRECTORY));
        }
        if let Some(input) = &dirs.input {
            args.push("--volume".into());
            args.push(read_only(input, CONTAINER_INPUT_DIRECTORY));
        }
        match &self.warc_input {
            Some(WarcInput::Directory(dir)) => {
                args.push("--volume".into());
                args.push(read_only(dir, CONTAINER_WARC_INPUT_DIRECTORY));
            }
            Some(WarcInput::File(file)) => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "input.warc".to_string());
                args.push("--volume".into());
                args.push(read_only(
                    file,
                    &format!("{}/{}", CONTAINER_WARC_INPUT_DIRECTORY, name),
                ));
            }
            None => {}
        }

        if let Some(show_browser) = &self.config.show_browser {
            args.push("--publish".into());
            args.push(format!(
                "{}:{}:{}",
                show_browser.bind, show_browser.port, CONTAINER_VNC_PORT
            ));
        }

        args.push(self.image.clone());
        args.extend(self.entrypoint_args());
        args
    }

    /// Options forwarded to the entrypoint inside the container.
    ///
    /// Default-on recordings are only spelled out when disabled.
    pub fn entrypoint_args(&self) -> Vec<String> {
        let config = self.config;
        let mut args = Vec::new();

        if let Some(mode) = config.replay.as_arg() {
            args.push("--replay".into());
            args.push(mode.into());
        }
        if self.warc_input.is_some() {
            args.push("--warc-input".into());
            args.push(CONTAINER_WARC_INPUT_DIRECTORY.into());
        }
        if let Some(name) = &config.chain_name {
            args.push("--chain".into());
            args.push(name.clone());
        }
        if let Some(proxy) = &config.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }
        if config.insecure {
            args.push("--insecure".into());
        }
        if let Some(show_browser) = &config.show_browser {
            args.push("--show-browser".into());
            args.push(show_browser.to_entrypoint_json());
        }
        if let Some(mode) = config.unrandomize.as_arg() {
            args.push("--unrandomize".into());
            args.push(mode.into());
        }
        if let Some(video) = &config.video {
            args.push("--video".into());
            if let Some(scale) = video.scale_factor {
                args.push(scale.to_string());
            }
        }
        if !config.recording.har {
            args.push("--no-har".into());
        }
        if !config.recording.tracing {
            args.push("--no-tracing".into());
        }
        if !config.recording.warc {
            args.push("--no-warc".into());
        }
        args
    }
}

fn read_only(host: &Path, container: &str) -> String {
    format!("{}:{}:ro", host.display(), container)
}
