//! Run configuration for a single Scriptor invocation.
//!
//! `RunOptions` holds the option values exactly as they were given on the
//! command line; `RunConfiguration::from_options` validates them once and
//! produces the immutable configuration every run of the invocation uses.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

/// Chain name used when `--chain` is given without a value.
pub const CHAIN_NAME_DEFAULT: &str = "chain";

/// Host port of the show-browser VNC server if none is configured.
pub const SHOW_BROWSER_PORT_DEFAULT: u16 = 5942;

/// Address the show-browser VNC server is bound to if none is configured.
pub const SHOW_BROWSER_BIND_DEFAULT: &str = "127.0.0.1";

pub const SHOW_BROWSER_WIDTH_DEFAULT: u32 = 1366;

pub const SHOW_BROWSER_HEIGHT_DEFAULT: u32 = 768;

/// A flag that may be given bare (`--replay`) or with a value (`--replay rw`).
///
/// `None` means absent, `Some(None)` means given without a value.
pub type OptionalValue = Option<Option<String>>;

/// Raw option values as they arrive from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub replay: OptionalValue,
    pub warc_input: Option<PathBuf>,
    pub chain: OptionalValue,
    pub proxy: Option<String>,
    pub insecure: bool,
    pub show_browser: OptionalValue,
    pub unrandomize: OptionalValue,
    pub video: OptionalValue,
    pub har: bool,
    pub tracing: bool,
    pub warc: bool,
    pub overwrite_output: bool,
    pub timeout_ms: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            replay: None,
            warc_input: None,
            chain: None,
            proxy: None,
            insecure: false,
            show_browser: None,
            unrandomize: None,
            video: None,
            har: true,
            tracing: true,
            warc: true,
            overwrite_output: false,
            timeout_ms: None,
        }
    }
}

/// How the browser's requests are answered from the web archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Requests go to the live web.
    #[default]
    Off,
    /// Only resources already in the archive are served.
    ReadOnly,
    /// Missing resources are fetched and added to the archive.
    ReadWrite,
}

impl ReplayMode {
    /// Value forwarded to the container entrypoint, if any.
    pub fn as_arg(&self) -> Option<&'static str> {
        match self {
            ReplayMode::Off => None,
            ReplayMode::ReadOnly => Some("r"),
            ReplayMode::ReadWrite => Some("rw"),
        }
    }
}

/// How `Math.random` is overwritten inside the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unrandomize {
    /// Not requested; the entrypoint applies its own default.
    #[default]
    Off,
    Constant,
    /// Explicitly leave `Math.random` alone.
    Not,
}

impl Unrandomize {
    pub fn as_arg(&self) -> Option<&'static str> {
        match self {
            Unrandomize::Off => None,
            Unrandomize::Constant => Some("constant"),
            Unrandomize::Not => Some("not"),
        }
    }
}

/// Sub-configuration of `--show-browser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowBrowser {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Host port published for the VNC server.
    #[serde(default = "default_port", skip_serializing)]
    pub port: u16,
    /// Host address the published port is bound to.
    #[serde(default = "default_bind", skip_serializing)]
    pub bind: String,
}

fn default_width() -> u32 {
    SHOW_BROWSER_WIDTH_DEFAULT
}

fn default_height() -> u32 {
    SHOW_BROWSER_HEIGHT_DEFAULT
}

fn default_port() -> u16 {
    SHOW_BROWSER_PORT_DEFAULT
}

fn default_bind() -> String {
    SHOW_BROWSER_BIND_DEFAULT.to_string()
}

impl Default for ShowBrowser {
    fn default() -> Self {
        Self {
            width: SHOW_BROWSER_WIDTH_DEFAULT,
            height: SHOW_BROWSER_HEIGHT_DEFAULT,
            password: None,
            port: SHOW_BROWSER_PORT_DEFAULT,
            bind: SHOW_BROWSER_BIND_DEFAULT.to_string(),
        }
    }
}

impl ShowBrowser {
    /// Parse the JSON given to `--show-browser`; omitted fields take their defaults.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(value).map_err(|source| ConfigError::InvalidShowBrowser {
            value: value.to_string(),
            source,
        })
    }

    /// The configuration forwarded to the container (display settings only).
    pub fn to_entrypoint_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Video recording of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Video {
    /// Scale factor relative to the viewport size.
    pub scale_factor: Option<f64>,
}

/// Which run artifacts are recorded. All default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recording {
    pub har: bool,
    pub tracing: bool,
    pub warc: bool,
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            har: true,
            tracing: true,
            warc: true,
        }
    }
}

/// Validated, immutable configuration shared by every run of an invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunConfiguration {
    pub replay: ReplayMode,
    pub warc_input: Option<PathBuf>,
    pub proxy: Option<String>,
    pub insecure: bool,
    pub show_browser: Option<ShowBrowser>,
    pub unrandomize: Unrandomize,
    pub video: Option<Video>,
    pub recording: Recording,
    pub overwrite_output: bool,
    /// Presence enables chaining.
    pub chain_name: Option<String>,
    /// Per run; `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl RunConfiguration {
    /// Validate raw options into a configuration.
    ///
    /// Enumerated flags accept only their documented values; anything else
    /// fails with `ConfigError::InvalidOption` naming the flag.
    pub fn from_options(options: &RunOptions) -> Result<Self, ConfigError> {
        let replay = match options.replay.as_ref() {
            None => ReplayMode::Off,
            Some(None) => ReplayMode::ReadOnly,
            Some(Some(value)) => match value.as_str() {
                "r" => ReplayMode::ReadOnly,
                "rw" => ReplayMode::ReadWrite,
                _ => return Err(invalid("replay", value)),
            },
        };

        let unrandomize = match options.unrandomize.as_ref() {
            None => Unrandomize::Off,
            Some(None) => Unrandomize::Constant,
            Some(Some(value)) => match value.as_str() {
                "constant" => Unrandomize::Constant,
                "not" => Unrandomize::Not,
                _ => return Err(invalid("unrandomize", value)),
            },
        };

        let show_browser = match options.show_browser.as_ref() {
            None => None,
            Some(None) => Some(ShowBrowser::default()),
            Some(Some(value)) => Some(ShowBrowser::parse(value)?),
        };

        let video = match options.video.as_ref() {
            None => None,
            Some(None) => Some(Video { scale_factor: None }),
            Some(Some(value)) => {
                let scale = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .ok_or_else(|| invalid("video", value))?;
                Some(Video {
                    scale_factor: Some(scale),
                })
            }
        };

        let chain_name = match options.chain.as_ref() {
            None => None,
            Some(None) => Some(CHAIN_NAME_DEFAULT.to_string()),
            Some(Some(name)) => {
                if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                    return Err(invalid("chain", name));
                }
                Some(name.clone())
            }
        };

        Ok(Self {
            replay,
            warc_input: options.warc_input.clone(),
            proxy: options.proxy.clone(),
            insecure: options.insecure,
            show_browser,
            unrandomize,
            video,
            recording: Recording {
                har: options.har,
                tracing: options.tracing,
                warc: options.warc,
            },
            overwrite_output: options.overwrite_output,
            chain_name,
            timeout: options.timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn chain_active(&self) -> bool {
        self.chain_name.is_some()
    }
}

fn invalid(flag: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidOption {
        flag,
        value: value.to_string(),
    }
}
