//! Tool settings: which launcher and image a run uses.
//!
//! Settings are layered, later layers win:
//! 1. `scriptor.toml` (or the file passed with `--settings`)
//! 2. Environment (`SCRIPTOR_DOCKER_CMD`, `SCRIPTOR_IMAGE`, `SCRIPTOR_IMAGE_TAG`)
//! 3. Command line (`--docker-image-tag`)
//!
//! ```toml
//! [docker]
//! command = "docker"
//! image = "scriptor_fitlayout"
//! tag = "0.1.0"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the working directory when no settings file is given.
pub const SETTINGS_FILE_NAME: &str = "scriptor.toml";

pub const DOCKER_CMD_DEFAULT: &str = "docker";

pub const IMAGE_DEFAULT: &str = "scriptor_fitlayout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Container launcher executable.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_command() -> String {
    DOCKER_CMD_DEFAULT.to_string()
}

fn default_image() -> String {
    IMAGE_DEFAULT.to_string()
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            image: default_image(),
            tag: None,
        }
    }
}

impl DockerSettings {
    /// Image reference passed to the launcher (`image` or `image:tag`).
    pub fn image_ref(&self) -> String {
        match self.tag.as_deref() {
            Some(tag) if !tag.is_empty() => format!("{}:{}", self.image, tag),
            _ => self.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub docker: DockerSettings,
}

impl Settings {
    /// Load settings from `path`, or from `./scriptor.toml` if it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(SETTINGS_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(command) = lookup("SCRIPTOR_DOCKER_CMD").filter(|v| !v.is_empty()) {
            self.docker.command = command;
        }
        if let Some(image) = lookup("SCRIPTOR_IMAGE").filter(|v| !v.is_empty()) {
            self.docker.image = image;
        }
        if let Some(tag) = lookup("SCRIPTOR_IMAGE_TAG").filter(|v| !v.is_empty()) {
            self.docker.tag = Some(tag);
        }
    }

    /// Apply command line overrides.
    pub fn with_image_tag(mut self, tag: Option<String>) -> Self {
        if tag.is_some() {
            self.docker.tag = tag;
        }
        self
    }
}
