//! `scriptor`: check preconditions, then run once or run the chain.

use anyhow::{Context, Result};
use std::io::Read;

use crate::Cli;

use scriptor::config::RunConfiguration;
use scriptor::layout::{InputSource, classify_warc_input, require_directory, resolve_input_directory};
use scriptor::orchestrator::{ChainDriver, Interrupts, ProcessSupervisor};
use scriptor::settings::Settings;

/// Returns whether the last run was continuable.
///
/// Configuration and precondition errors are returned before any container
/// is started. Failures of an individual run only end the chain.
pub async fn run_scriptor(cli: &Cli) -> Result<bool> {
    let config = RunConfiguration::from_options(&cli.run_options())?;
    let settings = Settings::load(cli.settings.as_deref())?
        .with_image_tag(cli.docker_image_tag.clone());

    let script_directory = cli
        .script_directory
        .as_deref()
        .map(|dir| require_directory("script", dir))
        .transpose()?;
    let warc_input = config
        .warc_input
        .as_deref()
        .map(classify_warc_input)
        .transpose()?;
    let input_source = cli.input.as_deref().map(InputSource::parse);
    let input = resolve_input_directory(input_source.as_ref(), || {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    })
    .context("Failed to resolve input directory")?;

    tracing::debug!(?config, docker = ?settings.docker, "scriptor.configuration");

    let supervisor = ProcessSupervisor::new(config.clone(), settings.docker, Interrupts::from_ctrl_c())
        .with_script_directory(script_directory)
        .with_warc_input(warc_input);

    let mut driver = ChainDriver::new(supervisor, input, cli.output_directory.clone())
        .with_chain(config.chain_name.clone())
        .with_overwrite_output(config.overwrite_output);
    driver.run().await
}
