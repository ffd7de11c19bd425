use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use scriptor::config::RunOptions;
use scriptor::telemetry::{LogFormat, init_tracing};

mod cmd;

#[derive(Parser)]
#[command(name = "scriptor")]
#[command(
    version,
    about = "Runs a Scriptor web user simulation script in a docker container"
)]
pub struct Cli {
    /// The directory containing the Script.js and other run-independent files
    /// (default: the image's snapshot script, which needs an input config.json with a "url")
    #[arg(short, long, value_name = "DIRECTORY")]
    pub script_directory: Option<PathBuf>,

    /// One of: (1) the directory containing the files for this specific run
    /// (including config.json), (2) the contents of the config.json, or
    /// (3) "-" to read the config.json from standard input
    #[arg(short, long, value_name = "SPECIFICATION")]
    pub input: Option<String>,

    /// The directory the run output is written to
    #[arg(short, long, value_name = "DIRECTORY")]
    pub output_directory: PathBuf,

    /// The tag of the docker image to use
    #[arg(short = 'd', long, value_name = "TAG")]
    pub docker_image_tag: Option<String>,

    /// Abort the script after this many milliseconds (applies to each run of a --chain separately)
    #[arg(short, long, value_name = "MILLISECONDS")]
    pub timeout: Option<u64>,

    /// Answer browser requests from the web archive of the script or input directory;
    /// "r" (default) restricts to archived resources, "rw" also records missing ones
    #[arg(short, long, value_name = "MODE", num_args = 0..=1)]
    pub replay: Option<Option<String>>,

    /// Add the WARC file, or all WARC files in the directory, to the web archive before the run
    #[arg(short, long, value_name = "WARCS")]
    pub warc_input: Option<PathBuf>,

    /// Run the script several times, using the output directory of a run (placed within the
    /// --output-directory) as the input directory of the next; the state of the chain is kept
    /// in <output-directory>/<name>.json (default name: "chain")
    #[arg(short, long, value_name = "NAME", num_args = 0..=1)]
    pub chain: Option<Option<String>>,

    /// Use this proxy server for connecting to the Internet
    #[arg(short, long, value_name = "ADDRESS")]
    pub proxy: Option<String>,

    /// Ignore HTTPS errors (only considered when --no-warc is set and --replay is not)
    #[arg(short = 'x', long)]
    pub insecure: bool,

    /// Show the browser via VNC; JSON config with optional port, bind, password, width, height
    #[arg(short = 'b', long, value_name = "CONFIG", num_args = 0..=1)]
    pub show_browser: Option<Option<String>>,

    /// How to overwrite Math.random: "not" or by a "constant" (default: "constant")
    #[arg(short, long, value_name = "MODE", num_args = 0..=1)]
    pub unrandomize: Option<Option<String>>,

    /// Store a video recording of the run, optionally with a scale factor relative to the viewport
    #[arg(short, long, value_name = "SCALE_FACTOR", num_args = 0..=1)]
    pub video: Option<Option<String>>,

    /// Do not store a HAR archive of the run
    #[arg(short = 'H', long)]
    pub no_har: bool,

    /// Do not store a Playwright trace of the run
    #[arg(short = 'T', long)]
    pub no_tracing: bool,

    /// Do not store a WARC web archive of the run
    #[arg(short = 'W', long)]
    pub no_warc: bool,

    /// Delete the contents of the output directory before execution (instead of failing)
    #[arg(short = 'O', long)]
    pub overwrite_output: bool,

    /// Settings file (default: ./scriptor.toml if present)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[arg(long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            replay: self.replay.clone(),
            warc_input: self.warc_input.clone(),
            chain: self.chain.clone(),
            proxy: self.proxy.clone(),
            insecure: self.insecure,
            show_browser: self.show_browser.clone(),
            unrandomize: self.unrandomize.clone(),
            video: self.video.clone(),
            har: !self.no_har,
            tracing: !self.no_tracing,
            warc: !self.no_warc,
            overwrite_output: self.overwrite_output,
            timeout_ms: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let continuable = cmd::run_scriptor(&cli).await?;
    tracing::info!(continuable, "scriptor.done");
    Ok(())
}
