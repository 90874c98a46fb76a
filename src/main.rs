use clap::{ArgAction, Parser};
use favorites_dl::{Archiver, Config, PendingLinks, run_with_shutdown};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "favorites-dl.toml";

#[derive(Parser)]
#[command(name = "favorites-dl")]
#[command(version, about = "Archive favorited videos and photo galleries")]
#[command(long_about = "\
Archive favorited videos and photo galleries

Reads the favorites list from an account data export, asks an extraction
service how to download each post, and stores the results as numbered files
(1.mp4, 2.mp4, ...). Photo galleries are rendered into slideshow videos with
ffmpeg. A cursor file remembers the last link handed to a run, so the next run
only processes favorites added since.

Settings are read from favorites-dl.toml in the working directory (or the file
given with --config); the flags below override individual keys.")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Account data export (JSON)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Directory for finished videos
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// File holding the last claimed link
    #[arg(long)]
    cursor: Option<PathBuf>,

    /// Extraction service endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Audio used for galleries that have none
    #[arg(long)]
    default_audio: Option<PathBuf>,

    /// Print the links the next run would process, without claiming them
    #[arg(long)]
    list: bool,

    /// More output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> favorites_dl::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Config::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };

        if let Some(export) = &self.export {
            config.paths.export_file = export.clone();
        }
        if let Some(output) = &self.output {
            config.paths.download_dir = output.clone();
        }
        if let Some(cursor) = &self.cursor {
            config.paths.cursor_file = cursor.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.service.api_url = api_url.clone();
        }
        if let Some(default_audio) = &self.default_audio {
            config.paths.default_audio = default_audio.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let archiver = match Archiver::new(config) {
        Ok(archiver) => archiver,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    if cli.list {
        match archiver.pending() {
            PendingLinks::Ready(links) => {
                for link in links {
                    println!("{link}");
                }
            }
            PendingLinks::Empty(reason) => eprintln!("nothing to do: {reason}"),
        }
        return ExitCode::SUCCESS;
    }

    match run_with_shutdown(&archiver).await {
        Ok(Some(summary)) => {
            println!(
                "{} archived, {} failed, {} skipped",
                summary.done, summary.failed, summary.skipped
            );
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::from(130),
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}
