//! playfile — play a single local WAV or MP3 file to a hardware output, then
//! exit.
//!
//! ## Pipeline
//! The file path picks one of two fixed recipes:
//! - `.mp3`: file source → MP3 decoder → sample converter → device sink,
//!   linked eagerly at setup.
//! - `.wav`: file source → WAV decoder → device sink, with the decoder→sink
//!   link completed once the decoder has parsed the container header.
//!
//! After a bounded start-up wait the process blocks on the pipeline bus until
//! end-of-stream or an error arrives, tears the graph down, and exits.
//!
//! ## Exit codes
//! - 0: played to end of stream
//! - 1: setup or playback error
//! - 2: usage error (bad arguments or unrecognized extension)

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use playfile_player::config::PlayerConfig;
use playfile_player::device;
use playfile_player::graph::Graph;
use playfile_player::hardware::HardwarePipeline;
use playfile_player::monitor::PlayOutcome;
use playfile_player::recipe::Recipe;

const EXIT_RUNTIME_ERROR: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if args.list_devices {
        return match device::list_devices(&cpal::default_host()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("device listing failed: {e:#}");
                ExitCode::from(EXIT_RUNTIME_ERROR)
            }
        };
    }

    let Some(path) = args.path.clone() else {
        eprintln!("usage: playfile <file.mp3 | file.wav>");
        return ExitCode::from(EXIT_USAGE);
    };

    let Some(recipe) = Recipe::for_path(&path.to_string_lossy()) else {
        eprintln!(
            "only .mp3 and .wav files can be played: {}",
            path.display()
        );
        return ExitCode::from(EXIT_USAGE);
    };

    match run(recipe, &args, path) {
        Ok(PlayOutcome::Finished) => ExitCode::SUCCESS,
        Ok(PlayOutcome::Failed { .. }) => ExitCode::from(EXIT_RUNTIME_ERROR),
        Err(e) => {
            tracing::error!("setup failed: {e:#}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

/// Build, start, and monitor one playback run. The outcome of a run that got
/// as far as playing is reported in-band; setup failures propagate as errors.
fn run(recipe: Recipe, args: &cli::Args, path: PathBuf) -> Result<PlayOutcome> {
    let config = PlayerConfig {
        device: args.device.clone(),
        chunk_frames: args.chunk_frames,
        refill_max_frames: args.refill_max_frames,
        buffer_seconds: args.buffer_seconds,
        start_timeout: Duration::from_millis(args.start_timeout_ms),
    };
    tracing::info!(file = %path.display(), recipe = ?recipe, "starting playback");

    let backend = HardwarePipeline::new(path, config.clone());
    let mut graph = Graph::build(recipe, backend)?;
    graph.start(config.start_timeout)?;
    let outcome = graph.wait_until_done();
    graph.shutdown();
    Ok(outcome)
}
