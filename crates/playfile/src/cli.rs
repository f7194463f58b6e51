use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "playfile", version, about = "Play a single WAV or MP3 file and exit")]
pub struct Args {
    /// Path to the .wav or .mp3 file to play
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Converter input chunk size in frames (higher => more latency, lower => more overhead)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Playback callback refill cap (frames)
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Queue buffer target in seconds (per stage)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// Bound on start-up waits (pad discovery, stream running), in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub start_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_arguments_parse_with_no_path() {
        let args = Args::try_parse_from(["playfile"]).unwrap();
        assert!(args.path.is_none());
    }

    #[test]
    fn single_path_is_accepted() {
        let args = Args::try_parse_from(["playfile", "/music/track.wav"]).unwrap();
        assert_eq!(args.path, Some(PathBuf::from("/music/track.wav")));
    }

    #[test]
    fn multiple_paths_are_rejected() {
        let result = Args::try_parse_from(["playfile", "a.wav", "b.wav"]);
        assert!(result.is_err());
    }

    #[test]
    fn device_and_timeout_flags_parse() {
        let args = Args::try_parse_from([
            "playfile",
            "track.mp3",
            "--device",
            "usb",
            "--start-timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(args.device.as_deref(), Some("usb"));
        assert_eq!(args.start_timeout_ms, 250);
    }
}
