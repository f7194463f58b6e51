use std::time::Duration;

/// Device selection and tuning for one playback run.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Output device selected by case-insensitive substring match; `None`
    /// uses the host default device.
    pub device: Option<String>,
    /// Converter input chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration for queue sizing, per stage.
    pub buffer_seconds: f32,
    /// Bound on start-up waits: pad discovery on the deferred path and the
    /// output stream reaching its running state.
    pub start_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
            start_timeout: Duration::from_secs(5),
        }
    }
}
