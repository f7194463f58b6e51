//! Device sink element: CPAL output stream fed from a sample queue.
//!
//! The real-time callback never blocks: it refills a local buffer with a
//! non-blocking pop, maps channels, and converts `f32` to the device sample
//! format. Underruns are filled with silence. When the input queue is closed
//! and fully drained the sink posts end-of-stream to the bus, exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Receiver;

use crate::bus::{BusMessage, BusSender};
use crate::queue::SampleQueue;

/// Tuning for the sink callback.
#[derive(Clone, Copy, Debug)]
pub struct SinkConfig {
    /// Maximum frames pulled from the queue per refill.
    pub refill_max_frames: usize,
}

/// The device sink: a built but not necessarily running output stream.
pub struct Sink {
    stream: cpal::Stream,
    running_rx: Receiver<()>,
}

impl Sink {
    /// Request the running state.
    pub fn play(&self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }

    /// Wait for the first output callback after [`Sink::play`], confirming
    /// the stream actually reached its running state.
    pub fn wait_running(&self, timeout: Duration) -> Result<()> {
        self.running_rx
            .recv_timeout(timeout)
            .map_err(|_| anyhow!("output stream did not start within {timeout:?}"))
    }

    /// Move the stream back toward idle. Errors are ignored; this runs on
    /// teardown paths where the device may already be gone.
    pub fn pause(&self) {
        let _ = self.stream.pause();
    }
}

/// Build the output stream for the device's sample format.
pub fn build_sink(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    cfg: SinkConfig,
    bus: BusSender,
) -> Result<Sink> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, cfg, bus),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, cfg, bus),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, cfg, bus),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, cfg, bus),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    cfg: SinkConfig,
    bus: BusSender,
) -> Result<Sink>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = cfg.refill_max_frames.max(1);

    let state = Arc::new(Mutex::new(CallbackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    }));

    let queue_cb = queue.clone();
    let state_cb = state.clone();
    let running = Arc::new(AtomicBool::new(false));
    let (run_tx, run_rx) = crossbeam_channel::bounded(1);
    let eos_sent = Arc::new(AtomicBool::new(false));
    let bus_cb = bus.clone();

    let err_bus = bus;
    let err_fn = move |err| {
        err_bus.error(format!("output stream error: {err}"), None);
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if !running.swap(true, Ordering::Relaxed) {
                let _ = run_tx.try_send(());
            }

            let mut st = state_cb.lock().unwrap();
            let frames = data.len() / channels_out;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue_cb.try_pop(refill_max_frames) {
                        Some(v) => st.src = v,
                        None => {
                            if queue_cb.is_finished()
                                && !eos_sent.swap(true, Ordering::Relaxed)
                            {
                                bus_cb.publish(BusMessage::Eos);
                            }
                            // Underrun or end of data: silence for the rest.
                            for idx in (frame * channels_out)..data.len() {
                                data[idx] = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            }
                            return;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_mapped_sample(&mut st, channels_out, ch);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(Sink {
        stream,
        running_rx: run_rx,
    })
}

/// Local refill buffer for the output callback.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one output sample for `dst_ch`, applying simple channel mapping:
/// mono→stereo duplicates, stereo→mono averages, anything else clamps to the
/// available channels. `pos` advances after the last destination channel.
fn next_mapped_sample(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }

    let frame_start = st.pos;
    let src = |ch: usize, st: &CallbackState| -> f32 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch]
        } else {
            0.0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (1, _) => src(0, st),
        (2, 1) => 0.5 * (src(0, st) + src(1, st)),
        (2, 2) => src(dst_ch, st),
        _ => src(dst_ch.min(st.src_channels - 1), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(src_channels: usize, src: Vec<f32>) -> CallbackState {
        CallbackState {
            pos: 0,
            src_channels,
            src,
        }
    }

    #[test]
    fn mono_to_stereo_duplicates_channel() {
        let mut st = state(1, vec![0.25, 0.5]);
        assert_eq!(next_mapped_sample(&mut st, 2, 0), 0.25);
        assert_eq!(next_mapped_sample(&mut st, 2, 1), 0.25);
        assert_eq!(next_mapped_sample(&mut st, 2, 0), 0.5);
        assert_eq!(next_mapped_sample(&mut st, 2, 1), 0.5);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let mut st = state(2, vec![0.2, 0.4]);
        let got = next_mapped_sample(&mut st, 1, 0);
        assert!((got - 0.3).abs() < 1e-6);
    }

    #[test]
    fn exhausted_buffer_yields_silence() {
        let mut st = state(2, vec![]);
        assert_eq!(next_mapped_sample(&mut st, 2, 0), 0.0);
    }
}
