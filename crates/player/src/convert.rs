//! Sample converter element: Rubato rate conversion between decoder and sink.
//!
//! Runs on its own thread, pulling fixed-size chunks of interleaved `f32`
//! from the decoder queue and pushing device-rate samples into a fresh queue.
//! When the source already matches the device rate the input queue is passed
//! through untouched.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::bus::BusSender;
use crate::queue::{SampleQueue, capacity_for};

/// Tuning for the converter stage.
#[derive(Clone, Copy, Debug)]
pub struct ConvertConfig {
    /// Input chunk size in frames for the steady-state loop.
    pub chunk_frames: usize,
    /// Buffering target in seconds for the output queue.
    pub buffer_seconds: f32,
}

/// Start the converter stage between `srcq` and the device.
///
/// Returns the queue the sink should drain. Conversion failures are posted to
/// the bus and close the output queue so the pipeline winds down.
pub fn start_converter(
    srcq: Arc<SampleQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    cfg: ConvertConfig,
    bus: BusSender,
) -> Result<Arc<SampleQueue>> {
    if src_spec.rate == dst_rate {
        tracing::info!(rate_hz = dst_rate, "sample rates match, converter passes through");
        return Ok(srcq);
    }

    let channels = src_spec.channels.count();
    let dstq = Arc::new(SampleQueue::new(
        channels,
        capacity_for(dst_rate, channels, cfg.buffer_seconds),
    ));
    tracing::info!(
        from_hz = src_spec.rate,
        to_hz = dst_rate,
        "converting sample rate"
    );

    let ratio = dst_rate as f64 / src_spec.rate as f64;
    let chunk_frames = cfg.chunk_frames.max(1);
    let outq = dstq.clone();
    thread::spawn(move || {
        run_converter(&srcq, &outq, ratio, channels, chunk_frames, &bus);
        outq.close();
    });

    Ok(dstq)
}

fn run_converter(
    srcq: &SampleQueue,
    dstq: &SampleQueue,
    ratio: f64,
    channels: usize,
    chunk_frames: usize,
    bus: &BusSender,
) {
    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let mut resampler =
        match Async::<f32>::new_sinc(ratio, 1.1, &params, chunk_frames, channels, FixedAsync::Input)
        {
            Ok(r) => r,
            Err(e) => {
                bus.error(format!("converter init failed: {e}"), None);
                return;
            }
        };

    let mut out = vec![0.0f32; channels * chunk_frames * 3];

    // Steady state: full chunks. Tail: whatever remains once the decoder
    // closes its queue.
    while let Some(chunk) = srcq.pop_exact(chunk_frames) {
        if !convert_chunk(&mut resampler, &chunk, chunk_frames, None, &mut out, channels, dstq, bus)
        {
            return;
        }
    }
    while let Some(tail) = srcq.pop_up_to(chunk_frames) {
        let frames = tail.len() / channels;
        if frames == 0 {
            continue;
        }
        if !convert_chunk(
            &mut resampler,
            &tail,
            frames,
            Some(frames),
            &mut out,
            channels,
            dstq,
            bus,
        ) {
            return;
        }
    }
}

/// Resample one interleaved chunk into `dstq`. Returns `false` on failure.
#[allow(clippy::too_many_arguments)]
fn convert_chunk(
    resampler: &mut impl Resampler<f32>,
    input: &[f32],
    frames: usize,
    partial_len: Option<usize>,
    out: &mut [f32],
    channels: usize,
    dstq: &SampleQueue,
    bus: &BusSender,
) -> bool {
    let input_adapter = match InterleavedSlice::new(input, channels, frames) {
        Ok(a) => a,
        Err(e) => {
            bus.error(format!("converter input layout error: {e}"), None);
            return false;
        }
    };
    let out_capacity_frames = out.len() / channels;
    let mut output_adapter = match InterleavedSlice::new_mut(out, channels, out_capacity_frames) {
        Ok(a) => a,
        Err(e) => {
            bus.error(format!("converter output layout error: {e}"), None);
            return false;
        }
    };

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };

    match resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing)) {
        Ok((_consumed, produced)) => {
            let produced_samples = produced * channels;
            if produced_samples > 0 {
                dstq.push_blocking(&out[..produced_samples]);
            }
            true
        }
        Err(e) => {
            bus.error(format!("converter process error: {e}"), None);
            false
        }
    }
}
