//! Decoder element: Symphonia probe plus a background decode thread.
//!
//! Two entry points mirror the two link plans:
//! - [`start_decode`] probes synchronously and is used when the decoder is
//!   linked downstream eagerly (compressed path).
//! - [`start_deferred_decode`] probes on the decode thread and announces the
//!   discovered output through a one-shot channel once the container header
//!   has been parsed — the "pad added" notification of the uncompressed path.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Receiver;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::bus::BusSender;
use crate::queue::{SampleQueue, capacity_for};

/// A decoder's discovered output: the stream shape and the queue its decode
/// thread fills with interleaved `f32` samples.
pub struct DecoderPad {
    pub spec: SignalSpec,
    pub queue: Arc<SampleQueue>,
}

/// Open the input file and derive a probe hint from its extension.
pub fn open_source(path: &Path) -> Result<(File, Hint)> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    Ok((file, hint))
}

/// Probe synchronously, then decode on a background thread.
///
/// The returned pad is valid immediately; the queue is closed when the
/// decoder reaches end of file or gives up on an error.
pub fn start_decode(
    file: File,
    hint: Hint,
    buffer_seconds: f32,
    bus: BusSender,
) -> Result<DecoderPad> {
    let (format, spec, params) = probe(file, hint)?;
    let queue = new_pad_queue(&spec, buffer_seconds);
    let decode_queue = queue.clone();
    thread::spawn(move || run_decode(format, params, &decode_queue, &bus));
    Ok(DecoderPad { spec, queue })
}

/// Probe on the decode thread and deliver the pad through a one-shot channel.
///
/// The receiver yields exactly one [`DecoderPad`] once the header is parsed.
/// If probing fails, the channel closes without a pad and the failure is
/// posted to the bus.
pub fn start_deferred_decode(
    file: File,
    hint: Hint,
    buffer_seconds: f32,
    bus: BusSender,
) -> Receiver<DecoderPad> {
    let (pad_tx, pad_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let (format, spec, params) = match probe(file, hint) {
            Ok(probed) => probed,
            Err(e) => {
                bus.error(format!("decoder setup failed: {e:#}"), None);
                return;
            }
        };
        let queue = new_pad_queue(&spec, buffer_seconds);
        let pad = DecoderPad {
            spec,
            queue: queue.clone(),
        };
        if pad_tx.send(pad).is_err() {
            // Nobody waited for the pad; the pipeline is gone.
            return;
        }
        run_decode(format, params, &queue, &bus);
    });
    pad_rx
}

fn new_pad_queue(spec: &SignalSpec, buffer_seconds: f32) -> Arc<SampleQueue> {
    let channels = spec.channels.count();
    Arc::new(SampleQueue::new(
        channels,
        capacity_for(spec.rate, channels, buffer_seconds),
    ))
}

fn probe(file: File, hint: Hint) -> Result<(Box<dyn FormatReader>, SignalSpec, CodecParameters)> {
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("probe input format")?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;

    let spec = SignalSpec::new(rate, channels);
    let params = track.codec_params.clone();
    Ok((format, spec, params))
}

/// Decode packets into the pad queue until end of file or a fatal error.
///
/// Undecodable packets are skipped with a warning; demux failures other than
/// end-of-file are posted as errors. The queue is always closed on exit so
/// downstream stages drain and finish.
fn run_decode(
    mut format: Box<dyn FormatReader>,
    params: CodecParameters,
    queue: &Arc<SampleQueue>,
    bus: &BusSender,
) {
    let mut decoder = match symphonia::default::get_codecs().make(&params, &DecoderOptions::default())
    {
        Ok(d) => d,
        Err(e) => {
            bus.error(format!("no decoder for stream: {e}"), None);
            queue.close();
            return;
        }
    };

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                bus.error("demux error".to_string(), Some(e.to_string()));
                break;
            }
        };

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
                buf.copy_interleaved_ref(decoded);
                queue.push_blocking(buf.samples());
            }
            Err(e) => {
                bus.warning(format!("skipped undecodable packet: {e}"));
            }
        }
    }

    queue.close();
}
