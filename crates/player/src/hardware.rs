//! Hardware pipeline backend: Symphonia decode, Rubato conversion, CPAL sink.
//!
//! Implements the [`Backend`] seam with real framework stages. Element
//! "creation" claims resources (the input file, the output device); linking
//! starts the data flow between stages, eagerly or on pad discovery depending
//! on the recipe.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::DeviceTrait;
use symphonia::core::probe::Hint;

use crate::bus::{self, BusSender, MessageBus};
use crate::config::PlayerConfig;
use crate::convert::{self, ConvertConfig};
use crate::decode::{self, DecoderPad};
use crate::device;
use crate::graph::{Backend, ElementId};
use crate::playback::{self, Sink, SinkConfig};
use crate::queue::SampleQueue;
use crate::recipe::ElementKind;

pub struct HardwarePipeline {
    path: PathBuf,
    config: PlayerConfig,
    host: cpal::Host,
    bus_tx: BusSender,
    bus_rx: Option<MessageBus>,
    kinds: Vec<ElementKind>,
    source: Option<(File, Hint)>,
    device: Option<cpal::Device>,
    /// Output pad of an eagerly probed decoder, waiting to be linked onward.
    pad: Option<DecoderPad>,
    /// Set when the decoder→sink link is a one-shot pad subscription.
    deferred_sink: bool,
    sink: Option<Sink>,
    /// Every queue created for this run; closed on stop so stage threads exit.
    queues: Vec<Arc<SampleQueue>>,
}

impl HardwarePipeline {
    pub fn new(path: PathBuf, config: PlayerConfig) -> Self {
        let (bus_tx, bus_rx) = bus::channel();
        Self {
            path,
            config,
            host: cpal::default_host(),
            bus_tx,
            bus_rx: Some(bus_rx),
            kinds: Vec::new(),
            source: None,
            device: None,
            pad: None,
            deferred_sink: false,
            sink: None,
            queues: Vec::new(),
        }
    }

    fn kind(&self, id: ElementId) -> Result<ElementKind> {
        self.kinds
            .get(id.0)
            .copied()
            .ok_or_else(|| anyhow!("unknown element handle {}", id.0))
    }

    fn take_source(&mut self) -> Result<(File, Hint)> {
        self.source
            .take()
            .ok_or_else(|| anyhow!("file source not created or already consumed"))
    }

    /// Wire a decoder pad to the device sink, optionally through the sample
    /// converter stage.
    fn connect_sink(&mut self, pad: DecoderPad, through_converter: bool) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow!("device sink not created"))?;

        let supported = device::pick_output_config(device, pad.spec.rate)?;
        let stream_config: cpal::StreamConfig = supported.clone().into();
        tracing::info!(
            source_rate_hz = pad.spec.rate,
            output_rate_hz = stream_config.sample_rate,
            channels = pad.spec.channels.count(),
            "device output config"
        );

        self.queues.push(pad.queue.clone());
        let outq = if through_converter {
            convert::start_converter(
                pad.queue,
                pad.spec,
                stream_config.sample_rate,
                ConvertConfig {
                    chunk_frames: self.config.chunk_frames,
                    buffer_seconds: self.config.buffer_seconds,
                },
                self.bus_tx.clone(),
            )?
        } else {
            if stream_config.sample_rate != pad.spec.rate {
                tracing::warn!(
                    source_rate_hz = pad.spec.rate,
                    output_rate_hz = stream_config.sample_rate,
                    "device rate differs and this topology has no converter"
                );
            }
            pad.queue
        };
        self.queues.push(outq.clone());

        let sink = playback::build_sink(
            device,
            &stream_config,
            supported.sample_format(),
            &outq,
            SinkConfig {
                refill_max_frames: self.config.refill_max_frames,
            },
            self.bus_tx.clone(),
        )?;
        self.sink = Some(sink);
        Ok(())
    }
}

impl Backend for HardwarePipeline {
    type Bus = MessageBus;

    fn create(&mut self, kind: ElementKind) -> Result<ElementId> {
        match kind {
            ElementKind::FileSource => {
                tracing::info!(file = %self.path.display(), "file source");
                self.source = Some(decode::open_source(&self.path)?);
            }
            ElementKind::Mp3Decoder => {
                tracing::info!("MP3 audio decoder selected");
            }
            ElementKind::WavDecoder => {
                tracing::info!("WAV audio decoder selected");
            }
            ElementKind::SampleConverter => {}
            ElementKind::DeviceSink => {
                let device = device::pick_device(&self.host, self.config.device.as_deref())?;
                tracing::info!(device = %device.description()?, "output device");
                self.device = Some(device);
            }
        }
        self.kinds.push(kind);
        Ok(ElementId(self.kinds.len() - 1))
    }

    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()> {
        let pair = (self.kind(upstream)?, self.kind(downstream)?);
        match pair {
            // The decoder reads straight from the source's file handle; data
            // flow begins when the decoder itself is linked downstream.
            (ElementKind::FileSource, ElementKind::Mp3Decoder)
            | (ElementKind::FileSource, ElementKind::WavDecoder) => Ok(()),

            (ElementKind::Mp3Decoder, ElementKind::SampleConverter) => {
                let (file, hint) = self.take_source()?;
                let pad = decode::start_decode(
                    file,
                    hint,
                    self.config.buffer_seconds,
                    self.bus_tx.clone(),
                )
                .context("probe and start decoder")?;
                self.pad = Some(pad);
                Ok(())
            }

            (ElementKind::SampleConverter, ElementKind::DeviceSink) => {
                let pad = self
                    .pad
                    .take()
                    .ok_or_else(|| anyhow!("decoder was not linked to the converter"))?;
                self.connect_sink(pad, true)
            }

            other => bail!("unsupported link: {other:?}"),
        }
    }

    fn link_when_pad_added(&mut self, _upstream: ElementId, _downstream: ElementId) {
        tracing::debug!("registered one-shot decoder pad subscription");
        self.deferred_sink = true;
    }

    fn start(&mut self, timeout: Duration) -> Result<()> {
        if self.deferred_sink {
            self.deferred_sink = false;
            let (file, hint) = self.take_source()?;
            let pad_rx = decode::start_deferred_decode(
                file,
                hint,
                self.config.buffer_seconds,
                self.bus_tx.clone(),
            );
            let pad = pad_rx
                .recv_timeout(timeout)
                .map_err(|_| anyhow!("decoder produced no output pad within {timeout:?}"))?;
            tracing::info!(
                rate_hz = pad.spec.rate,
                channels = pad.spec.channels.count(),
                "linking pad between decoder and sink"
            );
            self.connect_sink(pad, false)?;
        }

        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| anyhow!("sink was never linked"))?;
        sink.play().context("start output stream")?;
        sink.wait_running(timeout)
    }

    fn take_bus(&mut self) -> Result<MessageBus> {
        self.bus_rx
            .take()
            .ok_or_else(|| anyhow!("bus already taken"))
    }

    fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        for q in &self.queues {
            q.close();
        }
    }
}
