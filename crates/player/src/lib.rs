//! Single-shot playback pipeline: file source → decoder → optional sample
//! converter → device sink.
//!
//! The wiring logic ([`graph`], [`recipe`], [`monitor`]) is generic over a
//! [`graph::Backend`] so it can be exercised without touching real hardware.
//! The production backend ([`hardware`]) composes framework stages:
//! Symphonia decode, Rubato rate conversion, and a CPAL output stream, all
//! communicating through bounded [`queue::SampleQueue`]s and reporting
//! terminal events on a [`bus::BusMessage`] channel.

pub mod bus;
pub mod config;
pub mod convert;
pub mod decode;
pub mod device;
pub mod graph;
pub mod hardware;
pub mod monitor;
pub mod playback;
pub mod queue;
pub mod recipe;

#[cfg(test)]
mod testutil;
