//! Message bus between pipeline stages and the monitoring loop.
//!
//! Stage threads (decode, convert, the output callback) hold a cloned
//! [`BusSender`] and publish events as they happen. The monitoring loop is
//! the sole consumer and processes one message at a time.

use crossbeam_channel::{Receiver, Sender};

/// An event posted by a pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusMessage {
    /// The sink drained the last buffered samples; playback finished.
    Eos,
    /// A stage failed. `debug` carries extra detail when the stage has any.
    Error {
        message: String,
        debug: Option<String>,
    },
    /// Non-fatal diagnostics, e.g. a skipped undecodable packet.
    Warning(String),
}

/// Publisher half of the bus, cloned into every stage thread.
///
/// Publishing never blocks and never fails; messages posted after the
/// consumer is gone are dropped.
#[derive(Clone)]
pub struct BusSender {
    tx: Sender<BusMessage>,
}

impl BusSender {
    pub fn publish(&self, msg: BusMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn error(&self, message: impl Into<String>, debug: Option<String>) {
        self.publish(BusMessage::Error {
            message: message.into(),
            debug,
        });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(BusMessage::Warning(message.into()));
    }
}

/// Blocking consumer side of a bus.
///
/// Abstract so the monitoring loop can be driven by a scripted bus in tests.
pub trait PlaybackBus {
    /// Block until the next message arrives, or return `None` once every
    /// publisher is gone and no buffered message remains.
    fn wait(&self) -> Option<BusMessage>;
}

/// Crossbeam-backed bus used by the hardware pipeline.
pub struct MessageBus {
    rx: Receiver<BusMessage>,
}

impl PlaybackBus for MessageBus {
    fn wait(&self) -> Option<BusMessage> {
        self.rx.recv().ok()
    }
}

/// Create a connected publisher/consumer pair.
pub fn channel() -> (BusSender, MessageBus) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (BusSender { tx }, MessageBus { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_wait_roundtrip() {
        let (tx, bus) = channel();
        tx.publish(BusMessage::Eos);
        assert_eq!(bus.wait(), Some(BusMessage::Eos));
    }

    #[test]
    fn wait_returns_none_when_publishers_gone() {
        let (tx, bus) = channel();
        tx.warning("almost done");
        drop(tx);
        assert_eq!(
            bus.wait(),
            Some(BusMessage::Warning("almost done".to_string()))
        );
        assert_eq!(bus.wait(), None);
    }

    #[test]
    fn publish_without_consumer_does_not_panic() {
        let (tx, bus) = channel();
        drop(bus);
        tx.error("nobody listening", Some("detail".to_string()));
    }
}
