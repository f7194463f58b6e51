//! Bus monitoring loop: wait for the terminal playback event.

use crate::bus::{BusMessage, PlaybackBus};

/// Terminal result of one playback run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// End of stream reached; every sample was handed to the device.
    Finished,
    /// Playback was interrupted by a pipeline error.
    Failed {
        message: String,
        debug: Option<String>,
    },
}

/// Block on the bus until end-of-stream or an error arrives.
///
/// Messages are handled strictly one at a time. Non-terminal messages are
/// reported and the wait resumes. A bus whose publishers all disappear
/// without posting a terminal message is reported as a failure rather than
/// waited on forever.
pub fn wait_for_completion<B: PlaybackBus>(bus: &B) -> PlayOutcome {
    loop {
        match bus.wait() {
            Some(BusMessage::Eos) => {
                tracing::info!("end of stream");
                return PlayOutcome::Finished;
            }
            Some(BusMessage::Error { message, debug }) => {
                tracing::error!(error = %message, "pipeline error");
                if let Some(detail) = &debug {
                    tracing::error!(detail = %detail, "error debug detail");
                }
                return PlayOutcome::Failed { message, debug };
            }
            Some(BusMessage::Warning(text)) => {
                tracing::warn!(message = %text, "pipeline warning");
            }
            None => {
                return PlayOutcome::Failed {
                    message: "bus closed before end of stream".to_string(),
                    debug: None,
                };
            }
        }
    }
}
