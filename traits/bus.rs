use std::fmt;
use std::sync::Arc;

use crate::pipeline::{PipelineState, StreamKind};
use crate::tags::TagList;

/// Error or warning raised by an element of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementMessage {
    /// Path of the element that raised it, e.g. `/GstPlayBin:playbin/GstURIDecodeBin:uridecodebin0`.
    pub source_path: String,
    pub message: String,
    pub debug: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BusMessage {
    Error(ElementMessage),
    Warning(ElementMessage),
    Eos,
    /// State transition of the top level pipeline.
    StateChanged {
        old: PipelineState,
        current: PipelineState,
        pending: PipelineState,
    },
    Buffering(i32),
    ClockLost,
    DurationChanged,
    Latency,
    RequestState(PipelineState),
    /// An element asked to continue playback from another location.
    Redirect(String),
    Tag(TagList),
    StreamsChanged(StreamKind),
    StreamTagsChanged(StreamKind, i32),
    VideoCapsChanged,
    VolumeChanged,
    MuteChanged,
}

/// Posts bus messages into the player's worker loop. Cheap to clone and
/// callable from any of the pipeline's threads.
#[derive(Clone)]
pub struct BusSender {
    post: Arc<dyn Fn(BusMessage) + Send + Sync>,
}

impl BusSender {
    pub fn new<F>(post: F) -> BusSender
    where
        F: Fn(BusMessage) + Send + Sync + 'static,
    {
        BusSender {
            post: Arc::new(post),
        }
    }

    pub fn send(&self, message: BusMessage) {
        (self.post)(message)
    }
}

impl fmt::Debug for BusSender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("BusSender")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn sender_forwards_from_other_threads() {
        let (tx, rx) = mpsc::channel();
        let bus = BusSender::new(move |msg| {
            let _ = tx.send(msg);
        });
        let cloned = bus.clone();
        std::thread::spawn(move || cloned.send(BusMessage::Eos))
            .join()
            .unwrap();
        bus.send(BusMessage::Buffering(40));
        assert_eq!(rx.recv().unwrap(), BusMessage::Eos);
        assert_eq!(rx.recv().unwrap(), BusMessage::Buffering(40));
    }
}
