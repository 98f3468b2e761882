use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::bus::BusSender;
use crate::caps::Caps;
use crate::registry::PluginRegistry;
use crate::tags::TagList;

/// Pipeline states, ordered the way the engine orders them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum PipelineState {
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match *self {
            PipelineState::VoidPending => "VOID_PENDING",
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> PipelineState {
        match value {
            1 => PipelineState::Null,
            2 => PipelineState::Ready,
            3 => PipelineState::Paused,
            4 => PipelineState::Playing,
            _ => PipelineState::VoidPending,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StateChangeSuccess {
    /// The pipeline reached the requested state.
    Success,
    /// The transition completes later and is announced on the bus.
    Async,
    /// The source is live and cannot preroll.
    NoPreroll,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("state change failed")]
pub struct StateChangeError;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct PipelineError {
    pub message: String,
}

impl PipelineError {
    pub fn new<S: Into<String>>(message: S) -> PipelineError {
        PipelineError {
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            StreamKind::Audio => "audio",
            StreamKind::Video => "video",
            StreamKind::Subtitle => "subtitle",
        })
    }
}

/// Output switches of the pipeline.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PlayFlag {
    Video,
    Audio,
    Subtitle,
    Visualization,
}

impl PlayFlag {
    /// Bit value used by playbin's `flags` property.
    pub fn bits(&self) -> u32 {
        match *self {
            PlayFlag::Video => 1,
            PlayFlag::Audio => 1 << 1,
            PlayFlag::Subtitle => 1 << 2,
            PlayFlag::Visualization => 1 << 3,
        }
    }

    pub fn nick(&self) -> &'static str {
        match *self {
            PlayFlag::Video => "video",
            PlayFlag::Audio => "audio",
            PlayFlag::Subtitle => "text",
            PlayFlag::Visualization => "vis",
        }
    }
}

/// A flushing seek. `start`/`stop` are nanoseconds; `None` leaves the
/// boundary untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct SeekRequest {
    pub rate: f64,
    pub flush: bool,
    pub trickmode: bool,
    pub start: Option<u64>,
    pub stop: Option<u64>,
}

impl SeekRequest {
    /// Seek to `position` playing at `rate`. Reverse playback runs from
    /// `position` back to the start of the stream.
    pub fn new(rate: f64, position: u64) -> SeekRequest {
        let (start, stop) = if rate >= 0.0 {
            (Some(position), None)
        } else {
            (Some(0), Some(position))
        };
        SeekRequest {
            rate,
            flush: true,
            trickmode: rate != 1.0,
            start,
            stop,
        }
    }

    /// The position playback resumes from once the seek is done.
    pub fn target_position(&self) -> u64 {
        if self.rate >= 0.0 {
            self.start.unwrap_or(0)
        } else {
            self.stop.unwrap_or(0)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorBalanceChannel {
    pub label: String,
    pub min_value: i32,
    pub max_value: i32,
}

/// Engine specific video sink, handed over to [`Pipeline::set_video_sink`].
pub type VideoSink = Box<dyn Any + Send>;

/// The media pipeline driven by the player core.
///
/// Implementations post everything asynchronous (state changes, errors,
/// tags, stream changes) through the [`BusSender`] they were created
/// with. Queries never block on the pipeline's streaming threads.
pub trait Pipeline: Send + Sync {
    fn set_state(&self, state: PipelineState) -> Result<StateChangeSuccess, StateChangeError>;
    /// While flushing, the pipeline drops bus messages instead of posting them.
    fn set_bus_flushing(&self, flushing: bool);

    fn query_position(&self) -> Option<u64>;
    fn query_duration(&self) -> Option<u64>;
    fn query_seekable(&self) -> bool;
    fn seek(&self, request: &SeekRequest) -> bool;
    /// Flushing seek back to zero, used to restart after end of stream.
    fn seek_to_start(&self) -> bool;
    fn recalculate_latency(&self);

    fn set_uri(&self, uri: Option<&str>);
    fn set_subtitle_uri(&self, uri: Option<&str>);
    fn current_subtitle_uri(&self) -> Option<String>;

    fn stream_count(&self, kind: StreamKind) -> i32;
    fn current_stream(&self, kind: StreamKind) -> i32;
    fn set_current_stream(&self, kind: StreamKind, index: i32);
    fn stream_tags(&self, kind: StreamKind, index: i32) -> Option<TagList>;
    fn stream_caps(&self, kind: StreamKind, index: i32) -> Option<Caps>;
    /// Human readable codec name for `caps`.
    fn codec_description(&self, caps: &Caps) -> Option<String>;

    /// Start posting `VideoCapsChanged` when the negotiated video format changes.
    fn watch_video_dimensions(&self);
    /// Display size of the current video, pixel aspect ratio applied.
    fn video_dimensions(&self) -> Option<(i32, i32)>;

    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn is_muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    fn is_flag_set(&self, flag: PlayFlag) -> bool;
    fn set_flag(&self, flag: PlayFlag, enabled: bool);

    fn set_visualization(&self, name: Option<&str>) -> Result<(), PipelineError>;
    fn current_visualization(&self) -> Option<String>;

    fn color_balance_channels(&self) -> Vec<ColorBalanceChannel>;
    fn color_balance_value(&self, label: &str) -> Option<i32>;
    fn set_color_balance_value(&self, label: &str, value: i32);

    fn set_video_sink(&self, sink: VideoSink) -> Result<(), PipelineError>;

    fn as_any(&self) -> &dyn Any;
}

pub trait PipelineFactory: Send {
    fn create_pipeline(&self, bus: BusSender) -> Result<Arc<dyn Pipeline>, PipelineError>;
}

/// A backend that can be brought up without arguments.
pub trait BackendInit: PipelineFactory + Sized {
    fn init() -> Result<Self, PipelineError>;
    /// Plugins available to the pipelines this backend creates.
    fn registry(&self) -> Arc<dyn PluginRegistry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ordering() {
        assert!(PipelineState::Null < PipelineState::Ready);
        assert!(PipelineState::Paused < PipelineState::Playing);
        assert!(PipelineState::VoidPending < PipelineState::Null);
        for state in [
            PipelineState::VoidPending,
            PipelineState::Null,
            PipelineState::Ready,
            PipelineState::Paused,
            PipelineState::Playing,
        ] {
            assert_eq!(PipelineState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn seek_request_direction() {
        let forward = SeekRequest::new(1.0, 5);
        assert_eq!((forward.start, forward.stop), (Some(5), None));
        assert!(!forward.trickmode);

        let reverse = SeekRequest::new(-2.0, 5);
        assert_eq!((reverse.start, reverse.stop), (Some(0), Some(5)));
        assert!(reverse.trickmode);
        assert_eq!(reverse.target_position(), 5);
    }
}
