/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod dispatcher;
mod event_loop;
mod extract;
mod handle;
pub mod language;
pub mod metadata;
pub mod signals;
pub mod video;
pub mod visualization;
mod worker;

pub use mediaplay_traits as traits;

pub use crate::config::PlayerConfig;
pub use crate::handle::Player;
pub use crate::metadata::{AudioInfo, MediaInfo, StreamDetails, StreamInfo, SubtitleInfo, VideoInfo};
pub use crate::signals::HandlerId;
pub use crate::visualization::list_visualizations;

use mediaplay_traits::StreamKind;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Buffering,
    Paused,
    Playing,
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match *self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, thiserror::Error)]
pub enum PlayerError {
    /// The pipeline failed. This is the only error carried by the
    /// `error` and `warning` events.
    #[error("{0}")]
    Failed(String),
    /// An argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The media stream is not seekable.
    #[error("the media stream is not seekable")]
    NonSeekableStream,
    /// No stream of this kind and index in the current media.
    #[error("no {0} stream with index {1}")]
    StreamNotFound(StreamKind, i32),
    #[error("visualization '{0}' not found")]
    VisualizationNotFound(String),
    /// The pipeline exposes no channel for the requested color balance type.
    #[error("color balance is not available")]
    ColorBalanceUnavailable,
    /// The player thread has exited.
    #[error("the player thread is gone")]
    Disconnected,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum PlayerEvent {
    Buffering(i32),
    DurationChanged(Option<u64>),
    EndOfStream,
    Error(PlayerError),
    MediaInfoUpdated(MediaInfo),
    MuteChanged,
    PositionUpdated(u64),
    SeekDone(u64),
    StateChanged(PlaybackState),
    VideoDimensionsChanged(i32, i32),
    VolumeChanged,
    Warning(PlayerError),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ColorBalanceType {
    Hue,
    Brightness,
    Saturation,
    Contrast,
}

impl ColorBalanceType {
    pub fn name(&self) -> &'static str {
        match *self {
            ColorBalanceType::Hue => "hue",
            ColorBalanceType::Brightness => "brightness",
            ColorBalanceType::Saturation => "saturation",
            ColorBalanceType::Contrast => "contrast",
        }
    }

    /// Substring matched against the pipeline's channel labels.
    pub fn channel_label(&self) -> &'static str {
        match *self {
            ColorBalanceType::Hue => "HUE",
            ColorBalanceType::Brightness => "BRIGHTNESS",
            ColorBalanceType::Saturation => "SATURATION",
            ColorBalanceType::Contrast => "CONTRAST",
        }
    }
}
