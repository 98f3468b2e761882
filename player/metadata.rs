use mediaplay_traits::{Caps, Fraction, Sample, StreamKind, TagList};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// 0/1 when unknown.
    pub framerate: Fraction,
    /// 1/1 when unknown.
    pub pixel_aspect_ratio: Fraction,
    pub bitrate: Option<u32>,
    pub max_bitrate: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AudioInfo {
    pub sample_rate: Option<i32>,
    /// 0 when unknown.
    pub channels: i32,
    pub bitrate: Option<u32>,
    pub max_bitrate: Option<u32>,
    pub language: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SubtitleInfo {
    pub language: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum StreamDetails {
    Video(VideoInfo),
    Audio(AudioInfo),
    Subtitle(SubtitleInfo),
}

impl StreamDetails {
    pub fn new(kind: StreamKind) -> StreamDetails {
        match kind {
            StreamKind::Video => StreamDetails::Video(VideoInfo {
                pixel_aspect_ratio: Fraction::new(1, 1),
                ..Default::default()
            }),
            StreamKind::Audio => StreamDetails::Audio(AudioInfo::default()),
            StreamKind::Subtitle => StreamDetails::Subtitle(SubtitleInfo::default()),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            StreamDetails::Video(_) => StreamKind::Video,
            StreamDetails::Audio(_) => StreamKind::Audio,
            StreamDetails::Subtitle(_) => StreamKind::Subtitle,
        }
    }
}

/// One elementary stream of the current media.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StreamInfo {
    /// Index within streams of the same kind.
    pub index: i32,
    pub caps: Option<Caps>,
    pub tags: Option<TagList>,
    pub codec: Option<String>,
    pub details: StreamDetails,
}

impl StreamInfo {
    pub fn new(kind: StreamKind, index: i32) -> StreamInfo {
        StreamInfo {
            index,
            caps: None,
            tags: None,
            codec: None,
            details: StreamDetails::new(kind),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.details.kind()
    }

    /// Short name of the stream type, as used in logs.
    pub fn stream_type(&self) -> &'static str {
        match self.kind() {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
        }
    }

    pub fn video(&self) -> Option<&VideoInfo> {
        match &self.details {
            StreamDetails::Video(info) => Some(info),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioInfo> {
        match &self.details {
            StreamDetails::Audio(info) => Some(info),
            _ => None,
        }
    }

    pub fn subtitle(&self) -> Option<&SubtitleInfo> {
        match &self.details {
            StreamDetails::Subtitle(info) => Some(info),
            _ => None,
        }
    }
}

/// Snapshot of everything known about the current media.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MediaInfo {
    pub uri: Option<String>,
    /// Nanoseconds.
    pub duration: Option<u64>,
    pub seekable: bool,
    pub title: Option<String>,
    pub container: Option<String>,
    pub cover_image: Option<Sample>,
    /// Global tags.
    pub tags: Option<TagList>,
    /// All streams in discovery order.
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(move |s| s.kind() == kind)
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams_of(StreamKind::Video)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams_of(StreamKind::Audio)
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams_of(StreamKind::Subtitle)
    }

    pub fn stream(&self, kind: StreamKind, index: i32) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.kind() == kind && s.index == index)
    }

    pub fn stream_mut(&mut self, kind: StreamKind, index: i32) -> Option<&mut StreamInfo> {
        self.streams
            .iter_mut()
            .find(|s| s.kind() == kind && s.index == index)
    }

    pub fn number_of_streams(&self) -> usize {
        self.streams.len()
    }
}
