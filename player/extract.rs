//! Building and refreshing [`MediaInfo`] from what the pipeline reports.

use mediaplay_traits::tags;
use mediaplay_traits::{Caps, Fraction, Pipeline, Sample, StreamKind, TagList};

use crate::language;
use crate::metadata::{MediaInfo, StreamDetails, StreamInfo};

const DISCOVERY_ORDER: [StreamKind; 3] = [StreamKind::Video, StreamKind::Audio, StreamKind::Subtitle];

/// Describes the media the pipeline just prerolled. `global_tags` are
/// tags that arrived before the description existed.
pub(crate) fn create_media_info(
    pipeline: &dyn Pipeline,
    uri: Option<String>,
    global_tags: Option<TagList>,
) -> MediaInfo {
    let mut info = MediaInfo {
        uri,
        duration: pipeline.query_duration(),
        seekable: pipeline.query_seekable(),
        tags: global_tags,
        ..Default::default()
    };
    for kind in DISCOVERY_ORDER {
        update_streams(pipeline, &mut info, kind);
    }
    resolve_global_fields(&mut info);
    info
}

/// Brings the streams of `kind` in line with the pipeline. Streams are
/// looked up by index so repeated calls never duplicate entries.
pub(crate) fn update_streams(pipeline: &dyn Pipeline, info: &mut MediaInfo, kind: StreamKind) {
    let count = pipeline.stream_count(kind);
    for index in 0..count {
        if info.stream(kind, index).is_none() {
            trace!("New {} stream {}", kind, index);
            info.streams.push(StreamInfo::new(kind, index));
        }
        if let Some(stream) = info.stream_mut(kind, index) {
            update_stream(pipeline, stream);
        }
    }
}

/// Refreshes tags, caps and everything derived from them for one stream.
pub(crate) fn update_stream(pipeline: &dyn Pipeline, stream: &mut StreamInfo) {
    let kind = stream.kind();
    stream.tags = pipeline.stream_tags(kind, stream.index);
    stream.caps = pipeline.stream_caps(kind, stream.index);
    stream.codec = codec_name(pipeline, kind, stream.tags.as_ref(), stream.caps.as_ref());

    let tags = stream.tags.as_ref();
    let caps = stream.caps.as_ref();
    let index = stream.index;
    match &mut stream.details {
        StreamDetails::Video(video) => {
            video.width = caps.and_then(|c| c.int("width"));
            video.height = caps.and_then(|c| c.int("height"));
            video.framerate = caps
                .and_then(|c| c.fraction("framerate"))
                .unwrap_or(Fraction::new(0, 1));
            video.pixel_aspect_ratio = caps
                .and_then(|c| c.fraction("pixel-aspect-ratio"))
                .unwrap_or(Fraction::new(1, 1));
            video.bitrate = tags.and_then(|t| t.uint(tags::BITRATE));
            video.max_bitrate = tags.and_then(max_bitrate);
        }
        StreamDetails::Audio(audio) => {
            audio.sample_rate = caps.and_then(|c| c.int("rate"));
            audio.channels = caps.and_then(|c| c.int("channels")).unwrap_or(0);
            audio.bitrate = tags.and_then(|t| t.uint(tags::BITRATE));
            audio.max_bitrate = tags.and_then(max_bitrate);
            audio.language = tags.and_then(tag_language);
        }
        StreamDetails::Subtitle(subtitle) => {
            subtitle.language = tags
                .and_then(tag_language)
                .or_else(|| external_subtitle_name(pipeline, index));
        }
    }
}

/// Re-resolves title, container and cover art after the global tags or
/// the stream tags changed.
pub(crate) fn resolve_global_fields(info: &mut MediaInfo) {
    info.title = from_tags(info, |t| {
        t.string(tags::TITLE)
            .or_else(|| t.string(tags::TITLE_SORTNAME))
            .map(str::to_owned)
    });
    info.container = from_tags(info, |t| t.string(tags::CONTAINER_FORMAT).map(str::to_owned));
    info.cover_image = from_tags(info, cover_sample);
}

/// First value `get` finds in the global tags, then in the video streams,
/// then in the audio streams.
fn from_tags<T, F>(info: &MediaInfo, get: F) -> Option<T>
where
    F: Fn(&TagList) -> Option<T>,
{
    info.tags
        .as_ref()
        .and_then(&get)
        .or_else(|| {
            info.video_streams()
                .filter_map(|s| s.tags.as_ref())
                .find_map(&get)
        })
        .or_else(|| {
            info.audio_streams()
                .filter_map(|s| s.tags.as_ref())
                .find_map(&get)
        })
}

fn cover_sample(tags: &TagList) -> Option<Sample> {
    tags.sample(tags::IMAGE)
        .or_else(|| tags.sample(tags::PREVIEW_IMAGE))
        .cloned()
}

fn max_bitrate(tags: &TagList) -> Option<u32> {
    tags.uint(tags::MAXIMUM_BITRATE)
        .or_else(|| tags.uint(tags::NOMINAL_BITRATE))
}

fn tag_language(tags: &TagList) -> Option<String> {
    if let Some(name) = tags.string(tags::LANGUAGE_NAME) {
        return Some(name.to_owned());
    }
    tags.string(tags::LANGUAGE_CODE).map(|code| {
        language::language_name(code)
            .map(str::to_owned)
            .unwrap_or_else(|| code.to_owned())
    })
}

/// Names an external subtitle stream after its file, but only while it
/// is the subtitle stream in use.
fn external_subtitle_name(pipeline: &dyn Pipeline, index: i32) -> Option<String> {
    if pipeline.current_stream(StreamKind::Subtitle) != index {
        return None;
    }
    let uri = pipeline.current_subtitle_uri()?;
    let name = match url::Url::parse(&uri) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_owned),
        Err(_) => uri.rsplit('/').next().map(str::to_owned),
    };
    name.filter(|name| !name.is_empty())
}

fn codec_name(
    pipeline: &dyn Pipeline,
    kind: StreamKind,
    tags: Option<&TagList>,
    caps: Option<&Caps>,
) -> Option<String> {
    let kind_tag = match kind {
        StreamKind::Video => tags::VIDEO_CODEC,
        StreamKind::Audio => tags::AUDIO_CODEC,
        StreamKind::Subtitle => tags::SUBTITLE_CODEC,
    };
    tags.and_then(|t| t.string(kind_tag).or_else(|| t.string(tags::CODEC)))
        .map(str::to_owned)
        .or_else(|| caps.and_then(|c| pipeline.codec_description(c)))
}
