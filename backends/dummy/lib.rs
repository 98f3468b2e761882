//! A scriptable in-memory pipeline.
//!
//! It follows the state machine of a real pipeline closely enough to
//! drive the player core: transitions are walked one step at a time and
//! announced on the bus, prerolling is asynchronous, and live sources
//! refuse to preroll. Tests script everything else (errors, tags, end
//! of stream) through [`DummyPipeline::post`].

extern crate mediaplay_traits;

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use mediaplay_traits::{
    BackendInit, BusMessage, BusSender, Caps, ColorBalanceChannel, PlayFlag, Pipeline,
    PipelineError, PipelineFactory, PipelineState, PluginRegistry, SeekRequest, StateChangeError,
    StateChangeSuccess, StreamKind, TagList, VideoSink, Visualization,
};

const SECOND: u64 = 1_000_000_000;
const COLOR_BALANCE_LABELS: [&str; 4] = ["BRIGHTNESS", "CONTRAST", "SATURATION", "HUE"];

#[derive(Clone, Debug)]
pub struct DummyStream {
    pub kind: StreamKind,
    pub caps: Option<Caps>,
    pub tags: Option<TagList>,
}

impl DummyStream {
    pub fn new(kind: StreamKind) -> DummyStream {
        DummyStream {
            kind,
            caps: None,
            tags: None,
        }
    }

    pub fn with_caps(mut self, caps: Caps) -> DummyStream {
        self.caps = Some(caps);
        self
    }

    pub fn with_tags(mut self, tags: TagList) -> DummyStream {
        self.tags = Some(tags);
        self
    }
}

/// What the dummy pretends to be playing.
#[derive(Clone, Debug)]
pub struct DummyMedia {
    pub duration: Option<u64>,
    pub seekable: bool,
    pub live: bool,
    pub streams: Vec<DummyStream>,
}

impl Default for DummyMedia {
    fn default() -> DummyMedia {
        DummyMedia {
            duration: Some(60 * SECOND),
            seekable: true,
            live: false,
            streams: Vec::new(),
        }
    }
}

impl DummyMedia {
    pub fn with_stream(mut self, stream: DummyStream) -> DummyMedia {
        self.streams.push(stream);
        self
    }

    pub fn with_duration(mut self, duration: Option<u64>) -> DummyMedia {
        self.duration = duration;
        self
    }

    /// A live source: never prerolls and cannot seek.
    pub fn live(mut self) -> DummyMedia {
        self.live = true;
        self.seekable = false;
        self
    }

    pub fn not_seekable(mut self) -> DummyMedia {
        self.seekable = false;
        self
    }

    fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &DummyStream> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    fn stream(&self, kind: StreamKind, index: i32) -> Option<&DummyStream> {
        if index < 0 {
            return None;
        }
        self.streams_of(kind).nth(index as usize)
    }
}

struct State {
    media: DummyMedia,
    uri: Option<String>,
    subtitle_uri: Option<String>,
    state: PipelineState,
    requested: Vec<PipelineState>,
    position: u64,
    volume: f64,
    muted: bool,
    flags: u32,
    current: HashMap<StreamKind, i32>,
    seeks: Vec<SeekRequest>,
    restarts: usize,
    latency_recalculations: usize,
    visualization: Option<String>,
    color_balance: Vec<(ColorBalanceChannel, i32)>,
    watching_video: bool,
    has_video_sink: bool,
    flushing: bool,
    /// State change messages kept back until released.
    held: Option<Vec<BusMessage>>,
    fail_state_changes: bool,
    fail_seeks: bool,
}

impl State {
    fn new(media: DummyMedia) -> State {
        let mut state = State {
            media,
            uri: None,
            subtitle_uri: None,
            state: PipelineState::Null,
            requested: Vec::new(),
            position: 0,
            volume: 1.0,
            muted: false,
            flags: PlayFlag::Video.bits() | PlayFlag::Audio.bits() | PlayFlag::Subtitle.bits(),
            current: HashMap::new(),
            seeks: Vec::new(),
            restarts: 0,
            latency_recalculations: 0,
            visualization: None,
            color_balance: COLOR_BALANCE_LABELS
                .iter()
                .map(|label| {
                    let channel = ColorBalanceChannel {
                        label: label.to_string(),
                        min_value: -1000,
                        max_value: 1000,
                    };
                    (channel, 0)
                })
                .collect(),
            watching_video: false,
            has_video_sink: false,
            flushing: false,
            held: None,
            fail_state_changes: false,
            fail_seeks: false,
        };
        state.select_default_streams();
        state
    }

    fn select_default_streams(&mut self) {
        for kind in [StreamKind::Video, StreamKind::Audio, StreamKind::Subtitle] {
            let index = if self.media.streams_of(kind).next().is_some() {
                0
            } else {
                -1
            };
            self.current.insert(kind, index);
        }
    }

    /// Filters what a state change or seek would post right now.
    fn deliver(&mut self, messages: Vec<BusMessage>) -> Vec<BusMessage> {
        if self.flushing {
            return Vec::new();
        }
        match self.held {
            Some(ref mut held) => {
                held.extend(messages);
                Vec::new()
            }
            None => messages,
        }
    }

    fn prerolled(&self) -> bool {
        self.state >= PipelineState::Paused
    }

    /// The messages a flushing seek produces in the current state.
    fn preroll_messages(&self) -> Vec<BusMessage> {
        match self.state {
            PipelineState::Paused => vec![BusMessage::StateChanged {
                old: PipelineState::Paused,
                current: PipelineState::Paused,
                pending: PipelineState::VoidPending,
            }],
            PipelineState::Playing => vec![
                BusMessage::StateChanged {
                    old: PipelineState::Playing,
                    current: PipelineState::Paused,
                    pending: PipelineState::Playing,
                },
                BusMessage::StateChanged {
                    old: PipelineState::Paused,
                    current: PipelineState::Playing,
                    pending: PipelineState::VoidPending,
                },
            ],
            _ => Vec::new(),
        }
    }
}

pub struct DummyPipeline {
    state: Mutex<State>,
    bus: Mutex<Option<BusSender>>,
    visualizations: Vec<Visualization>,
}

impl DummyPipeline {
    pub fn new(media: DummyMedia) -> DummyPipeline {
        DummyPipeline {
            state: Mutex::new(State::new(media)),
            bus: Mutex::new(None),
            visualizations: DummyRegistry::default().visualizations(),
        }
    }

    fn attach(&self, bus: BusSender) {
        *self.bus.lock().unwrap() = Some(bus);
    }

    /// Posts `message` on the bus, unless the bus is flushing.
    pub fn post(&self, message: BusMessage) {
        if self.state.lock().unwrap().flushing {
            return;
        }
        self.post_unchecked(vec![message]);
    }

    fn post_unchecked(&self, messages: Vec<BusMessage>) {
        let bus = self.bus.lock().unwrap().clone();
        if let Some(bus) = bus {
            for message in messages {
                bus.send(message);
            }
        }
    }

    /// Replaces the media, as if a new source had been discovered.
    pub fn set_media(&self, media: DummyMedia) {
        let mut state = self.state.lock().unwrap();
        state.media = media;
        state.select_default_streams();
    }

    pub fn set_position(&self, position: u64) {
        self.state.lock().unwrap().position = position;
    }

    pub fn set_fail_state_changes(&self, fail: bool) {
        self.state.lock().unwrap().fail_state_changes = fail;
    }

    pub fn set_fail_seeks(&self, fail: bool) {
        self.state.lock().unwrap().fail_seeks = fail;
    }

    /// While held, state changes and seeks complete without announcing
    /// it, as if prerolling took forever. A bus flush discards what was
    /// held; releasing posts the rest.
    pub fn hold_state_changes(&self, hold: bool) {
        let released = {
            let mut state = self.state.lock().unwrap();
            if hold {
                state.held.get_or_insert_with(Vec::new);
                Vec::new()
            } else {
                state.held.take().unwrap_or_default()
            }
        };
        self.post_unchecked(released);
    }

    pub fn state(&self) -> PipelineState {
        self.state.lock().unwrap().state
    }

    /// Every state passed to `set_state`, oldest first.
    pub fn requested_states(&self) -> Vec<PipelineState> {
        self.state.lock().unwrap().requested.clone()
    }

    pub fn seeks(&self) -> Vec<SeekRequest> {
        self.state.lock().unwrap().seeks.clone()
    }

    /// How often playback was restarted from the beginning.
    pub fn restarts(&self) -> usize {
        self.state.lock().unwrap().restarts
    }

    pub fn latency_recalculations(&self) -> usize {
        self.state.lock().unwrap().latency_recalculations
    }

    pub fn uri(&self) -> Option<String> {
        self.state.lock().unwrap().uri.clone()
    }

    pub fn is_watching_video(&self) -> bool {
        self.state.lock().unwrap().watching_video
    }

    pub fn has_video_sink(&self) -> bool {
        self.state.lock().unwrap().has_video_sink
    }
}

fn step(from: PipelineState, to: PipelineState) -> PipelineState {
    let from = from.to_u8().max(PipelineState::Null.to_u8());
    if to.to_u8() > from {
        PipelineState::from_u8(from + 1)
    } else {
        PipelineState::from_u8(from - 1)
    }
}

impl Pipeline for DummyPipeline {
    fn set_state(&self, target: PipelineState) -> Result<StateChangeSuccess, StateChangeError> {
        let (messages, result) = {
            let mut state = self.state.lock().unwrap();
            state.requested.push(target);
            if state.fail_state_changes {
                return Err(StateChangeError);
            }
            if target > PipelineState::Ready && state.uri.is_none() {
                return Err(StateChangeError);
            }

            let was_prerolled = state.prerolled();
            let mut messages = Vec::new();
            let mut current = state.state;
            while current != target {
                let next = step(current, target);
                let pending = if next == target {
                    PipelineState::VoidPending
                } else {
                    target
                };
                messages.push(BusMessage::StateChanged {
                    old: current,
                    current: next,
                    pending,
                });
                current = next;
            }
            state.state = target;
            if target <= PipelineState::Ready {
                state.position = 0;
            }

            let result = if state.media.live && target >= PipelineState::Paused {
                StateChangeSuccess::NoPreroll
            } else if !was_prerolled && target >= PipelineState::Paused {
                StateChangeSuccess::Async
            } else {
                StateChangeSuccess::Success
            };
            (state.deliver(messages), result)
        };
        self.post_unchecked(messages);
        Ok(result)
    }

    fn set_bus_flushing(&self, flushing: bool) {
        let mut state = self.state.lock().unwrap();
        state.flushing = flushing;
        if flushing {
            if let Some(ref mut held) = state.held {
                held.clear();
            }
        }
    }

    fn query_position(&self) -> Option<u64> {
        let state = self.state.lock().unwrap();
        if state.prerolled() {
            Some(state.position)
        } else {
            None
        }
    }

    fn query_duration(&self) -> Option<u64> {
        let state = self.state.lock().unwrap();
        if state.prerolled() {
            state.media.duration
        } else {
            None
        }
    }

    fn query_seekable(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.media.seekable && !state.media.live
    }

    fn seek(&self, request: &SeekRequest) -> bool {
        let messages = {
            let mut state = self.state.lock().unwrap();
            if state.fail_seeks || !state.media.seekable || !state.prerolled() {
                return false;
            }
            state.seeks.push(request.clone());
            state.position = request.target_position();
            let messages = state.preroll_messages();
            state.deliver(messages)
        };
        self.post_unchecked(messages);
        true
    }

    fn seek_to_start(&self) -> bool {
        let messages = {
            let mut state = self.state.lock().unwrap();
            if state.fail_seeks || !state.media.seekable {
                return false;
            }
            state.restarts += 1;
            state.position = 0;
            if state.state == PipelineState::Paused {
                let messages = state.preroll_messages();
                state.deliver(messages)
            } else {
                Vec::new()
            }
        };
        self.post_unchecked(messages);
        true
    }

    fn recalculate_latency(&self) {
        self.state.lock().unwrap().latency_recalculations += 1;
    }

    fn set_uri(&self, uri: Option<&str>) {
        self.state.lock().unwrap().uri = uri.map(str::to_owned);
    }

    fn set_subtitle_uri(&self, uri: Option<&str>) {
        self.state.lock().unwrap().subtitle_uri = uri.map(str::to_owned);
    }

    fn current_subtitle_uri(&self) -> Option<String> {
        self.state.lock().unwrap().subtitle_uri.clone()
    }

    fn stream_count(&self, kind: StreamKind) -> i32 {
        self.state.lock().unwrap().media.streams_of(kind).count() as i32
    }

    fn current_stream(&self, kind: StreamKind) -> i32 {
        let state = self.state.lock().unwrap();
        state.current.get(&kind).copied().unwrap_or(-1)
    }

    fn set_current_stream(&self, kind: StreamKind, index: i32) {
        self.state.lock().unwrap().current.insert(kind, index);
    }

    fn stream_tags(&self, kind: StreamKind, index: i32) -> Option<TagList> {
        let state = self.state.lock().unwrap();
        state.media.stream(kind, index)?.tags.clone()
    }

    fn stream_caps(&self, kind: StreamKind, index: i32) -> Option<Caps> {
        let state = self.state.lock().unwrap();
        state.media.stream(kind, index)?.caps.clone()
    }

    fn codec_description(&self, caps: &Caps) -> Option<String> {
        let description = match caps.name() {
            "video/x-h264" => "H.264",
            "video/x-h265" => "H.265",
            "video/x-vp8" => "On2 VP8",
            "video/x-vp9" => "VP9",
            "audio/mpeg" => "MPEG Audio",
            "audio/x-opus" => "Opus",
            "audio/x-vorbis" => "Vorbis",
            "text/x-raw" => "Timed Text",
            _ => return None,
        };
        Some(description.to_owned())
    }

    fn watch_video_dimensions(&self) {
        self.state.lock().unwrap().watching_video = true;
    }

    fn video_dimensions(&self) -> Option<(i32, i32)> {
        let state = self.state.lock().unwrap();
        if !state.prerolled() {
            return None;
        }
        let index = state.current.get(&StreamKind::Video).copied().unwrap_or(-1);
        let caps = state.media.stream(StreamKind::Video, index)?.caps.as_ref()?;
        let (width, height) = (caps.int("width")?, caps.int("height")?);
        match caps.fraction("pixel-aspect-ratio") {
            Some(par) if par.denom != 0 => Some((width * par.numer / par.denom, height)),
            _ => Some((width, height)),
        }
    }

    fn volume(&self) -> f64 {
        self.state.lock().unwrap().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().unwrap().volume = volume;
        self.post(BusMessage::VolumeChanged);
    }

    fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
        self.post(BusMessage::MuteChanged);
    }

    fn is_flag_set(&self, flag: PlayFlag) -> bool {
        self.state.lock().unwrap().flags & flag.bits() != 0
    }

    fn set_flag(&self, flag: PlayFlag, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        if enabled {
            state.flags |= flag.bits();
        } else {
            state.flags &= !flag.bits();
        }
    }

    fn set_visualization(&self, name: Option<&str>) -> Result<(), PipelineError> {
        let name = match name {
            Some(name) => name,
            None => {
                self.state.lock().unwrap().visualization = None;
                return Ok(());
            }
        };
        if !self.visualizations.iter().any(|vis| vis.name == name) {
            return Err(PipelineError::new(format!(
                "Could not find visualization '{}'",
                name
            )));
        }
        self.state.lock().unwrap().visualization = Some(name.to_owned());
        Ok(())
    }

    fn current_visualization(&self) -> Option<String> {
        self.state.lock().unwrap().visualization.clone()
    }

    fn color_balance_channels(&self) -> Vec<ColorBalanceChannel> {
        let state = self.state.lock().unwrap();
        state
            .color_balance
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    fn color_balance_value(&self, label: &str) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state
            .color_balance
            .iter()
            .find(|(channel, _)| channel.label == label)
            .map(|(_, value)| *value)
    }

    fn set_color_balance_value(&self, label: &str, value: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state
            .color_balance
            .iter_mut()
            .find(|(channel, _)| channel.label == label)
        {
            entry.1 = value.clamp(entry.0.min_value, entry.0.max_value);
        }
    }

    fn set_video_sink(&self, _sink: VideoSink) -> Result<(), PipelineError> {
        self.state.lock().unwrap().has_video_sink = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Hands out one shared [`DummyPipeline`] so tests can script it while a
/// player drives it.
pub struct DummyBackend {
    pipeline: Arc<DummyPipeline>,
    registry: Arc<DummyRegistry>,
    fail: bool,
}

impl DummyBackend {
    pub fn new(media: DummyMedia) -> DummyBackend {
        DummyBackend {
            pipeline: Arc::new(DummyPipeline::new(media)),
            registry: Arc::new(DummyRegistry::default()),
            fail: false,
        }
    }

    /// A backend whose pipelines cannot be created.
    pub fn failing() -> DummyBackend {
        DummyBackend {
            fail: true,
            ..DummyBackend::new(DummyMedia::default())
        }
    }

    pub fn pipeline(&self) -> Arc<DummyPipeline> {
        self.pipeline.clone()
    }
}

impl Default for DummyBackend {
    fn default() -> DummyBackend {
        DummyBackend::new(DummyMedia::default())
    }
}

impl BackendInit for DummyBackend {
    fn init() -> Result<DummyBackend, PipelineError> {
        Ok(DummyBackend::default())
    }

    fn registry(&self) -> Arc<dyn PluginRegistry> {
        self.registry.clone()
    }
}

impl PipelineFactory for DummyBackend {
    fn create_pipeline(&self, bus: BusSender) -> Result<Arc<dyn Pipeline>, PipelineError> {
        if self.fail {
            return Err(PipelineError::new("dummy pipeline creation disabled"));
        }
        self.pipeline.attach(bus);
        Ok(self.pipeline.clone())
    }
}

/// A plugin registry whose contents tests can change.
pub struct DummyRegistry {
    cookie: AtomicU32,
    visualizations: Mutex<Vec<Visualization>>,
}

impl Default for DummyRegistry {
    fn default() -> DummyRegistry {
        let visualizations = [
            ("goom", "Goom: what a GOOM!"),
            ("monoscope", "Monoscope"),
            ("wavescope", "Simple wave-scope"),
        ]
        .iter()
        .map(|(name, description)| Visualization {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect();
        DummyRegistry {
            cookie: AtomicU32::new(1),
            visualizations: Mutex::new(visualizations),
        }
    }
}

impl DummyRegistry {
    /// Installs a new visualization plugin.
    pub fn add(&self, visualization: Visualization) {
        self.visualizations.lock().unwrap().push(visualization);
        self.cookie.fetch_add(1, Ordering::SeqCst);
    }
}

impl PluginRegistry for DummyRegistry {
    fn feature_list_cookie(&self) -> u32 {
        self.cookie.load(Ordering::SeqCst)
    }

    fn visualizations(&self) -> Vec<Visualization> {
        self.visualizations.lock().unwrap().clone()
    }
}
