//! `Pipeline` on top of playbin.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use glib::prelude::*;
use gst::prelude::*;
use gst_video::prelude::*;

use mediaplay_traits::{
    BusMessage, BusSender, Caps, ColorBalanceChannel, ElementMessage, PlayFlag, Pipeline,
    PipelineError, PipelineState, SeekRequest, StateChangeError, StateChangeSuccess, StreamKind,
    TagList, VideoSink,
};

use crate::tags;

fn state_from_gst(state: gst::State) -> PipelineState {
    match state {
        gst::State::Null => PipelineState::Null,
        gst::State::Ready => PipelineState::Ready,
        gst::State::Paused => PipelineState::Paused,
        gst::State::Playing => PipelineState::Playing,
        _ => PipelineState::VoidPending,
    }
}

fn state_to_gst(state: PipelineState) -> gst::State {
    match state {
        PipelineState::VoidPending => gst::State::VoidPending,
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

/// Playbin property and signal names for one kind of stream.
struct StreamProperties {
    count: &'static str,
    current: &'static str,
    tags: &'static str,
    pad: &'static str,
}

fn stream_properties(kind: StreamKind) -> StreamProperties {
    match kind {
        StreamKind::Video => StreamProperties {
            count: "n-video",
            current: "current-video",
            tags: "get-video-tags",
            pad: "get-video-pad",
        },
        StreamKind::Audio => StreamProperties {
            count: "n-audio",
            current: "current-audio",
            tags: "get-audio-tags",
            pad: "get-audio-pad",
        },
        StreamKind::Subtitle => StreamProperties {
            count: "n-text",
            current: "current-text",
            tags: "get-text-tags",
            pad: "get-text-pad",
        },
    }
}

fn element_message(msg: &gst::MessageRef, message: String, debug: Option<String>) -> ElementMessage {
    ElementMessage {
        source_path: msg
            .src()
            .map(|src| src.path_string().to_string())
            .unwrap_or_default(),
        message,
        debug,
    }
}

/// Translates what the player core cares about. State changes of
/// elements other than playbin itself are ignored.
fn convert_message(playbin: &gst::Pipeline, msg: &gst::MessageRef) -> Option<BusMessage> {
    use gst::MessageView;

    match msg.view() {
        MessageView::Error(err) => Some(BusMessage::Error(element_message(
            msg,
            err.error().to_string(),
            err.debug().map(|debug| debug.to_string()),
        ))),
        MessageView::Warning(warning) => Some(BusMessage::Warning(element_message(
            msg,
            warning.error().to_string(),
            warning.debug().map(|debug| debug.to_string()),
        ))),
        MessageView::Eos(..) => Some(BusMessage::Eos),
        MessageView::StateChanged(changed) => {
            let from_playbin = msg
                .src()
                .map_or(false, |src| src == playbin.upcast_ref::<gst::Object>());
            if !from_playbin {
                return None;
            }
            Some(BusMessage::StateChanged {
                old: state_from_gst(changed.old()),
                current: state_from_gst(changed.current()),
                pending: state_from_gst(changed.pending()),
            })
        }
        MessageView::Buffering(buffering) => Some(BusMessage::Buffering(buffering.percent())),
        MessageView::ClockLost(..) => Some(BusMessage::ClockLost),
        MessageView::DurationChanged(..) => Some(BusMessage::DurationChanged),
        MessageView::Latency(..) => Some(BusMessage::Latency),
        MessageView::RequestState(request) => Some(BusMessage::RequestState(state_from_gst(
            request.requested_state(),
        ))),
        MessageView::Tag(tag) => Some(BusMessage::Tag(tags::tag_list_from_gst(&tag.tags()))),
        MessageView::Element(element) => {
            let structure = element.structure()?;
            if !structure.has_name("redirect") {
                return None;
            }
            structure
                .get::<String>("new-location")
                .ok()
                .map(BusMessage::Redirect)
        }
        _ => None,
    }
}

/// Forwards playbin signals to the bus sender, honouring bus flushes.
#[derive(Clone)]
struct SignalPoster {
    bus: BusSender,
    flushing: Arc<AtomicBool>,
}

impl SignalPoster {
    fn post(&self, message: BusMessage) {
        if !self.flushing.load(Ordering::SeqCst) {
            self.bus.send(message);
        }
    }
}

pub struct GStreamerPipeline {
    playbin: gst::Pipeline,
    bus: gst::Bus,
    poster: SignalPoster,
    video_caps_watch: Mutex<Option<(gst::Pad, glib::SignalHandlerId)>>,
}

impl GStreamerPipeline {
    pub fn new(bus_sender: BusSender) -> Result<GStreamerPipeline, PipelineError> {
        let playbin = gst::ElementFactory::make("playbin")
            .build()
            .map_err(|error| PipelineError::new(format!("playbin creation failed: {error:?}")))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| PipelineError::new("playbin is not a pipeline"))?;
        let bus = playbin
            .bus()
            .ok_or_else(|| PipelineError::new("playbin has no bus"))?;

        let weak_playbin = playbin.downgrade();
        let sender = bus_sender.clone();
        bus.set_sync_handler(move |_, msg| {
            if let Some(playbin) = weak_playbin.upgrade() {
                if let Some(message) = convert_message(&playbin, msg) {
                    sender.send(message);
                }
            }
            gst::BusSyncReply::Drop
        });

        let poster = SignalPoster {
            bus: bus_sender,
            flushing: Arc::new(AtomicBool::new(false)),
        };
        connect_stream_signals(&playbin, &poster);

        Ok(GStreamerPipeline {
            playbin,
            bus,
            poster,
            video_caps_watch: Mutex::new(None),
        })
    }

    /// The underlying playbin.
    pub fn playbin(&self) -> &gst::Pipeline {
        &self.playbin
    }

    fn video_sink_pad(&self) -> Option<gst::Pad> {
        let sink = self.playbin.property::<Option<gst::Element>>("video-sink")?;
        sink.static_pad("sink")
    }

    fn color_balance(&self) -> Option<&gst_video::ColorBalance> {
        self.playbin.dynamic_cast_ref::<gst_video::ColorBalance>()
    }

    fn find_channel(&self, label: &str) -> Option<gst_video::ColorBalanceChannel> {
        self.color_balance()?
            .list_channels()
            .into_iter()
            .find(|channel| channel.label().as_str() == label)
    }
}

fn connect_stream_signals(playbin: &gst::Pipeline, poster: &SignalPoster) {
    for (signal, kind) in [
        ("video-changed", StreamKind::Video),
        ("audio-changed", StreamKind::Audio),
        ("text-changed", StreamKind::Subtitle),
    ] {
        let poster = poster.clone();
        playbin.connect(signal, false, move |_| {
            poster.post(BusMessage::StreamsChanged(kind));
            None
        });
    }

    for (signal, kind) in [
        ("video-tags-changed", StreamKind::Video),
        ("audio-tags-changed", StreamKind::Audio),
        ("text-tags-changed", StreamKind::Subtitle),
    ] {
        let poster = poster.clone();
        playbin.connect(signal, false, move |args| {
            let index = args.get(1).and_then(|arg| arg.get::<i32>().ok());
            if let Some(index) = index {
                poster.post(BusMessage::StreamTagsChanged(kind, index));
            }
            None
        });
    }

    let volume_poster = poster.clone();
    playbin.connect_notify(Some("volume"), move |_, _| {
        volume_poster.post(BusMessage::VolumeChanged);
    });
    let mute_poster = poster.clone();
    playbin.connect_notify(Some("mute"), move |_, _| {
        mute_poster.post(BusMessage::MuteChanged);
    });
}

impl Pipeline for GStreamerPipeline {
    fn set_state(&self, state: PipelineState) -> Result<StateChangeSuccess, StateChangeError> {
        match self.playbin.set_state(state_to_gst(state)) {
            Ok(gst::StateChangeSuccess::Success) => Ok(StateChangeSuccess::Success),
            Ok(gst::StateChangeSuccess::Async) => Ok(StateChangeSuccess::Async),
            Ok(gst::StateChangeSuccess::NoPreroll) => Ok(StateChangeSuccess::NoPreroll),
            Err(_) => Err(StateChangeError),
        }
    }

    fn set_bus_flushing(&self, flushing: bool) {
        self.poster.flushing.store(flushing, Ordering::SeqCst);
        self.bus.set_flushing(flushing);
    }

    fn query_position(&self) -> Option<u64> {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(|position| position.nseconds())
    }

    fn query_duration(&self) -> Option<u64> {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(|duration| duration.nseconds())
    }

    fn query_seekable(&self) -> bool {
        let mut query = gst::query::Seeking::new(gst::Format::Time);
        if !self.playbin.query(&mut query) {
            return false;
        }
        let (seekable, _, _) = query.result();
        seekable
    }

    fn seek(&self, request: &SeekRequest) -> bool {
        let mut flags = gst::SeekFlags::empty();
        if request.flush {
            flags |= gst::SeekFlags::FLUSH;
        }
        if request.trickmode {
            flags |= gst::SeekFlags::TRICKMODE;
        }
        let seek_type = |position: Option<u64>| match position {
            Some(_) => gst::SeekType::Set,
            None => gst::SeekType::None,
        };
        self.playbin
            .seek(
                request.rate,
                flags,
                seek_type(request.start),
                request.start.map(gst::ClockTime::from_nseconds),
                seek_type(request.stop),
                request.stop.map(gst::ClockTime::from_nseconds),
            )
            .is_ok()
    }

    fn seek_to_start(&self) -> bool {
        self.playbin
            .seek_simple(gst::SeekFlags::FLUSH, gst::ClockTime::ZERO)
            .is_ok()
    }

    fn recalculate_latency(&self) {
        if self.playbin.recalculate_latency().is_err() {
            warn!("Latency recalculation failed");
        }
    }

    fn set_uri(&self, uri: Option<&str>) {
        self.playbin.set_property("uri", uri);
    }

    fn set_subtitle_uri(&self, uri: Option<&str>) {
        self.playbin.set_property("suburi", uri);
    }

    fn current_subtitle_uri(&self) -> Option<String> {
        self.playbin.property::<Option<String>>("current-suburi")
    }

    fn stream_count(&self, kind: StreamKind) -> i32 {
        self.playbin.property::<i32>(stream_properties(kind).count)
    }

    fn current_stream(&self, kind: StreamKind) -> i32 {
        self.playbin.property::<i32>(stream_properties(kind).current)
    }

    fn set_current_stream(&self, kind: StreamKind, index: i32) {
        self.playbin
            .set_property(stream_properties(kind).current, index);
    }

    fn stream_tags(&self, kind: StreamKind, index: i32) -> Option<TagList> {
        let tags = self
            .playbin
            .emit_by_name::<Option<gst::TagList>>(stream_properties(kind).tags, &[&index])?;
        Some(tags::tag_list_from_gst(&tags))
    }

    fn stream_caps(&self, kind: StreamKind, index: i32) -> Option<Caps> {
        let pad = self
            .playbin
            .emit_by_name::<Option<gst::Pad>>(stream_properties(kind).pad, &[&index])?;
        let caps = pad.current_caps()?;
        tags::caps_from_gst(&caps)
    }

    fn codec_description(&self, caps: &Caps) -> Option<String> {
        let caps = tags::caps_to_gst(caps)?;
        Some(gst_pbutils::pb_utils_get_codec_description(&caps).to_string())
    }

    fn watch_video_dimensions(&self) {
        let mut watch = self.video_caps_watch.lock().unwrap();
        if let Some((pad, handler)) = watch.take() {
            pad.disconnect(handler);
        }
        let pad = match self.video_sink_pad() {
            Some(pad) => pad,
            None => return,
        };
        let poster = self.poster.clone();
        let handler = pad.connect_notify(Some("caps"), move |_, _| {
            poster.post(BusMessage::VideoCapsChanged);
        });
        *watch = Some((pad, handler));
    }

    fn video_dimensions(&self) -> Option<(i32, i32)> {
        let caps = self.video_sink_pad()?.current_caps()?;
        let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
        let par = info.par();
        let width = if par.denom() != 0 {
            info.width() as i32 * par.numer() / par.denom()
        } else {
            info.width() as i32
        };
        Some((width, info.height() as i32))
    }

    fn volume(&self) -> f64 {
        self.playbin.property::<f64>("volume")
    }

    fn set_volume(&self, volume: f64) {
        self.playbin.set_property("volume", volume);
    }

    fn is_muted(&self) -> bool {
        self.playbin.property::<bool>("mute")
    }

    fn set_muted(&self, muted: bool) {
        self.playbin.set_property("mute", muted);
    }

    fn is_flag_set(&self, flag: PlayFlag) -> bool {
        let flags = self.playbin.property_value("flags");
        match glib::FlagsClass::with_type(flags.type_()) {
            Some(class) => class.is_set_by_nick(&flags, flag.nick()),
            None => false,
        }
    }

    fn set_flag(&self, flag: PlayFlag, enabled: bool) {
        let flags = self.playbin.property_value("flags");
        let Some(flags_class) = glib::FlagsClass::with_type(flags.type_()) else {
            warn!("FlagsClass creation failed");
            return;
        };
        let Some(builder) = flags_class.builder_with_value(flags) else {
            warn!("FlagsClass creation failed");
            return;
        };
        let builder = if enabled {
            builder.set_by_nick(flag.nick())
        } else {
            builder.unset_by_nick(flag.nick())
        };
        match builder.build() {
            Some(flags) => {
                self.playbin.set_property_from_value("flags", &flags);
                debug!("Set flag '{}' to {}", flag.nick(), enabled);
            }
            None => warn!("Could not build flags value"),
        }
    }

    fn set_visualization(&self, name: Option<&str>) -> Result<(), PipelineError> {
        let element = match name {
            Some(name) => Some(gst::ElementFactory::make(name).build().map_err(|_| {
                PipelineError::new(format!("Could not create visualization '{}'", name))
            })?),
            None => None,
        };
        self.playbin.set_property("vis-plugin", element);
        Ok(())
    }

    fn current_visualization(&self) -> Option<String> {
        let element = self.playbin.property::<Option<gst::Element>>("vis-plugin")?;
        element.factory().map(|factory| factory.name().to_string())
    }

    fn color_balance_channels(&self) -> Vec<ColorBalanceChannel> {
        let Some(balance) = self.color_balance() else {
            return Vec::new();
        };
        balance
            .list_channels()
            .iter()
            .map(|channel| ColorBalanceChannel {
                label: channel.label().to_string(),
                min_value: channel.min_value(),
                max_value: channel.max_value(),
            })
            .collect()
    }

    fn color_balance_value(&self, label: &str) -> Option<i32> {
        let channel = self.find_channel(label)?;
        Some(self.color_balance()?.value(&channel))
    }

    fn set_color_balance_value(&self, label: &str, value: i32) {
        let (Some(balance), Some(channel)) = (self.color_balance(), self.find_channel(label)) else {
            warn!("No color balance channel '{}'", label);
            return;
        };
        balance.set_value(&channel, value);
    }

    fn set_video_sink(&self, sink: VideoSink) -> Result<(), PipelineError> {
        let sink = sink
            .downcast::<gst::Element>()
            .map_err(|_| PipelineError::new("video sink is not a GStreamer element"))?;
        self.playbin.set_property("video-sink", *sink);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GStreamerPipeline {
    fn drop(&mut self) {
        if let Some((pad, handler)) = self.video_caps_watch.lock().unwrap().take() {
            pad.disconnect(handler);
        }
        self.bus.unset_sync_handler();
        let _ = self.playbin.set_state(gst::State::Null);
    }
}
