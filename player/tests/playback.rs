use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mediaplay_dummy::{DummyBackend, DummyMedia, DummyPipeline, DummyStream};
use mediaplay_player::dispatcher::dispatch_context;
use mediaplay_player::traits::{
    tags, BusMessage, Caps, CapsValue, ElementMessage, Fraction, Pipeline, PipelineState,
    StreamKind, TagList, TagScope, TagValue,
};
use mediaplay_player::{
    ColorBalanceType, PlaybackState, Player, PlayerConfig, PlayerError, PlayerEvent,
};

const SECOND: u64 = 1_000_000_000;
const TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn movie() -> DummyMedia {
    DummyMedia::default()
        .with_stream(
            DummyStream::new(StreamKind::Video).with_caps(
                Caps::new("video/x-h264")
                    .field("width", CapsValue::Int(1280))
                    .field("height", CapsValue::Int(720))
                    .field("framerate", CapsValue::Fraction(Fraction::new(25, 1))),
            ),
        )
        .with_stream(
            DummyStream::new(StreamKind::Audio).with_tags(
                TagList::new(TagScope::Stream)
                    .with(tags::LANGUAGE_CODE, TagValue::Str("en".into())),
            ),
        )
}

struct Harness {
    player: Player,
    pipeline: Arc<DummyPipeline>,
    events: Receiver<PlayerEvent>,
}

impl Harness {
    fn new(media: DummyMedia) -> Harness {
        Harness::with_config(media, PlayerConfig::default())
    }

    fn with_config(media: DummyMedia, config: PlayerConfig) -> Harness {
        init_logging();
        let backend = DummyBackend::new(media);
        let pipeline = backend.pipeline();
        let player = Player::with_config(Box::new(backend), None, None, config).unwrap();
        let (sender, events) = mpsc::channel();
        player.forward_events(sender);
        Harness {
            player,
            pipeline,
            events,
        }
    }

    /// Events up to and including the first one `matches` accepts.
    fn events_until<F>(&self, matches: F) -> Vec<PlayerEvent>
    where
        F: Fn(&PlayerEvent) -> bool,
    {
        let deadline = Instant::now() + TIMEOUT;
        let mut seen = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    let done = matches(&event);
                    seen.push(event);
                    if done {
                        return seen;
                    }
                }
                Err(e) => panic!("no matching event ({:?}), saw {:?}", e, seen),
            }
        }
    }

    fn wait_for<F>(&self, matches: F) -> PlayerEvent
    where
        F: Fn(&PlayerEvent) -> bool,
    {
        self.events_until(matches).pop().unwrap()
    }

    fn wait_for_state(&self, state: PlaybackState) {
        self.wait_for(|event| *event == PlayerEvent::StateChanged(state));
    }

    /// Events arriving within `window`.
    fn drain_for(&self, window: Duration) -> Vec<PlayerEvent> {
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while let Ok(event) = self
            .events
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            seen.push(event);
        }
        seen
    }

    fn start_playing(&self) {
        self.player.set_uri(Some("file:///movie.mp4")).unwrap();
        self.player.play().unwrap();
        self.wait_for_state(PlaybackState::Playing);
    }

    fn start_paused(&self) {
        self.player.set_uri(Some("file:///movie.mp4")).unwrap();
        self.player.pause().unwrap();
        self.wait_for_state(PlaybackState::Paused);
    }

    /// Posts a decoder error and returns the events up to the reset.
    fn fail_decoding(&self) -> Vec<PlayerEvent> {
        self.pipeline.post(BusMessage::Error(ElementMessage {
            source_path: "/playbin/decoder".into(),
            message: "Internal data stream error".into(),
            debug: None,
        }));
        self.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Stopped))
    }

    fn assert_released(&self) {
        assert_eq!(self.player.media_info(), None);
        assert_eq!(self.pipeline.state(), PipelineState::Null);
        assert_eq!(self.player.target_state(), PipelineState::Null);
    }
}

fn decoding_error() -> PlayerEvent {
    PlayerEvent::Error(PlayerError::Failed(
        "Error from element /playbin/decoder: Internal data stream error".into(),
    ))
}

fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn play_reports_media_before_playing() {
    let harness = Harness::new(movie());
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    harness.player.play().unwrap();

    let events =
        harness.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Playing));
    assert_eq!(events.len(), 6, "{:?}", events);
    assert_eq!(events[0], PlayerEvent::StateChanged(PlaybackState::Buffering));
    match events[1] {
        PlayerEvent::MediaInfoUpdated(ref info) => {
            assert_eq!(info.uri.as_deref(), Some("file:///movie.mp4"));
            assert_eq!(info.number_of_streams(), 2);
            assert!(info.seekable);
        }
        ref other => panic!("expected media info, got {:?}", other),
    }
    assert_eq!(events[2], PlayerEvent::VideoDimensionsChanged(1280, 720));
    assert_eq!(events[3], PlayerEvent::DurationChanged(Some(60 * SECOND)));
    assert_eq!(events[4], PlayerEvent::PositionUpdated(0));

    assert_eq!(harness.player.target_state(), PipelineState::Playing);
    assert_eq!(harness.pipeline.state(), PipelineState::Playing);
    assert!(harness.pipeline.is_watching_video());

    // Position updates keep coming while playing.
    harness.wait_for(|event| matches!(event, PlayerEvent::PositionUpdated(_)));
}

#[test]
fn play_without_uri_does_nothing() {
    let harness = Harness::new(movie());
    harness.player.play().unwrap();
    assert!(harness.drain_for(Duration::from_millis(200)).is_empty());
    assert_eq!(harness.player.target_state(), PipelineState::Null);
}

#[test]
fn failing_backend_fails_construction() {
    init_logging();
    let result = Player::new(Box::new(DummyBackend::failing()), None, None);
    assert!(matches!(result, Err(PlayerError::Failed(_))));
}

#[test]
fn rapid_seeks_are_coalesced() {
    let harness = Harness::new(movie());
    harness.start_paused();

    harness.player.seek(SECOND).unwrap();
    harness.player.seek(2 * SECOND).unwrap();
    harness.player.seek(3 * SECOND).unwrap();

    harness.wait_for(|event| *event == PlayerEvent::SeekDone(3 * SECOND));

    let extra = harness.drain_for(Duration::from_millis(500));
    assert!(
        !extra.iter().any(|e| matches!(e, PlayerEvent::SeekDone(_))),
        "{:?}",
        extra
    );

    let seeks = harness.pipeline.seeks();
    assert!(!seeks.is_empty() && seeks.len() < 3, "{:?}", seeks);
    assert_eq!(seeks.last().unwrap().target_position(), 3 * SECOND);
    assert_eq!(harness.player.position(), Some(3 * SECOND));
}

#[test]
fn seek_while_playing_resumes_playback() {
    let harness = Harness::new(movie());
    harness.start_playing();

    harness.player.seek(10 * SECOND).unwrap();
    harness.wait_for(|event| *event == PlayerEvent::SeekDone(10 * SECOND));
    assert!(eventually(|| harness.pipeline.state() == PipelineState::Playing));

    let seek = harness.pipeline.seeks().pop().unwrap();
    assert_eq!(seek.rate, 1.0);
    assert!(seek.flush);
    assert!(!seek.trickmode);
}

#[test]
fn seek_before_preroll_is_applied_once_paused() {
    let harness = Harness::new(movie());
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    harness.player.seek(5 * SECOND).unwrap();
    harness.player.pause().unwrap();

    harness.wait_for(|event| *event == PlayerEvent::SeekDone(5 * SECOND));
    harness.wait_for_state(PlaybackState::Paused);
    assert_eq!(harness.pipeline.seeks().len(), 1);
}

#[test]
fn seeks_before_preroll_collapse_into_one() {
    let harness = Harness::new(movie());
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    for n in 1..=10 {
        harness.player.seek(n * SECOND).unwrap();
    }
    harness.player.pause().unwrap();

    harness.wait_for(|event| *event == PlayerEvent::SeekDone(10 * SECOND));
    harness.wait_for_state(PlaybackState::Paused);
    let extra = harness.drain_for(Duration::from_millis(400));
    assert!(
        !extra.iter().any(|e| matches!(e, PlayerEvent::SeekDone(_))),
        "{:?}",
        extra
    );

    let targets: Vec<u64> = harness
        .pipeline
        .seeks()
        .iter()
        .map(|seek| seek.target_position())
        .collect();
    assert_eq!(targets, vec![10 * SECOND]);
}

#[test]
fn failed_seek_is_an_error() {
    let harness = Harness::new(movie());
    harness.start_paused();
    harness.pipeline.set_fail_seeks(true);

    harness.player.seek(5 * SECOND).unwrap();
    let events =
        harness.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Stopped));
    assert!(
        events.contains(&PlayerEvent::Error(PlayerError::Failed(
            "Failed to seek to 0:00:05.000000000".into()
        ))),
        "{:?}",
        events
    );
    harness.assert_released();
}

#[test]
fn seeks_on_unseekable_media_are_dropped() {
    let harness = Harness::new(movie().not_seekable());
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    // Accepted: nothing is known about the media yet.
    harness.player.seek(5 * SECOND).unwrap();
    harness.player.pause().unwrap();

    let events =
        harness.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Paused));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PlayerEvent::Error(_) | PlayerEvent::SeekDone(_))),
        "{:?}",
        events
    );
    assert!(harness.pipeline.seeks().is_empty());
    assert!(!harness.player.media_info().unwrap().seekable);

    assert_eq!(
        harness.player.seek(SECOND),
        Err(PlayerError::NonSeekableStream)
    );
    harness.player.set_rate(0.5).unwrap();
    assert_eq!(harness.player.rate(), 0.5);

    let after = harness.drain_for(Duration::from_millis(400));
    assert!(
        !after.iter().any(|e| matches!(e, PlayerEvent::Error(_))),
        "{:?}",
        after
    );
    assert!(harness.pipeline.seeks().is_empty());
    assert_eq!(harness.pipeline.state(), PipelineState::Paused);
}

#[test]
fn rate_changes_on_live_sources_keep_playing() {
    let harness = Harness::new(movie().live().with_duration(None));
    harness.player.set_uri(Some("v4l2:///dev/video0")).unwrap();
    harness.player.play().unwrap();
    harness.wait_for_state(PlaybackState::Playing);
    assert_eq!(harness.player.media_info().unwrap().duration, None);

    harness.player.set_rate(2.0).unwrap();
    assert_eq!(harness.player.rate(), 2.0);

    let events = harness.drain_for(Duration::from_millis(400));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PlayerEvent::Error(_) | PlayerEvent::StateChanged(_))),
        "{:?}",
        events
    );
    assert!(harness.pipeline.seeks().is_empty());
    assert_eq!(harness.pipeline.state(), PipelineState::Playing);
}

#[test]
fn rate_changes_reseek_the_pipeline() {
    let harness = Harness::new(movie());
    assert!(matches!(
        harness.player.set_rate(0.0),
        Err(PlayerError::InvalidArgument(_))
    ));
    assert!(harness.player.set_rate(65.0).is_err());
    assert_eq!(harness.player.rate(), 1.0);

    harness.start_paused();
    harness.pipeline.set_position(4 * SECOND);
    harness.player.set_rate(-10.0).unwrap();
    assert_eq!(harness.player.rate(), -10.0);

    assert!(eventually(|| !harness.pipeline.seeks().is_empty()));
    let seek = harness.pipeline.seeks().pop().unwrap();
    assert_eq!(seek.rate, -10.0);
    assert_eq!((seek.start, seek.stop), (Some(0), Some(4 * SECOND)));
    assert!(seek.trickmode);
}

#[test]
fn errors_reset_to_stopped() {
    let harness = Harness::new(movie());
    harness.start_playing();
    assert!(harness.player.media_info().is_some());

    let events = harness.fail_decoding();
    assert!(events.contains(&decoding_error()));
    harness.assert_released();

    // Ticking stopped with the error.
    let after = harness.drain_for(Duration::from_millis(300));
    assert!(
        !after.iter().any(|e| matches!(e, PlayerEvent::PositionUpdated(_))),
        "{:?}",
        after
    );
}

#[test]
fn errors_while_buffering_reset_to_stopped() {
    let harness = Harness::new(movie());
    harness.start_playing();
    harness.pipeline.post(BusMessage::Buffering(40));
    harness.wait_for_state(PlaybackState::Buffering);

    let events = harness.fail_decoding();
    assert!(events.contains(&decoding_error()));
    harness.assert_released();

    // Late buffering news must not revive playback.
    harness.pipeline.post(BusMessage::Buffering(100));
    let after = harness.drain_for(Duration::from_millis(300));
    assert!(
        !after
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(_) | PlayerEvent::Buffering(_))),
        "{:?}",
        after
    );
}

#[test]
fn errors_with_a_seek_in_flight_reset_to_stopped() {
    let harness = Harness::new(movie());
    harness.start_paused();

    harness.pipeline.hold_state_changes(true);
    harness.player.seek(5 * SECOND).unwrap();
    assert!(eventually(|| harness.pipeline.seeks().len() == 1));

    let events = harness.fail_decoding();
    assert!(events.contains(&decoding_error()));
    assert!(!events.iter().any(|e| matches!(e, PlayerEvent::SeekDone(_))));
    harness.assert_released();

    // The flush dropped the held preroll; nothing of the old seek survives.
    harness.pipeline.hold_state_changes(false);
    harness.player.pause().unwrap();
    let events =
        harness.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Paused));
    assert!(!events.iter().any(|e| matches!(e, PlayerEvent::SeekDone(_))));
    assert_eq!(harness.pipeline.seeks().len(), 1);
    assert!(harness.player.media_info().is_some());
}

#[test]
fn errors_during_preroll_reset_to_stopped() {
    let harness = Harness::new(movie());
    harness.pipeline.hold_state_changes(true);
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    harness.player.seek(5 * SECOND).unwrap();
    harness.player.pause().unwrap();
    harness.wait_for_state(PlaybackState::Buffering);

    let events = harness.fail_decoding();
    assert!(events.contains(&decoding_error()));
    harness.assert_released();

    harness.pipeline.hold_state_changes(false);
    let after = harness.drain_for(Duration::from_millis(400));
    assert!(
        !after.iter().any(|e| matches!(
            e,
            PlayerEvent::MediaInfoUpdated(_) | PlayerEvent::SeekDone(_) | PlayerEvent::StateChanged(_)
        )),
        "{:?}",
        after
    );
    assert!(harness.pipeline.seeks().is_empty());
    assert_eq!(harness.pipeline.state(), PipelineState::Null);
}

#[test]
fn failed_state_change_is_an_error() {
    let harness = Harness::new(movie());
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    harness.pipeline.set_fail_state_changes(true);
    harness.player.play().unwrap();

    let error = harness.wait_for(|event| matches!(event, PlayerEvent::Error(_)));
    assert_eq!(
        error,
        PlayerEvent::Error(PlayerError::Failed("Failed to play".into()))
    );
}

#[test]
fn stop_resets_rate_and_media_info() {
    let harness = Harness::new(movie());
    harness.start_playing();
    harness.player.set_rate(2.0).unwrap();

    harness.player.stop().unwrap();
    harness.wait_for_state(PlaybackState::Stopped);
    assert_eq!(harness.player.rate(), 1.0);
    assert_eq!(harness.player.media_info(), None);
    assert_eq!(harness.pipeline.state(), PipelineState::Ready);
}

#[test]
fn set_uri_clears_media_info_immediately() {
    let harness = Harness::new(movie());
    harness.start_playing();
    assert!(harness.player.media_info().is_some());

    harness.player.set_uri(Some("file:///other.mp4")).unwrap();
    assert_eq!(harness.player.media_info(), None);
    assert_eq!(harness.player.uri().as_deref(), Some("file:///other.mp4"));
    assert!(eventually(
        || harness.pipeline.uri().as_deref() == Some("file:///other.mp4")
    ));
}

#[test]
fn media_info_is_a_private_copy() {
    let harness = Harness::new(movie());
    harness.start_playing();

    let mut copy = harness.player.media_info().unwrap();
    copy.title = Some("Changed by the caller".into());
    copy.streams.clear();

    let fresh = harness.player.media_info().unwrap();
    assert_eq!(fresh.title, None);
    assert_eq!(fresh.number_of_streams(), 2);
}

#[test]
fn tags_update_the_published_media_info() {
    let harness = Harness::new(movie());
    harness.start_playing();

    harness.pipeline.post(BusMessage::Tag(
        TagList::new(TagScope::Global).with(tags::TITLE, TagValue::Str("Big Buck Bunny".into())),
    ));
    let updated = harness.wait_for(|event| matches!(event, PlayerEvent::MediaInfoUpdated(_)));
    match updated {
        PlayerEvent::MediaInfoUpdated(info) => {
            assert_eq!(info.title.as_deref(), Some("Big Buck Bunny"))
        }
        _ => unreachable!(),
    }
    assert_eq!(
        harness.player.media_info().unwrap().title.as_deref(),
        Some("Big Buck Bunny")
    );

    // Stream tags are re-read when the pipeline says they changed.
    let relabelled = movie().with_stream(DummyStream::new(StreamKind::Audio).with_tags(
        TagList::new(TagScope::Stream).with(tags::LANGUAGE_NAME, TagValue::Str("Klingon".into())),
    ));
    harness.pipeline.set_media(relabelled);
    harness
        .pipeline
        .post(BusMessage::StreamTagsChanged(StreamKind::Audio, 0));
    harness.wait_for(|event| matches!(event, PlayerEvent::MediaInfoUpdated(_)));
    harness.pipeline.post(BusMessage::StreamsChanged(StreamKind::Audio));
    assert!(eventually(|| {
        harness
            .player
            .media_info()
            .map_or(false, |info| info.audio_streams().count() == 2)
    }));
    harness.player.set_audio_track(1).unwrap();
    let track = harness.player.current_audio_track().unwrap();
    assert_eq!(track.audio().unwrap().language.as_deref(), Some("Klingon"));
}

#[test]
fn new_streams_refresh_the_title() {
    let harness = Harness::new(movie());
    harness.start_playing();
    assert_eq!(harness.player.media_info().unwrap().title, None);

    let recut = movie().with_stream(DummyStream::new(StreamKind::Video).with_tags(
        TagList::new(TagScope::Stream).with(tags::TITLE, TagValue::Str("Director's cut".into())),
    ));
    harness.pipeline.set_media(recut);
    harness.pipeline.post(BusMessage::StreamsChanged(StreamKind::Video));

    match harness.wait_for(|event| matches!(event, PlayerEvent::MediaInfoUpdated(_))) {
        PlayerEvent::MediaInfoUpdated(info) => {
            assert_eq!(info.video_streams().count(), 2);
            assert_eq!(info.title.as_deref(), Some("Director's cut"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn tracks_follow_the_enabled_flags() {
    let harness = Harness::new(movie());
    harness.start_paused();

    let video = harness.player.current_video_track().unwrap();
    assert_eq!(video.codec.as_deref(), Some("H.264"));
    let audio = harness.player.current_audio_track().unwrap();
    assert_eq!(audio.audio().unwrap().language.as_deref(), Some("English"));
    assert!(harness.player.current_subtitle_track().is_none());

    harness.player.set_video_track_enabled(false);
    assert!(harness.player.current_video_track().is_none());
    harness.player.set_video_track_enabled(true);
    assert!(harness.player.current_video_track().is_some());

    assert_eq!(
        harness.player.set_audio_track(3),
        Err(PlayerError::StreamNotFound(StreamKind::Audio, 3))
    );
}

#[test]
fn end_of_stream_then_play_restarts() {
    let harness = Harness::new(movie());
    harness.start_playing();

    harness.pipeline.post(BusMessage::Eos);
    let events =
        harness.events_until(|event| *event == PlayerEvent::StateChanged(PlaybackState::Stopped));
    assert!(events.contains(&PlayerEvent::EndOfStream));

    harness.player.play().unwrap();
    harness.wait_for_state(PlaybackState::Playing);
    assert_eq!(harness.pipeline.restarts(), 1);
    assert_eq!(harness.pipeline.state(), PipelineState::Playing);
}

#[test]
fn live_sources_cannot_seek() {
    let harness = Harness::new(movie().live());
    harness.player.set_uri(Some("v4l2:///dev/video0")).unwrap();
    harness.player.play().unwrap();
    harness.wait_for(|event| matches!(event, PlayerEvent::MediaInfoUpdated(_)));

    assert!(harness.player.is_live());
    assert_eq!(
        harness.player.seek(SECOND),
        Err(PlayerError::NonSeekableStream)
    );

    // Live pipelines ignore buffering.
    harness.pipeline.post(BusMessage::Buffering(10));
    let events = harness.drain_for(Duration::from_millis(200));
    assert!(!events.iter().any(|e| matches!(e, PlayerEvent::Buffering(_))));
}

#[test]
fn buffering_holds_playback_until_complete() {
    let harness = Harness::new(movie());
    harness.start_playing();

    harness.pipeline.post(BusMessage::Buffering(40));
    harness.wait_for_state(PlaybackState::Buffering);
    harness.wait_for(|event| *event == PlayerEvent::Buffering(40));
    assert!(eventually(|| harness.pipeline.state() == PipelineState::Paused));

    harness.pipeline.post(BusMessage::Buffering(100));
    harness.wait_for(|event| *event == PlayerEvent::Buffering(100));
    harness.wait_for_state(PlaybackState::Playing);
}

#[test]
fn stopped_pipeline_is_released_after_ready_timeout() {
    let config = PlayerConfig {
        ready_timeout_ms: 50,
        ..PlayerConfig::default()
    };
    let harness = Harness::with_config(movie(), config);
    harness.player.set_uri(Some("file:///movie.mp4")).unwrap();
    assert!(eventually(|| harness.pipeline.state() == PipelineState::Null));
    assert_eq!(
        harness.pipeline.requested_states(),
        vec![PipelineState::Ready, PipelineState::Null]
    );
}

#[test]
fn volume_is_range_checked() {
    let harness = Harness::new(movie());
    assert!(harness.player.set_volume(10.5).is_err());
    assert!(harness.player.set_volume(-0.1).is_err());

    harness.player.set_volume(0.5).unwrap();
    harness.wait_for(|event| *event == PlayerEvent::VolumeChanged);
    assert_eq!(harness.player.volume(), 0.5);

    harness.player.set_muted(true);
    harness.wait_for(|event| *event == PlayerEvent::MuteChanged);
    assert!(harness.player.is_muted());
}

#[test]
fn position_update_interval_is_bounded() {
    let harness = Harness::new(movie());
    assert!(harness.player.set_position_update_interval(10_001).is_err());
    harness.player.set_position_update_interval(0).unwrap();
    assert_eq!(harness.player.position_update_interval(), 0);

    harness.start_playing();
    let events = harness.drain_for(Duration::from_millis(300));
    assert!(!events.iter().any(|e| matches!(e, PlayerEvent::PositionUpdated(_))));
}

#[test]
fn visualizations_and_color_balance() {
    let harness = Harness::new(movie());

    assert!(harness.player.set_visualization(Some("goom")).is_ok());
    assert_eq!(harness.player.current_visualization(), None);
    harness.player.set_visualization_enabled(true);
    assert_eq!(harness.player.current_visualization().as_deref(), Some("goom"));
    assert_eq!(
        harness.player.set_visualization(Some("nope")),
        Err(PlayerError::VisualizationNotFound("nope".into()))
    );

    assert!(harness.player.has_color_balance());
    assert_eq!(harness.player.color_balance(ColorBalanceType::Hue), Some(0.5));
    harness
        .player
        .set_color_balance(ColorBalanceType::Hue, 0.75)
        .unwrap();
    assert_eq!(harness.player.color_balance(ColorBalanceType::Hue), Some(0.75));
    assert_eq!(harness.pipeline.color_balance_value("HUE"), Some(500));
    assert!(harness
        .player
        .set_color_balance(ColorBalanceType::Contrast, 1.5)
        .is_err());
}

#[test]
fn events_run_on_the_dispatch_context() {
    init_logging();
    let (dispatcher, context) = dispatch_context();
    let backend = DummyBackend::new(movie());
    let player = Player::new(Box::new(backend), None, Some(Arc::new(dispatcher))).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    let test_thread = thread::current().id();
    player.connect_state_changed(move |state| {
        assert_eq!(thread::current().id(), test_thread);
        handler_seen.lock().unwrap().push(*state);
    });

    player.set_uri(Some("file:///movie.mp4")).unwrap();
    player.play().unwrap();

    let deadline = Instant::now() + TIMEOUT;
    while !seen.lock().unwrap().contains(&PlaybackState::Playing) {
        assert!(Instant::now() < deadline, "never reached playing");
        context.iteration_timeout(Duration::from_millis(50));
    }
    assert_eq!(
        *seen.lock().unwrap(),
        vec![PlaybackState::Buffering, PlaybackState::Playing]
    );
}

#[test]
fn disconnected_handlers_stop_receiving() {
    let harness = Harness::new(movie());
    let count = Arc::new(Mutex::new(0));
    let handler_count = count.clone();
    let id = harness.player.connect_state_changed(move |_| {
        *handler_count.lock().unwrap() += 1;
    });
    assert!(harness.player.disconnect(id));
    assert!(!harness.player.disconnect(id));

    harness.start_playing();
    assert_eq!(*count.lock().unwrap(), 0);
}
