use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use mediaplay_traits::{PipelineFactory, PlayFlag, Pipeline, PipelineState, StreamKind};

use crate::config::{PlayerConfig, MAX_POSITION_UPDATE_INTERVAL_MS};
use crate::dispatcher::SignalDispatcher;
use crate::event_loop::LoopMsg;
use crate::metadata::{MediaInfo, StreamInfo};
use crate::signals::HandlerId;
use crate::video::VideoRenderer;
use crate::worker::{PlayerCore, Shared};
use crate::{ColorBalanceType, PlaybackState, PlayerError, PlayerEvent};

const MIN_RATE: f64 = -64.0;
const MAX_RATE: f64 = 64.0;
const MAX_VOLUME: f64 = 10.0;

type Startup = Arc<(Mutex<Option<Result<Arc<dyn Pipeline>, PlayerError>>>, Condvar)>;

macro_rules! connect_signal {
    ($(#[$attr:meta])* $connect:ident, $signal:ident, $payload:ty) => {
        $(#[$attr])*
        pub fn $connect<F>(&self, handler: F) -> HandlerId
        where
            F: Fn(&$payload) + Send + Sync + 'static,
        {
            self.shared.signals.$signal.connect(handler)
        }
    };
}

/// A media player running on its own thread.
///
/// Every mutating call returns immediately; the work happens on the
/// player thread, and its outcome is reported through the `connect_*`
/// events. Dropping the player stops that thread.
pub struct Player {
    shared: Arc<Shared>,
    pipeline: Arc<dyn Pipeline>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Player {
    pub fn new(
        factory: Box<dyn PipelineFactory>,
        video_renderer: Option<Box<dyn VideoRenderer>>,
        dispatcher: Option<Arc<dyn SignalDispatcher>>,
    ) -> Result<Player, PlayerError> {
        Player::with_config(factory, video_renderer, dispatcher, PlayerConfig::default())
    }

    pub fn with_config(
        factory: Box<dyn PipelineFactory>,
        video_renderer: Option<Box<dyn VideoRenderer>>,
        dispatcher: Option<Arc<dyn SignalDispatcher>>,
        config: PlayerConfig,
    ) -> Result<Player, PlayerError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared::new(config, dispatcher, sender));
        let startup: Startup = Arc::new((Mutex::new(None), Condvar::new()));

        let thread_shared = shared.clone();
        let thread_startup = startup.clone();
        let thread = thread::Builder::new()
            .name("mediaplay-player".to_owned())
            .spawn(move || {
                let (lock, cvar) = &*thread_startup;
                let pipeline = match factory.create_pipeline(thread_shared.bus_sender()) {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        error!("Could not create the pipeline: {}", e);
                        *lock.lock().unwrap() = Some(Err(PlayerError::Failed(e.message)));
                        cvar.notify_one();
                        return;
                    }
                };

                if let Some(renderer) = video_renderer {
                    if let Some(sink) = renderer.create_video_sink(&*pipeline) {
                        if let Err(e) = pipeline.set_video_sink(sink) {
                            warn!("Could not install the video sink: {}", e);
                        }
                    }
                }

                let core = PlayerCore::new(thread_shared, pipeline.clone());
                *lock.lock().unwrap() = Some(Ok(pipeline));
                cvar.notify_one();
                core.run(receiver);
            })
            .map_err(|e| PlayerError::Failed(format!("Could not spawn player thread: {}", e)))?;

        let (lock, cvar) = &*startup;
        let mut started = lock.lock().unwrap();
        while started.is_none() {
            started = cvar.wait(started).unwrap();
        }
        let result = started.take();
        drop(started);

        let pipeline = match result {
            Some(Ok(pipeline)) => pipeline,
            Some(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            None => return Err(PlayerError::Disconnected),
        };

        Ok(Player {
            shared,
            pipeline,
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    pub fn play(&self) -> Result<(), PlayerError> {
        self.shared.post_task(|core| core.play())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.shared.post_task(|core| core.pause())
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        self.shared.post_task(|core| core.stop())
    }

    /// Seeks to `position` nanoseconds. Rapid calls are coalesced and only
    /// the last position is applied.
    pub fn seek(&self, position: u64) -> Result<(), PlayerError> {
        self.shared.request_seek(position)
    }

    /// Changes the playback rate. Negative rates play backwards; 0 is
    /// rejected.
    pub fn set_rate(&self, rate: f64) -> Result<(), PlayerError> {
        if rate == 0.0 || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(PlayerError::InvalidArgument(format!(
                "rate {} is outside [{}, {}] or zero",
                rate, MIN_RATE, MAX_RATE
            )));
        }

        let position = self.pipeline.query_position().unwrap_or(0);
        let mut session = self.shared.session.lock().unwrap();
        session.rate = rate;
        let seekable = session
            .media_info
            .as_ref()
            .map_or(true, |info| info.seekable);
        if !seekable {
            debug!("Media is not seekable, rate {} is kept without seeking", rate);
            return Ok(());
        }
        session.seek_position = Some(position);
        if session.seek_source.is_none() && !session.seek_pending {
            self.shared.schedule_seek(&mut session, std::time::Duration::ZERO)?;
        }
        Ok(())
    }

    pub fn rate(&self) -> f64 {
        self.shared.session.lock().unwrap().rate
    }

    pub fn set_uri(&self, uri: Option<&str>) -> Result<(), PlayerError> {
        {
            let mut session = self.shared.session.lock().unwrap();
            session.uri = uri.map(str::to_owned);
            session.media_info = None;
        }
        self.shared.post_task(|core| core.set_uri())
    }

    pub fn uri(&self) -> Option<String> {
        self.shared.session.lock().unwrap().uri.clone()
    }

    pub fn set_subtitle_uri(&self, uri: Option<&str>) -> Result<(), PlayerError> {
        self.shared.session.lock().unwrap().subtitle_uri = uri.map(str::to_owned);
        self.shared.post_task(|core| core.set_subtitle_uri())
    }

    pub fn subtitle_uri(&self) -> Option<String> {
        self.pipeline.current_subtitle_uri()
    }

    /// Current position in nanoseconds, if the pipeline knows it.
    pub fn position(&self) -> Option<u64> {
        self.pipeline.query_position()
    }

    pub fn duration(&self) -> Option<u64> {
        self.pipeline.query_duration()
    }

    pub fn set_position_update_interval(&self, interval_ms: u32) -> Result<(), PlayerError> {
        if interval_ms > MAX_POSITION_UPDATE_INTERVAL_MS {
            return Err(PlayerError::InvalidArgument(format!(
                "position update interval {}ms exceeds {}ms",
                interval_ms, MAX_POSITION_UPDATE_INTERVAL_MS
            )));
        }
        self.shared
            .session
            .lock()
            .unwrap()
            .position_update_interval_ms = interval_ms;
        self.shared.post_task(|core| core.refresh_tick_source())
    }

    pub fn position_update_interval(&self) -> u32 {
        self.shared
            .session
            .lock()
            .unwrap()
            .position_update_interval_ms
    }

    pub fn volume(&self) -> f64 {
        self.pipeline.volume()
    }

    /// Sets the linear volume, 1.0 being 100%.
    pub fn set_volume(&self, volume: f64) -> Result<(), PlayerError> {
        if !(0.0..=MAX_VOLUME).contains(&volume) {
            return Err(PlayerError::InvalidArgument(format!(
                "volume {} is outside [0, {}]",
                volume, MAX_VOLUME
            )));
        }
        self.pipeline.set_volume(volume);
        Ok(())
    }

    pub fn is_muted(&self) -> bool {
        self.pipeline.is_muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.pipeline.set_muted(muted);
    }

    /// Whether the current source is live, such as a capture device.
    pub fn is_live(&self) -> bool {
        self.shared.is_live()
    }

    /// The pipeline behind this player, for engine specific tweaks.
    pub fn pipeline(&self) -> Arc<dyn Pipeline> {
        self.pipeline.clone()
    }

    /// A private copy of the current media description.
    pub fn media_info(&self) -> Option<MediaInfo> {
        let published = self.shared.session.lock().unwrap().media_info.clone();
        published.map(|info| MediaInfo::clone(&info))
    }

    fn current_track(&self, kind: StreamKind, flag: PlayFlag) -> Option<StreamInfo> {
        if !self.pipeline.is_flag_set(flag) {
            debug!("{} is disabled", kind);
            return None;
        }
        let index = self.pipeline.current_stream(kind);
        let session = self.shared.session.lock().unwrap();
        let stream = session.media_info.as_ref()?.stream(kind, index).cloned();
        if stream.is_none() {
            debug!("No current {} stream", kind);
        }
        stream
    }

    pub fn current_audio_track(&self) -> Option<StreamInfo> {
        self.current_track(StreamKind::Audio, PlayFlag::Audio)
    }

    pub fn current_video_track(&self) -> Option<StreamInfo> {
        self.current_track(StreamKind::Video, PlayFlag::Video)
    }

    pub fn current_subtitle_track(&self) -> Option<StreamInfo> {
        self.current_track(StreamKind::Subtitle, PlayFlag::Subtitle)
    }

    fn select_track(&self, kind: StreamKind, index: i32) -> Result<(), PlayerError> {
        let known = {
            let session = self.shared.session.lock().unwrap();
            session
                .media_info
                .as_ref()
                .map_or(false, |info| info.stream(kind, index).is_some())
        };
        if !known {
            warn!("Invalid {} stream index {}", kind, index);
            return Err(PlayerError::StreamNotFound(kind, index));
        }
        self.pipeline.set_current_stream(kind, index);
        debug!("Set {} stream to {}", kind, index);
        Ok(())
    }

    pub fn set_audio_track(&self, index: i32) -> Result<(), PlayerError> {
        self.select_track(StreamKind::Audio, index)
    }

    pub fn set_video_track(&self, index: i32) -> Result<(), PlayerError> {
        self.select_track(StreamKind::Video, index)
    }

    pub fn set_subtitle_track(&self, index: i32) -> Result<(), PlayerError> {
        self.select_track(StreamKind::Subtitle, index)
    }

    pub fn set_audio_track_enabled(&self, enabled: bool) {
        self.pipeline.set_flag(PlayFlag::Audio, enabled);
    }

    pub fn set_video_track_enabled(&self, enabled: bool) {
        self.pipeline.set_flag(PlayFlag::Video, enabled);
    }

    pub fn set_subtitle_track_enabled(&self, enabled: bool) {
        self.pipeline.set_flag(PlayFlag::Subtitle, enabled);
    }

    pub fn set_visualization_enabled(&self, enabled: bool) {
        self.pipeline.set_flag(PlayFlag::Visualization, enabled);
    }

    /// Selects the visualization element by name; `None` restores the default.
    pub fn set_visualization(&self, name: Option<&str>) -> Result<(), PlayerError> {
        self.pipeline.set_visualization(name).map_err(|e| {
            warn!("{}", e);
            PlayerError::VisualizationNotFound(name.unwrap_or_default().to_owned())
        })
    }

    /// Name of the visualization in use, `None` while visualizations are disabled.
    pub fn current_visualization(&self) -> Option<String> {
        if !self.pipeline.is_flag_set(PlayFlag::Visualization) {
            return None;
        }
        self.pipeline.current_visualization()
    }

    pub fn has_color_balance(&self) -> bool {
        !self.pipeline.color_balance_channels().is_empty()
    }

    /// Sets a color balance property, `value` ranging from 0.0 to 1.0.
    pub fn set_color_balance(&self, kind: ColorBalanceType, value: f64) -> Result<(), PlayerError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(PlayerError::InvalidArgument(format!(
                "{} value {} is outside [0, 1]",
                kind.name(),
                value
            )));
        }
        let channel = self
            .pipeline
            .color_balance_channels()
            .into_iter()
            .find(|channel| channel.label.contains(kind.channel_label()))
            .ok_or(PlayerError::ColorBalanceUnavailable)?;

        let range = (channel.max_value - channel.min_value) as f64;
        let raw = (value * range + channel.min_value as f64).round() as i32;
        self.pipeline.set_color_balance_value(&channel.label, raw);
        Ok(())
    }

    /// Current value of a color balance property, from 0.0 to 1.0.
    pub fn color_balance(&self, kind: ColorBalanceType) -> Option<f64> {
        let channel = self
            .pipeline
            .color_balance_channels()
            .into_iter()
            .find(|channel| channel.label.contains(kind.channel_label()))?;
        let raw = self.pipeline.color_balance_value(&channel.label)?;
        let range = (channel.max_value - channel.min_value) as f64;
        if range <= 0.0 {
            return None;
        }
        Some((raw - channel.min_value) as f64 / range)
    }

    connect_signal!(connect_buffering, buffering, i32);
    connect_signal!(
        /// Nanoseconds; `None` when the duration is unknown.
        connect_duration_changed,
        duration_changed,
        Option<u64>
    );
    connect_signal!(connect_end_of_stream, end_of_stream, ());
    connect_signal!(connect_error, error, PlayerError);
    connect_signal!(connect_media_info_updated, media_info_updated, MediaInfo);
    connect_signal!(connect_mute_changed, mute_changed, ());
    connect_signal!(connect_position_updated, position_updated, u64);
    connect_signal!(connect_seek_done, seek_done, u64);
    connect_signal!(connect_state_changed, state_changed, PlaybackState);
    connect_signal!(
        /// Display width (pixel aspect ratio applied) and height; 0x0 when unknown.
        connect_video_dimensions_changed,
        video_dimensions_changed,
        (i32, i32)
    );
    connect_signal!(connect_volume_changed, volume_changed, ());
    connect_signal!(connect_warning, warning, PlayerError);

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.shared.signals.disconnect(id)
    }

    /// Forwards every event to `sender` as a [`PlayerEvent`].
    pub fn forward_events(&self, sender: Sender<PlayerEvent>) -> Vec<HandlerId> {
        let sender = Arc::new(Mutex::new(sender));
        let forward = move |event: PlayerEvent| {
            let _ = sender.lock().unwrap().send(event);
        };

        let player = self;
        macro_rules! forward {
            ($connect:ident, |$arg:ident| $event:expr) => {{
                let forward = forward.clone();
                player.$connect(move |$arg| forward($event))
            }};
        }

        vec![
            forward!(connect_buffering, |percent| PlayerEvent::Buffering(*percent)),
            forward!(connect_duration_changed, |duration| {
                PlayerEvent::DurationChanged(*duration)
            }),
            forward!(connect_end_of_stream, |_unit| PlayerEvent::EndOfStream),
            forward!(connect_error, |error| PlayerEvent::Error(error.clone())),
            forward!(connect_media_info_updated, |info| {
                PlayerEvent::MediaInfoUpdated(info.clone())
            }),
            forward!(connect_mute_changed, |_unit| PlayerEvent::MuteChanged),
            forward!(connect_position_updated, |position| {
                PlayerEvent::PositionUpdated(*position)
            }),
            forward!(connect_seek_done, |position| PlayerEvent::SeekDone(*position)),
            forward!(connect_state_changed, |state| PlayerEvent::StateChanged(*state)),
            forward!(connect_video_dimensions_changed, |dimensions| {
                PlayerEvent::VideoDimensionsChanged(dimensions.0, dimensions.1)
            }),
            forward!(connect_volume_changed, |_unit| PlayerEvent::VolumeChanged),
            forward!(connect_warning, |warning| PlayerEvent::Warning(warning.clone())),
        ]
    }

    /// The state the player thread is driving the pipeline towards.
    pub fn target_state(&self) -> PipelineState {
        self.shared.target_state()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if thread::current().id() == self.thread_id {
            error!("Player dropped from its own thread, leaking the player thread");
            let _ = self.shared.post(LoopMsg::Quit);
            return;
        }
        if self.shared.post(LoopMsg::Quit).is_err() {
            debug!("Player thread already gone");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Player thread panicked");
            }
        }
        let pending = self.shared.emissions_in_flight();
        if pending > 0 {
            debug!("{} emissions still queued at shutdown", pending);
        }
    }
}
