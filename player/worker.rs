//! The player thread: owns the pipeline's state machine and every timer.
//!
//! Application threads talk to it by posting tasks; the pipeline talks
//! to it through bus messages. Both arrive on the same queue and are
//! handled strictly in order.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mediaplay_traits::{
    BusMessage, BusSender, ElementMessage, Pipeline, PipelineState, SeekRequest,
    StateChangeSuccess, StreamKind, TagList, TagScope,
};

use crate::config::PlayerConfig;
use crate::dispatcher::{Cleanup, DispatchGuard, Emission, SignalDispatcher};
use crate::event_loop::{LoopMsg, TimerId, TimerKind, TimerQueue};
use crate::extract;
use crate::metadata::MediaInfo;
use crate::signals::Signals;
use crate::{PlaybackState, PlayerError};

/// Session state shared between the player thread and callers.
pub(crate) struct Session {
    pub uri: Option<String>,
    pub subtitle_uri: Option<String>,
    pub rate: f64,
    pub position_update_interval_ms: u32,
    /// A seek was sent and the pipeline has not prerolled after it yet.
    pub seek_pending: bool,
    /// Latest requested seek target, not yet sent.
    pub seek_position: Option<u64>,
    pub last_seek_time: Option<Instant>,
    /// The scheduled seek, if any. Only the matching timer may apply it.
    pub seek_source: Option<u64>,
    pub media_info: Option<Arc<MediaInfo>>,
    /// Global tags received before the media was described.
    pub global_tags: Option<TagList>,
}

#[derive(Clone, Copy, PartialEq)]
enum Gate {
    Always,
    /// Dropped if, at delivery time, the player no longer targets at
    /// least PAUSED.
    Prerolled,
}

pub(crate) struct Shared {
    pub session: Mutex<Session>,
    pub signals: Arc<Signals>,
    pub config: PlayerConfig,
    target_state: Arc<AtomicU8>,
    is_live: AtomicBool,
    bus_epoch: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    next_seek_source: AtomicU64,
    dispatcher: Option<Arc<dyn SignalDispatcher>>,
    sender: Sender<LoopMsg>,
}

impl Shared {
    pub fn new(
        config: PlayerConfig,
        dispatcher: Option<Arc<dyn SignalDispatcher>>,
        sender: Sender<LoopMsg>,
    ) -> Shared {
        Shared {
            session: Mutex::new(Session {
                uri: None,
                subtitle_uri: None,
                rate: 1.0,
                position_update_interval_ms: config.position_update_interval_ms,
                seek_pending: false,
                seek_position: None,
                last_seek_time: None,
                seek_source: None,
                media_info: None,
                global_tags: None,
            }),
            signals: Arc::new(Signals::default()),
            config,
            target_state: Arc::new(AtomicU8::new(PipelineState::Null.to_u8())),
            is_live: AtomicBool::new(false),
            bus_epoch: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            next_seek_source: AtomicU64::new(1),
            dispatcher,
            sender,
        }
    }

    pub fn target_state(&self) -> PipelineState {
        PipelineState::from_u8(self.target_state.load(Ordering::SeqCst))
    }

    pub fn is_live(&self) -> bool {
        self.is_live.load(Ordering::SeqCst)
    }

    /// Emissions handed to the dispatcher whose cleanup has not run yet.
    pub fn emissions_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn post(&self, msg: LoopMsg) -> Result<(), PlayerError> {
        self.sender.send(msg).map_err(|_| PlayerError::Disconnected)
    }

    pub fn post_task<F>(&self, task: F) -> Result<(), PlayerError>
    where
        F: FnOnce(&mut PlayerCore) + Send + 'static,
    {
        self.post(LoopMsg::Task(Box::new(task)))
    }

    /// Bus sender for the pipeline. Messages carry the flush epoch they
    /// were posted in, so that a flush also drops what is already queued.
    pub fn bus_sender(&self) -> BusSender {
        let sender = self.sender.clone();
        let epoch = self.bus_epoch.clone();
        BusSender::new(move |message| {
            let _ = sender.send(LoopMsg::Bus(epoch.load(Ordering::SeqCst), message));
        })
    }

    /// Records `position` as the seek target and makes sure a seek is
    /// scheduled. Requests arriving while one is in flight are coalesced;
    /// only the last position is applied.
    pub fn request_seek(&self, position: u64) -> Result<(), PlayerError> {
        let mut session = self.session.lock().unwrap();
        if let Some(info) = session.media_info.as_ref() {
            if !info.seekable {
                debug!("Media is not seekable");
                return Err(PlayerError::NonSeekableStream);
            }
        }

        session.seek_position = Some(position);
        if session.seek_source.is_some() {
            return Ok(());
        }

        let debounce = self.config.seek_debounce();
        let delay = match session.last_seek_time {
            Some(last) if session.seek_pending => debounce.saturating_sub(last.elapsed()),
            _ => Duration::ZERO,
        };
        if delay.is_zero() {
            trace!("Dispatching seek to position {}", format_time(position));
        } else {
            trace!("Delaying seek by {:?}", delay);
        }
        self.schedule_seek(&mut session, delay)
    }

    pub fn schedule_seek(&self, session: &mut Session, delay: Duration) -> Result<(), PlayerError> {
        let source = self.next_seek_source.fetch_add(1, Ordering::SeqCst);
        session.seek_source = Some(source);
        self.post(LoopMsg::ScheduleSeek { source, delay })
    }

    fn dispatch<F>(&self, gate: Gate, emit: F)
    where
        F: FnOnce(&Signals) + Send + 'static,
    {
        let signals = self.signals.clone();
        let target_state = self.target_state.clone();
        let emission: Emission = Box::new(move || {
            if gate == Gate::Prerolled
                && PipelineState::from_u8(target_state.load(Ordering::SeqCst))
                    < PipelineState::Paused
            {
                return;
            }
            emit(&signals);
        });

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.clone();
        let cleanup: Cleanup = Box::new(move || {
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        match self.dispatcher {
            Some(ref dispatcher) => dispatcher.dispatch(emission, cleanup),
            None => DispatchGuard::new(emission, cleanup).run(),
        }
    }
}

/// Formats nanoseconds the way pipeline logs do: `H:MM:SS.NNNNNNNNN`.
pub(crate) fn format_time(ns: u64) -> String {
    let secs = ns / 1_000_000_000;
    format!(
        "{}:{:02}:{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ns % 1_000_000_000
    )
}

fn element_message_text(kind: &str, message: &ElementMessage) -> String {
    let mut text = format!(
        "{} from element {}: {}",
        kind, message.source_path, message.message
    );
    if let Some(ref debug) = message.debug {
        text.push('\n');
        text.push_str(debug);
    }
    text
}

pub(crate) struct PlayerCore {
    shared: Arc<Shared>,
    pipeline: Arc<dyn Pipeline>,
    timers: TimerQueue,
    target_state: PipelineState,
    current_state: PipelineState,
    app_state: PlaybackState,
    buffering: i32,
    is_eos: bool,
    is_live: bool,
    tick_timer: Option<TimerId>,
    ready_timeout: Option<TimerId>,
    seek_timer: Option<(u64, TimerId)>,
}

impl PlayerCore {
    pub fn new(shared: Arc<Shared>, pipeline: Arc<dyn Pipeline>) -> PlayerCore {
        shared
            .target_state
            .store(PipelineState::Null.to_u8(), Ordering::SeqCst);
        PlayerCore {
            shared,
            pipeline,
            timers: TimerQueue::new(),
            target_state: PipelineState::Null,
            current_state: PipelineState::Null,
            app_state: PlaybackState::Stopped,
            buffering: 100,
            is_eos: false,
            is_live: false,
            tick_timer: None,
            ready_timeout: None,
            seek_timer: None,
        }
    }

    pub fn run(mut self, receiver: Receiver<LoopMsg>) {
        trace!("Starting player loop");
        loop {
            let now = Instant::now();
            if let Some((_, kind)) = self.timers.pop_expired(now) {
                self.on_timer(kind);
                continue;
            }

            let msg = match self.timers.next_deadline() {
                Some(deadline) => {
                    match receiver.recv_timeout(deadline.saturating_duration_since(now)) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match receiver.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };

            match msg {
                LoopMsg::Task(task) => task(&mut self),
                LoopMsg::Bus(epoch, message) => {
                    if epoch == self.shared.bus_epoch.load(Ordering::SeqCst) {
                        self.handle_bus_message(message);
                    } else {
                        trace!("Dropping flushed bus message {:?}", message);
                    }
                }
                LoopMsg::ScheduleSeek { source, delay } => self.arm_seek(source, delay),
                LoopMsg::Quit => break,
            }
        }
        trace!("Stopped player loop");
        self.shutdown();
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Tick => self.tick(),
            TimerKind::ReadyTimeout => {
                self.ready_timeout = None;
                self.on_ready_timeout();
            }
            TimerKind::Seek(source) => {
                if matches!(self.seek_timer, Some((armed, _)) if armed == source) {
                    self.seek_timer = None;
                }
                let due = self.shared.session.lock().unwrap().seek_source == Some(source);
                if due {
                    self.seek_internal();
                }
            }
        }
    }

    fn handle_bus_message(&mut self, message: BusMessage) {
        match message {
            BusMessage::Error(ref error) => {
                let text = element_message_text("Error", error);
                self.emit_error(PlayerError::Failed(text));
            }
            BusMessage::Warning(ref warning) => {
                let text = element_message_text("Warning", warning);
                self.emit_warning(PlayerError::Failed(text));
            }
            BusMessage::Eos => self.on_eos(),
            BusMessage::StateChanged {
                old,
                current,
                pending,
            } => self.on_state_changed(old, current, pending),
            BusMessage::Buffering(percent) => self.on_buffering(percent),
            BusMessage::ClockLost => self.on_clock_lost(),
            BusMessage::DurationChanged => {
                if let Some(duration) = self.pipeline.query_duration() {
                    self.emit_duration_changed(Some(duration));
                }
            }
            BusMessage::Latency => {
                debug!("Latency changed");
                self.pipeline.recalculate_latency();
            }
            BusMessage::RequestState(state) => self.on_request_state(state),
            BusMessage::Redirect(location) => self.on_redirect(location),
            BusMessage::Tag(tags) => self.on_tags(tags),
            BusMessage::StreamsChanged(kind) => {
                let pipeline = self.pipeline.clone();
                let updated = self.update_media_info(|info| {
                    extract::update_streams(&*pipeline, info, kind);
                    extract::resolve_global_fields(info);
                });
                if let Some(info) = updated {
                    self.emit_media_info_updated(info);
                }
            }
            BusMessage::StreamTagsChanged(kind, index) => self.on_stream_tags_changed(kind, index),
            BusMessage::VideoCapsChanged => self.check_video_dimensions(),
            BusMessage::VolumeChanged => {
                if self.shared.signals.volume_changed.has_handlers() {
                    self.shared
                        .dispatch(Gate::Always, |signals| signals.volume_changed.emit(&()));
                }
            }
            BusMessage::MuteChanged => {
                if self.shared.signals.mute_changed.has_handlers() {
                    self.shared
                        .dispatch(Gate::Always, |signals| signals.mute_changed.emit(&()));
                }
            }
        }
    }

    fn set_target(&mut self, state: PipelineState) {
        self.target_state = state;
        self.shared
            .target_state
            .store(state.to_u8(), Ordering::SeqCst);
    }

    fn set_live(&mut self, live: bool) {
        self.is_live = live;
        self.shared.is_live.store(live, Ordering::SeqCst);
    }

    /// Moves the pipeline to `state` with the bus flushing, discarding
    /// the transition's messages and anything still queued.
    fn set_state_flushed(&mut self, state: PipelineState) {
        self.pipeline.set_bus_flushing(true);
        self.shared.bus_epoch.fetch_add(1, Ordering::SeqCst);
        if self.pipeline.set_state(state).is_err() {
            warn!("Failed to set pipeline to {}", state);
        }
        self.pipeline.set_bus_flushing(false);
    }

    fn change_state(&mut self, state: PlaybackState) {
        if state == self.app_state {
            return;
        }
        debug!(
            "Changing app state from {} to {}",
            self.app_state.name(),
            state.name()
        );
        self.app_state = state;
        if self.shared.signals.state_changed.has_handlers() {
            self.shared
                .dispatch(Gate::Always, move |signals| signals.state_changed.emit(&state));
        }
    }

    fn tick(&mut self) {
        if self.target_state < PipelineState::Paused {
            return;
        }
        if let Some(position) = self.pipeline.query_position() {
            trace!("Position {}", format_time(position));
            if self.shared.signals.position_updated.has_handlers() {
                self.shared.dispatch(Gate::Prerolled, move |signals| {
                    signals.position_updated.emit(&position)
                });
            }
        }
    }

    fn add_tick_source(&mut self) {
        if self.tick_timer.is_some() {
            return;
        }
        let interval = self.shared.session.lock().unwrap().position_update_interval_ms;
        if interval == 0 {
            return;
        }
        self.tick_timer = Some(
            self.timers
                .add_interval(TimerKind::Tick, Duration::from_millis(interval as u64)),
        );
    }

    fn remove_tick_source(&mut self) {
        if let Some(id) = self.tick_timer.take() {
            self.timers.remove(id);
        }
    }

    /// Applies a new position update interval to a running tick timer.
    pub fn refresh_tick_source(&mut self) {
        if self.tick_timer.is_some() {
            self.remove_tick_source();
            self.add_tick_source();
        }
    }

    fn add_ready_timeout(&mut self) {
        if self.ready_timeout.is_some() {
            return;
        }
        let timeout = self.shared.config.ready_timeout();
        self.ready_timeout = Some(self.timers.add_timeout(TimerKind::ReadyTimeout, timeout));
    }

    fn remove_ready_timeout(&mut self) {
        if let Some(id) = self.ready_timeout.take() {
            self.timers.remove(id);
        }
    }

    fn on_ready_timeout(&mut self) {
        if self.target_state <= PipelineState::Ready {
            debug!("Was in READY for too long, releasing the pipeline");
            self.set_target(PipelineState::Null);
            self.current_state = PipelineState::Null;
            self.set_state_flushed(PipelineState::Null);
        }
    }

    fn arm_seek(&mut self, source: u64, delay: Duration) {
        let current = self.shared.session.lock().unwrap().seek_source;
        if current != Some(source) {
            trace!("Seek source {} was cancelled", source);
            return;
        }
        if let Some((_, id)) = self.seek_timer.take() {
            self.timers.remove(id);
        }
        let id = self.timers.add_timeout(TimerKind::Seek(source), delay);
        self.seek_timer = Some((source, id));
    }

    fn cancel_seek_source(&mut self, session: &mut Session) {
        session.seek_source = None;
        if let Some((_, id)) = self.seek_timer.take() {
            self.timers.remove(id);
        }
    }

    fn reset_session(&mut self) {
        let shared = self.shared.clone();
        let mut session = shared.session.lock().unwrap();
        session.media_info = None;
        session.global_tags = None;
        session.seek_pending = false;
        self.cancel_seek_source(&mut session);
        session.seek_position = None;
        session.last_seek_time = None;
    }

    fn has_uri(&self) -> bool {
        self.shared.session.lock().unwrap().uri.is_some()
    }

    pub fn play(&mut self) {
        if !self.has_uri() {
            return;
        }
        debug!("Play");

        self.remove_ready_timeout();
        self.set_target(PipelineState::Playing);

        if self.current_state < PipelineState::Paused {
            self.change_state(PlaybackState::Buffering);
        }

        let requested = if self.current_state >= PipelineState::Paused && !self.is_eos {
            PipelineState::Playing
        } else {
            PipelineState::Paused
        };
        match self.pipeline.set_state(requested) {
            Ok(StateChangeSuccess::NoPreroll) => {
                debug!("Pipeline is live");
                self.set_live(true);
            }
            Ok(_) => {}
            Err(_) => {
                self.emit_error(PlayerError::Failed("Failed to play".to_owned()));
                return;
            }
        }

        if self.is_eos {
            debug!("Was EOS, seeking to beginning");
            self.is_eos = false;
            if !self.pipeline.seek_to_start() {
                error!("Seek to beginning failed");
                self.stop();
                self.play();
            }
        }
    }

    pub fn pause(&mut self) {
        if !self.has_uri() {
            return;
        }
        debug!("Pause");

        self.tick();
        self.remove_tick_source();
        self.remove_ready_timeout();
        self.set_target(PipelineState::Paused);

        if self.current_state < PipelineState::Paused {
            self.change_state(PlaybackState::Buffering);
        }

        match self.pipeline.set_state(PipelineState::Paused) {
            Ok(StateChangeSuccess::NoPreroll) => {
                debug!("Pipeline is live");
                self.set_live(true);
            }
            Ok(_) => {}
            Err(_) => {
                self.emit_error(PlayerError::Failed("Failed to pause".to_owned()));
                return;
            }
        }

        if self.is_eos {
            debug!("Was EOS, seeking to beginning");
            self.is_eos = false;
            if !self.pipeline.seek_to_start() {
                error!("Seek to beginning failed");
                self.stop();
                self.pause();
            }
        }
    }

    pub fn stop(&mut self) {
        debug!("Stop");

        self.tick();
        self.remove_tick_source();
        self.add_ready_timeout();

        self.set_target(PipelineState::Null);
        self.current_state = PipelineState::Ready;
        self.set_live(false);
        self.is_eos = false;
        self.set_state_flushed(PipelineState::Ready);
        self.change_state(PlaybackState::Stopped);
        self.buffering = 100;

        self.reset_session();
        self.shared.session.lock().unwrap().rate = 1.0;
    }

    pub fn set_uri(&mut self) {
        self.stop();

        let mut session = self.shared.session.lock().unwrap();
        debug!("Changing URI to {:?}", session.uri);
        self.pipeline.set_uri(session.uri.as_deref());
        if session.subtitle_uri.take().is_some() {
            self.pipeline.set_subtitle_uri(None);
        }
    }

    pub fn set_subtitle_uri(&mut self) {
        let target_state = self.target_state;
        let position = self.pipeline.query_position();

        self.stop();

        {
            let session = self.shared.session.lock().unwrap();
            debug!("Changing subtitle URI to {:?}", session.subtitle_uri);
            self.pipeline.set_subtitle_uri(session.subtitle_uri.as_deref());
            self.pipeline.set_uri(session.uri.as_deref());
        }

        if let Some(position) = position {
            if let Err(e) = self.shared.request_seek(position) {
                warn!("Could not restore position after subtitle change: {}", e);
            }
        }
        self.restore_target(target_state);
    }

    fn restore_target(&mut self, target_state: PipelineState) {
        match target_state {
            PipelineState::Paused => self.pause(),
            PipelineState::Playing => self.play(),
            _ => {}
        }
    }

    fn seek_internal(&mut self) {
        let shared = self.shared.clone();
        let mut session = shared.session.lock().unwrap();
        self.cancel_seek_source(&mut session);

        // Not prerolled yet: the seek is applied once PAUSED is reached.
        if self.current_state < PipelineState::Paused {
            return;
        }
        let seekable = session
            .media_info
            .as_ref()
            .map_or(true, |info| info.seekable);
        if !seekable {
            debug!("Media is not seekable, dropping seek");
            session.seek_position = None;
            return;
        }
        if self.current_state != PipelineState::Paused {
            drop(session);
            if self.pipeline.set_state(PipelineState::Paused).is_err() {
                self.emit_error(PlayerError::Failed("Failed to seek".to_owned()));
            }
            return;
        }

        let position = match session.seek_position.take() {
            Some(position) => position,
            None => return,
        };
        session.last_seek_time = Some(Instant::now());
        session.seek_pending = true;
        let rate = session.rate;
        drop(session);

        self.remove_tick_source();
        self.is_eos = false;

        let request = SeekRequest::new(rate, position);
        debug!(
            "Seek with rate {:.2} to {}",
            rate,
            format_time(request.target_position())
        );
        if !self.pipeline.seek(&request) {
            self.emit_error(PlayerError::Failed(format!(
                "Failed to seek to {}",
                format_time(position)
            )));
        }
    }

    fn on_state_changed(&mut self, old: PipelineState, new: PipelineState, pending: PipelineState) {
        debug!(
            "Changed state old: {} new: {} pending: {}",
            old, new, pending
        );
        self.current_state = new;

        if old == PipelineState::Ready
            && new == PipelineState::Paused
            && pending == PipelineState::VoidPending
        {
            self.on_prerolled();
        }

        if new == PipelineState::Paused && pending == PipelineState::VoidPending {
            self.remove_tick_source();

            let shared = self.shared.clone();
            let mut session = shared.session.lock().unwrap();
            let mut seek_done = false;
            if session.seek_pending {
                session.seek_pending = false;
                let seekable = session
                    .media_info
                    .as_ref()
                    .map_or(true, |info| info.seekable);
                if !seekable {
                    debug!("Media is not seekable");
                    self.cancel_seek_source(&mut session);
                    session.seek_position = None;
                    session.last_seek_time = None;
                } else if session.seek_source.is_some() {
                    debug!("Seek finished but new seek is pending");
                    drop(session);
                    self.seek_internal();
                    session = shared.session.lock().unwrap();
                } else {
                    debug!("Seek finished");
                    seek_done = true;
                }
            }

            let apply_seek = session.seek_position.is_some();
            drop(session);

            if seek_done {
                self.emit_seek_done();
            }

            if apply_seek {
                debug!("Seeking now that we reached PAUSED state");
                self.seek_internal();
            }
            // A seek that was dropped or failed leaves nothing in flight.
            let settled = !self.shared.session.lock().unwrap().seek_pending;
            if settled && self.target_state >= PipelineState::Paused {
                self.tick();
                if self.target_state >= PipelineState::Playing && self.buffering == 100 {
                    if self.pipeline.set_state(PipelineState::Playing).is_err() {
                        self.emit_error(PlayerError::Failed("Failed to play".to_owned()));
                    }
                } else if self.buffering == 100 {
                    self.change_state(PlaybackState::Paused);
                }
            }
        } else if new == PipelineState::Playing && pending == PipelineState::VoidPending {
            // A PLAYING message queued before a seek must not restart ticking.
            let seek_pending = self.shared.session.lock().unwrap().seek_pending;
            if !seek_pending {
                self.add_tick_source();
                self.change_state(PlaybackState::Playing);
            }
        } else if new == PipelineState::Ready && old > PipelineState::Ready {
            self.change_state(PlaybackState::Stopped);
        } else {
            // Neither PAUSED nor PLAYING reached yet.
            self.change_state(PlaybackState::Buffering);
        }
    }

    fn on_prerolled(&mut self) {
        debug!("Initial PAUSED - pre-rolled");

        let (uri, global_tags) = {
            let mut session = self.shared.session.lock().unwrap();
            (session.uri.clone(), session.global_tags.take())
        };
        let info = extract::create_media_info(&*self.pipeline, uri, global_tags);
        debug!(
            "uri: {:?} title: {:?} duration: {:?} seekable: {} container: {:?}",
            info.uri, info.title, info.duration, info.seekable, info.container
        );
        self.shared.session.lock().unwrap().media_info = Some(Arc::new(info.clone()));
        self.emit_media_info_updated(info);

        self.pipeline.watch_video_dimensions();
        self.check_video_dimensions();
        self.emit_duration_changed(self.pipeline.query_duration());
    }

    fn on_buffering(&mut self, percent: i32) {
        if self.target_state < PipelineState::Paused || self.is_live {
            return;
        }
        trace!("Buffering {}%", percent);

        if percent < 100 {
            debug!("Waiting for buffering to finish");
            if self.pipeline.set_state(PipelineState::Paused).is_err() {
                self.emit_error(PlayerError::Failed(
                    "Failed to handle buffering".to_owned(),
                ));
                return;
            }
            self.change_state(PlaybackState::Buffering);
        }

        if self.buffering != percent {
            if self.shared.signals.buffering.has_handlers() {
                self.shared
                    .dispatch(Gate::Prerolled, move |signals| signals.buffering.emit(&percent));
            }
            self.buffering = percent;
        }

        if percent != 100 {
            return;
        }
        let seeking = {
            let session = self.shared.session.lock().unwrap();
            session.seek_position.is_some() || session.seek_pending
        };
        if seeking {
            debug!("Buffering finished - seek pending");
        } else if self.target_state >= PipelineState::Playing
            && self.current_state >= PipelineState::Paused
        {
            debug!("Buffering finished - going to PLAYING");
            if self.pipeline.set_state(PipelineState::Playing).is_err() {
                self.emit_error(PlayerError::Failed(
                    "Failed to handle buffering".to_owned(),
                ));
            }
        } else if self.target_state >= PipelineState::Paused {
            debug!("Buffering finished - staying PAUSED");
            self.change_state(PlaybackState::Paused);
        }
    }

    fn on_clock_lost(&mut self) {
        debug!("Clock lost");
        if self.target_state < PipelineState::Playing {
            return;
        }
        let restarted = self
            .pipeline
            .set_state(PipelineState::Paused)
            .and_then(|_| self.pipeline.set_state(PipelineState::Playing));
        if restarted.is_err() {
            self.emit_error(PlayerError::Failed(
                "Failed to handle clock loss".to_owned(),
            ));
        }
    }

    fn on_request_state(&mut self, state: PipelineState) {
        debug!("State {} requested", state);
        self.set_target(state);
        if self.pipeline.set_state(state).is_err() {
            self.emit_error(PlayerError::Failed(format!(
                "Failed to change to requested state {}",
                state
            )));
        }
    }

    fn on_redirect(&mut self, location: String) {
        debug!("Redirect to '{}'", location);
        let target_state = self.target_state;
        self.shared.session.lock().unwrap().uri = Some(location);
        self.set_uri();
        self.restore_target(target_state);
    }

    fn on_eos(&mut self) {
        debug!("End of stream");
        self.tick();
        self.remove_tick_source();

        if self.shared.signals.end_of_stream.has_handlers() {
            self.shared
                .dispatch(Gate::Always, |signals| signals.end_of_stream.emit(&()));
        }
        self.change_state(PlaybackState::Stopped);
        self.buffering = 100;
        self.is_eos = true;
    }

    fn on_tags(&mut self, tags: TagList) {
        let global = tags.scope() == TagScope::Global;
        debug!("Received {} tags", if global { "global" } else { "stream" });
        if !global {
            return;
        }

        let mut pending = Some(tags);
        let updated = self.update_media_info(|info| {
            info.tags = pending.take();
            extract::resolve_global_fields(info);
        });
        match updated {
            Some(info) => self.emit_media_info_updated(info),
            None => {
                if let Some(tags) = pending {
                    self.shared.session.lock().unwrap().global_tags = Some(tags);
                }
            }
        }
    }

    fn on_stream_tags_changed(&mut self, kind: StreamKind, index: i32) {
        let pipeline = self.pipeline.clone();
        let updated = self.update_media_info(|info| {
            if let Some(stream) = info.stream_mut(kind, index) {
                extract::update_stream(&*pipeline, stream);
            }
            extract::resolve_global_fields(info);
        });
        if let Some(info) = updated {
            self.emit_media_info_updated(info);
        }
    }

    /// Copy-on-publish update of the current media info. `update` runs on
    /// a private copy without the session lock; the result replaces the
    /// published value unless that was cleared in the meantime.
    fn update_media_info<F>(&self, update: F) -> Option<MediaInfo>
    where
        F: FnOnce(&mut MediaInfo),
    {
        let published = self.shared.session.lock().unwrap().media_info.clone()?;
        let mut info = MediaInfo::clone(&published);
        update(&mut info);

        let mut session = self.shared.session.lock().unwrap();
        match session.media_info {
            Some(ref current) if Arc::ptr_eq(current, &published) => {
                session.media_info = Some(Arc::new(info.clone()));
                Some(info)
            }
            _ => {
                debug!("Media info was replaced during update");
                None
            }
        }
    }

    fn check_video_dimensions(&self) {
        let (width, height) = self.pipeline.video_dimensions().unwrap_or((0, 0));
        debug!("Video dimensions changed: {}x{}", width, height);
        if self.shared.signals.video_dimensions_changed.has_handlers() {
            self.shared.dispatch(Gate::Prerolled, move |signals| {
                signals.video_dimensions_changed.emit(&(width, height))
            });
        }
    }

    fn emit_duration_changed(&self, duration: Option<u64>) {
        debug!("Duration changed {:?}", duration.map(format_time));
        if self.shared.signals.duration_changed.has_handlers() {
            self.shared.dispatch(Gate::Prerolled, move |signals| {
                signals.duration_changed.emit(&duration)
            });
        }
    }

    fn emit_media_info_updated(&self, info: MediaInfo) {
        if self.shared.signals.media_info_updated.has_handlers() {
            self.shared.dispatch(Gate::Prerolled, move |signals| {
                signals.media_info_updated.emit(&info)
            });
        }
    }

    fn emit_seek_done(&self) {
        if self.shared.signals.seek_done.has_handlers() {
            let position = self.pipeline.query_position().unwrap_or(0);
            self.shared
                .dispatch(Gate::Always, move |signals| signals.seek_done.emit(&position));
        }
    }

    fn emit_warning(&self, warning: PlayerError) {
        warn!("Warning: {}", warning);
        if self.shared.signals.warning.has_handlers() {
            self.shared
                .dispatch(Gate::Always, move |signals| signals.warning.emit(&warning));
        }
    }

    /// Reports `error` and resets the player to a clean stopped state.
    fn emit_error(&mut self, error: PlayerError) {
        error!("Error: {}", error);
        if self.shared.signals.error.has_handlers() {
            self.shared
                .dispatch(Gate::Always, move |signals| signals.error.emit(&error));
        }

        self.remove_tick_source();
        self.remove_ready_timeout();
        self.set_target(PipelineState::Null);
        self.current_state = PipelineState::Null;
        self.set_live(false);
        self.is_eos = false;
        self.set_state_flushed(PipelineState::Null);
        self.change_state(PlaybackState::Stopped);
        self.buffering = 100;

        self.reset_session();
    }

    fn shutdown(&mut self) {
        self.timers.clear();
        self.tick_timer = None;
        self.ready_timeout = None;
        self.seek_timer = None;
        {
            let mut session = self.shared.session.lock().unwrap();
            session.media_info = None;
            session.global_tags = None;
            session.seek_source = None;
        }
        self.set_target(PipelineState::Null);
        self.current_state = PipelineState::Null;
        self.pipeline.set_bus_flushing(true);
        self.shared.bus_epoch.fetch_add(1, Ordering::SeqCst);
        if self.pipeline.set_state(PipelineState::Null).is_err() {
            warn!("Failed to shut the pipeline down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_times_like_pipeline_logs() {
        assert_eq!(format_time(0), "0:00:00.000000000");
        assert_eq!(format_time(5_000_000_000), "0:00:05.000000000");
        assert_eq!(format_time(3_723_000_000_001), "1:02:03.000000001");
    }

    #[test]
    fn element_messages_include_debug_details() {
        let message = ElementMessage {
            source_path: "/GstPlayBin:playbin/GstSouphttpSrc:source".into(),
            message: "Not Found".into(),
            debug: Some("404".into()),
        };
        assert_eq!(
            element_message_text("Error", &message),
            "Error from element /GstPlayBin:playbin/GstSouphttpSrc:source: Not Found\n404"
        );
    }
}
