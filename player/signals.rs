use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::{MediaInfo, PlaybackState, PlayerError};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a connected handler, for [`crate::Player::disconnect`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HandlerId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handlers registered for one event.
pub struct Signal<T> {
    handlers: RwLock<Vec<(HandlerId, Handler<T>)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Signal {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Signal<T> {
    pub fn connect<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().unwrap().push((id, Arc::new(handler)));
        id
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.read().unwrap().is_empty()
    }

    pub fn emit(&self, value: &T) {
        // Handlers may connect or disconnect while being called.
        let handlers: Vec<Handler<T>> = self
            .handlers
            .read()
            .unwrap()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(value);
        }
    }
}

/// Every event a player emits.
#[derive(Default)]
pub struct Signals {
    pub buffering: Signal<i32>,
    pub duration_changed: Signal<Option<u64>>,
    pub end_of_stream: Signal<()>,
    pub error: Signal<PlayerError>,
    pub media_info_updated: Signal<MediaInfo>,
    pub mute_changed: Signal<()>,
    pub position_updated: Signal<u64>,
    pub seek_done: Signal<u64>,
    pub state_changed: Signal<PlaybackState>,
    pub video_dimensions_changed: Signal<(i32, i32)>,
    pub volume_changed: Signal<()>,
    pub warning: Signal<PlayerError>,
}

impl Signals {
    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.buffering.disconnect(id)
            || self.duration_changed.disconnect(id)
            || self.end_of_stream.disconnect(id)
            || self.error.disconnect(id)
            || self.media_info_updated.disconnect(id)
            || self.mute_changed.disconnect(id)
            || self.position_updated.disconnect(id)
            || self.seek_done.disconnect(id)
            || self.state_changed.disconnect(id)
            || self.video_dimensions_changed.disconnect(id)
            || self.volume_changed.disconnect(id)
            || self.warning.disconnect(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn connect_emit_disconnect() {
        let signals = Signals::default();
        assert!(!signals.position_updated.has_handlers());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = signals
            .position_updated
            .connect(move |pos| sink.lock().unwrap().push(*pos));
        assert!(signals.position_updated.has_handlers());

        signals.position_updated.emit(&42);
        assert!(signals.disconnect(id));
        assert!(!signals.disconnect(id));
        signals.position_updated.emit(&43);

        assert_eq!(*seen.lock().unwrap(), vec![42]);
        assert!(!signals.position_updated.has_handlers());
    }

    #[test]
    fn handlers_may_reenter() {
        let signal = Arc::new(Signal::<()>::default());
        let inner = signal.clone();
        signal.connect(move |_| {
            inner.connect(|_| {});
        });
        signal.emit(&());
        signal.emit(&());
    }
}
