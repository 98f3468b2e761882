use mediaplay_player::dispatcher::{Cleanup, DispatchGuard, Emission, SignalDispatcher};

/// Runs player events on a GLib main context, typically the one driving
/// the application's GTK or GLib main loop.
pub struct MainContextDispatcher {
    context: glib::MainContext,
}

impl MainContextDispatcher {
    pub fn new(context: glib::MainContext) -> Self {
        MainContextDispatcher { context }
    }
}

impl Default for MainContextDispatcher {
    fn default() -> Self {
        MainContextDispatcher::new(glib::MainContext::default())
    }
}

impl SignalDispatcher for MainContextDispatcher {
    fn dispatch(&self, emit: Emission, cleanup: Cleanup) {
        let guard = DispatchGuard::new(emit, cleanup);
        // If the context is destroyed first, dropping the closure drops the
        // guard and still runs the cleanup.
        self.context.invoke(move || guard.run());
    }
}
