//! Delivery of player events to the application's thread of choice.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub type Emission = Box<dyn FnOnce() + Send>;
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Runs event emissions on some execution context.
///
/// Implementations must run `cleanup` exactly once per call, after
/// `emit` if `emit` runs at all. [`DispatchGuard`] takes care of that.
pub trait SignalDispatcher: Send + Sync {
    fn dispatch(&self, emit: Emission, cleanup: Cleanup);
}

/// Pairs an emission with its cleanup. Cleanup runs after the emission
/// or, if the guard is dropped without running, on drop.
pub struct DispatchGuard {
    emit: Option<Emission>,
    cleanup: Option<Cleanup>,
}

impl DispatchGuard {
    pub fn new(emit: Emission, cleanup: Cleanup) -> DispatchGuard {
        DispatchGuard {
            emit: Some(emit),
            cleanup: Some(cleanup),
        }
    }

    pub fn run(mut self) {
        if let Some(emit) = self.emit.take() {
            emit();
        }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Dispatcher feeding a [`DispatchContext`].
#[derive(Clone)]
pub struct ContextDispatcher {
    sender: Sender<DispatchGuard>,
}

impl SignalDispatcher for ContextDispatcher {
    fn dispatch(&self, emit: Emission, cleanup: Cleanup) {
        if let Err(mpsc::SendError(guard)) = self.sender.send(DispatchGuard::new(emit, cleanup)) {
            debug!("Dispatch context is gone, dropping emission");
            drop(guard);
        }
    }
}

/// Queue of emissions drained by the thread that owns it, typically an
/// application's main loop.
pub struct DispatchContext {
    receiver: Receiver<DispatchGuard>,
}

/// Creates a dispatcher and the context it feeds.
pub fn dispatch_context() -> (ContextDispatcher, DispatchContext) {
    let (sender, receiver) = mpsc::channel();
    (ContextDispatcher { sender }, DispatchContext { receiver })
}

impl DispatchContext {
    /// Runs one queued emission, waiting for it if `may_block`.
    /// Returns whether an emission ran.
    pub fn iteration(&self, may_block: bool) -> bool {
        let guard = if may_block {
            self.receiver.recv().ok()
        } else {
            self.receiver.try_recv().ok()
        };
        match guard {
            Some(guard) => {
                guard.run();
                true
            }
            None => false,
        }
    }

    /// Runs one emission, waiting at most `timeout` for it.
    pub fn iteration_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(guard) => {
                guard.run();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Runs everything queued so far and returns how many emissions ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(guard) => {
                    guard.run();
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return count,
            }
        }
    }
}

impl Drop for DispatchContext {
    fn drop(&mut self) {
        // Pending guards run their cleanups as they are dropped.
        while self.receiver.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counting(counter: &Arc<AtomicUsize>) -> Box<dyn FnOnce() + Send> {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn cleanup_runs_after_emit() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, context) = dispatch_context();
        let emit_order = order.clone();
        let cleanup_order = order.clone();
        dispatcher.dispatch(
            Box::new(move || emit_order.lock().unwrap().push("emit")),
            Box::new(move || cleanup_order.lock().unwrap().push("cleanup")),
        );
        assert!(order.lock().unwrap().is_empty());
        assert_eq!(context.run_pending(), 1);
        assert_eq!(*order.lock().unwrap(), vec!["emit", "cleanup"]);
    }

    #[test]
    fn cleanup_runs_once_when_context_is_dropped() {
        let emitted = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));
        let (dispatcher, context) = dispatch_context();
        dispatcher.dispatch(counting(&emitted), counting(&cleaned));
        drop(context);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);

        // Nobody listens anymore.
        dispatcher.dispatch(counting(&emitted), counting(&cleaned));
        assert_eq!(emitted.load(Ordering::SeqCst), 0);
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emissions_run_on_the_draining_thread() {
        let (dispatcher, context) = dispatch_context();
        let main_thread = std::thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        let slot = ran_on.clone();
        std::thread::spawn(move || {
            dispatcher.dispatch(
                Box::new(move || *slot.lock().unwrap() = Some(std::thread::current().id())),
                Box::new(|| {}),
            );
        })
        .join()
        .unwrap();
        assert!(context.iteration(true));
        assert_eq!(*ran_on.lock().unwrap(), Some(main_thread));
        assert!(!context.iteration(false));
    }
}
