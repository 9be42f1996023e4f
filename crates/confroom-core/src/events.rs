use std::sync::{Arc, PoisonError, RwLock};

use crate::entry::EntryPhase;
use crate::frame::FrameSignal;
use crate::recording::RecordingNotification;

/// Events emitted by the core to UI listeners.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    PhaseChanged(EntryPhase),
    ConnectionStateChanged(ConnectionState),
    RecordingNotification(RecordingNotification),
    RecordingNotificationDismissed,
    /// Local media could not be acquired during auto-join.
    MediaError(String),
    FrameSignalSent(FrameSignal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait ShellEventListener: Send + Sync {
    fn on_event(&self, event: ShellEvent);
}

/// Dispatches events to registered listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Arc<dyn ShellEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn ShellEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn emit(&self, event: ShellEvent) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl ShellEventListener for CountingListener {
        fn on_event(&self, _event: ShellEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_dispatches_to_multiple_listeners() {
        let emitter = EventEmitter::new();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        emitter.add_listener(Arc::new(CountingListener { count: count1.clone() }));
        emitter.add_listener(Arc::new(CountingListener { count: count2.clone() }));

        emitter.emit(ShellEvent::ConnectionStateChanged(ConnectionState::Connected));

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    struct EventCapture {
        events: Arc<Mutex<Vec<ShellEvent>>>,
    }

    impl ShellEventListener for EventCapture {
        fn on_event(&self, event: ShellEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn emitter_delivers_correct_events() {
        let emitter = EventEmitter::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        emitter.add_listener(Arc::new(EventCapture { events: events.clone() }));

        emitter.emit(ShellEvent::MediaError("camera denied".to_string()));

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        match &captured[0] {
            ShellEvent::MediaError(reason) => assert_eq!(reason, "camera denied"),
            other => panic!("expected MediaError, got {other:?}"),
        }
    }
}
