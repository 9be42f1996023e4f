use std::future::Future;
use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::{mpsc, watch};

use crate::entry::{EntryAction, EntryInput, EntryMachine, EntryPhase, Screen};
use crate::errors::ShellError;
use crate::events::{ConnectionState, EventEmitter, ShellEvent, ShellEventListener};
use crate::frame::{EmbeddingFrame, FrameSignal, send_signal};
use crate::params::PageParams;
use crate::recording::{RecordingNotification, RecordingNotifier};
use crate::room::{RoomLookup, RoomRecord};
use crate::session::{RealtimeSession, RoomDirectory, SessionSignal, TokenIssuer};
use crate::settings::PreferencesStore;
use crate::window::AccessWindow;

/// The external services the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn RoomDirectory>,
    pub issuer: Arc<dyn TokenIssuer>,
    pub session: Arc<dyn RealtimeSession>,
    pub frame: Arc<dyn EmbeddingFrame>,
}

/// Read-only view of the entry context, republished after every input.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub phase: EntryPhase,
    pub record: Option<RoomRecord>,
    pub connection: ConnectionState,
    pub framed: bool,
    pub recording: Option<RecordingNotification>,
}

impl EntrySnapshot {
    /// Screen decision with boundary times in the local zone.
    pub fn screen(&self) -> Screen {
        Screen::decide(
            &self.phase,
            self.record.as_ref(),
            &self.connection,
            self.framed,
            &Local,
        )
    }
}

#[derive(Debug)]
enum Input {
    /// Completion of a task started under `generation`.
    Completion { generation: u64, input: EntryInput },
    Entry(EntryInput),
    Signal(SessionSignal),
    DismissRecording,
    Minimize,
    HangUp,
    /// A requested disconnect returned.
    Disconnected,
}

/// Cloneable handle used by the UI and the real-time session.
#[derive(Clone)]
pub struct EntryHandle {
    tx: mpsc::UnboundedSender<Input>,
    snapshot: watch::Receiver<EntrySnapshot>,
    emitter: EventEmitter,
}

impl EntryHandle {
    /// Forward a session signal. Signals are processed in send order.
    pub fn signal(&self, signal: SessionSignal) {
        self.send(Input::Signal(signal));
    }

    /// Manual join from the pre-join screen.
    pub fn join(&self, identity: &str) {
        self.send(Input::Entry(EntryInput::JoinRequested {
            identity: identity.to_string(),
        }));
    }

    pub fn hang_up(&self) {
        self.send(Input::HangUp);
    }

    pub fn minimize(&self) {
        self.send(Input::Minimize);
    }

    pub fn dismiss_recording_notification(&self) {
        self.send(Input::DismissRecording);
    }

    pub fn add_listener(&self, listener: Arc<dyn ShellEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> EntryPhase {
        self.snapshot.borrow().phase.clone()
    }

    /// Wait until the phase satisfies `pred`.
    pub async fn wait_for_phase(
        &mut self,
        mut pred: impl FnMut(&EntryPhase) -> bool,
    ) -> Result<EntryPhase, ShellError> {
        self.snapshot
            .wait_for(|s| pred(&s.phase))
            .await
            .map(|s| s.phase.clone())
            .map_err(|_| ShellError::ControllerStopped)
    }

    fn send(&self, input: Input) {
        if self.tx.send(input).is_err() {
            tracing::warn!("entry controller stopped, input dropped");
        }
    }
}

/// Drives an [`EntryMachine`] against the collaborators.
///
/// All inputs, session signals included, go through one ordered channel
/// and are handled by a single task.
pub struct SessionEntryController {
    machine: EntryMachine,
    collaborators: Collaborators,
    emitter: EventEmitter,
    recording: RecordingNotifier,
    connection: ConnectionState,
    preferences: Option<Arc<PreferencesStore>>,
    inputs: mpsc::UnboundedReceiver<Input>,
    tx: mpsc::WeakUnboundedSender<Input>,
    snapshot: watch::Sender<EntrySnapshot>,
}

impl SessionEntryController {
    pub fn new(
        params: PageParams,
        window: AccessWindow,
        collaborators: Collaborators,
    ) -> (Self, EntryHandle) {
        let (tx, inputs) = mpsc::unbounded_channel();
        let machine = EntryMachine::new(params, window);
        let connection = collaborators.session.connection_state();
        let (snapshot, snapshot_rx) = watch::channel(EntrySnapshot {
            phase: machine.phase().clone(),
            record: None,
            connection: connection.clone(),
            framed: collaborators.frame.is_framed(),
            recording: None,
        });
        let emitter = EventEmitter::new();

        let controller = Self {
            machine,
            collaborators,
            emitter: emitter.clone(),
            recording: RecordingNotifier::new(),
            connection,
            preferences: None,
            inputs,
            tx: tx.downgrade(),
            snapshot,
        };
        let handle = EntryHandle {
            tx,
            snapshot: snapshot_rx,
            emitter,
        };
        (controller, handle)
    }

    /// Remember the display name of every accepted manual join in `store`.
    pub fn with_preferences(mut self, store: Arc<PreferencesStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    /// Fetch the room record, then process inputs until every handle and
    /// in-flight task is gone.
    pub async fn run(mut self) {
        self.fetch_room();

        while let Some(input) = self.inputs.recv().await {
            self.process(input);
        }

        tracing::info!("entry controller loop ended");
    }

    fn fetch_room(&self) {
        let directory = self.collaborators.directory.clone();
        let token = self.machine.params().token.clone();
        self.spawn_input(async move {
            let lookup = match token {
                None => RoomLookup::Rejected("no room token in page url".to_string()),
                Some(token) => RoomLookup::from_fetch(directory.fetch_room_record(&token).await),
            };
            Input::Entry(EntryInput::RecordArrived(lookup))
        });
    }

    fn process(&mut self, input: Input) {
        let now = Utc::now();
        let actions = match input {
            Input::Completion { generation, input } => {
                if let EntryInput::MediaFailed(reason) = &input {
                    if generation == self.machine.generation() {
                        self.emitter.emit(ShellEvent::MediaError(reason.clone()));
                    }
                }
                let connected = input == EntryInput::ConnectSucceeded;
                let actions = self.machine.handle_completion(generation, input, now);
                if connected {
                    self.refresh_connection();
                }
                actions
            }
            Input::Entry(EntryInput::JoinRequested { identity }) => {
                let actions = self.machine.handle(
                    EntryInput::JoinRequested {
                        identity: identity.clone(),
                    },
                    now,
                );
                if !actions.is_empty() {
                    self.remember_display_name(identity);
                }
                actions
            }
            Input::Entry(input) => self.machine.handle(input, now),
            Input::Signal(SessionSignal::TracksChanged(tracks)) => {
                self.machine.handle(EntryInput::TracksChanged(tracks), now)
            }
            Input::Signal(SessionSignal::RecordingChanged(is_recording)) => {
                if let Some(notification) = self.recording.observe(is_recording, self.machine.record()) {
                    self.emitter
                        .emit(ShellEvent::RecordingNotification(notification.clone()));
                }
                Vec::new()
            }
            Input::Signal(SessionSignal::ConnectionStateChanged(state)) => {
                self.connection = state.clone();
                self.emitter.emit(ShellEvent::ConnectionStateChanged(state));
                Vec::new()
            }
            Input::DismissRecording => {
                if self.recording.active().is_some() {
                    self.recording.dismiss();
                    self.emitter.emit(ShellEvent::RecordingNotificationDismissed);
                }
                Vec::new()
            }
            Input::Minimize => {
                self.signal_frame(FrameSignal::Minimize);
                Vec::new()
            }
            Input::HangUp => {
                let actions = self.machine.handle(EntryInput::HungUp, now);
                self.signal_frame(FrameSignal::Close);
                actions
            }
            Input::Disconnected => {
                self.refresh_connection();
                Vec::new()
            }
        };

        for action in actions {
            self.execute(action);
        }
        self.publish();
    }

    fn execute(&mut self, action: EntryAction) {
        let generation = self.machine.generation();
        let session = self.collaborators.session.clone();

        match action {
            EntryAction::AcquireLocalTracks => {
                tracing::info!("acquiring local tracks");
                self.spawn_input(async move {
                    let input = match session.acquire_local_tracks().await {
                        Ok(()) => {
                            let tracks = session.local_tracks();
                            if !tracks.acquiring && !tracks.is_media_ready() {
                                EntryInput::MediaFailed("missing audio/video track".to_string())
                            } else {
                                EntryInput::TracksChanged(tracks)
                            }
                        }
                        Err(e) => EntryInput::MediaFailed(e.to_string()),
                    };
                    Input::Completion { generation, input }
                });
            }
            EntryAction::IssueCredential {
                identity,
                room_id_token,
            } => {
                let issuer = self.collaborators.issuer.clone();
                tracing::info!("requesting credential for {identity} in room {room_id_token}");
                self.spawn_input(async move {
                    let input = match issuer.issue_credential(&identity, &room_id_token).await {
                        Ok(credential) => EntryInput::CredentialIssued(credential),
                        Err(e) => EntryInput::CredentialFailed(e.to_string()),
                    };
                    Input::Completion { generation, input }
                });
            }
            EntryAction::Connect(credential) => {
                tracing::info!("connecting to session");
                self.spawn_input(async move {
                    let input = match session.connect(&credential).await {
                        Ok(()) => EntryInput::ConnectSucceeded,
                        Err(e) => EntryInput::ConnectFailed(e.to_string()),
                    };
                    Input::Completion { generation, input }
                });
            }
            EntryAction::ApplyDeviceToggles { mic, cam } => {
                tokio::spawn(async move {
                    if mic.is_on() != session.is_microphone_enabled() {
                        if let Err(e) = session.set_microphone_enabled(mic.is_on()).await {
                            tracing::warn!("initial microphone toggle failed: {e}");
                        }
                    }
                    if cam.is_on() != session.is_camera_enabled() {
                        if let Err(e) = session.set_camera_enabled(cam.is_on()).await {
                            tracing::warn!("initial camera toggle failed: {e}");
                        }
                    }
                });
            }
            EntryAction::Disconnect => {
                tracing::info!("disconnecting from session");
                if self.recording.active().is_some() {
                    self.emitter.emit(ShellEvent::RecordingNotificationDismissed);
                }
                self.recording.reset();
                let tx = self.tx.upgrade();
                tokio::spawn(async move {
                    session.disconnect().await;
                    if let Some(tx) = tx {
                        let _ = tx.send(Input::Disconnected);
                    }
                });
            }
        }
    }

    fn refresh_connection(&mut self) {
        let state = self.collaborators.session.connection_state();
        if state != self.connection {
            self.connection = state.clone();
            self.emitter.emit(ShellEvent::ConnectionStateChanged(state));
        }
    }

    fn remember_display_name(&self, identity: String) {
        if let Some(store) = &self.preferences {
            store.set_display_name(Some(identity));
        }
    }

    fn signal_frame(&self, signal: FrameSignal) {
        if send_signal(self.collaborators.frame.as_ref(), signal) {
            self.emitter.emit(ShellEvent::FrameSignalSent(signal));
        }
    }

    /// Run `task` and feed its result back as an input.
    fn spawn_input<F>(&self, task: F)
    where
        F: Future<Output = Input> + Send + 'static,
    {
        let Some(tx) = self.tx.upgrade() else {
            tracing::debug!("no handles left, task not started");
            return;
        };
        tokio::spawn(async move {
            let input = task.await;
            // The controller may have stopped; nothing left to update.
            let _ = tx.send(input);
        });
    }

    fn publish(&self) {
        let next = EntrySnapshot {
            phase: self.machine.phase().clone(),
            record: self.machine.record().cloned(),
            connection: self.connection.clone(),
            framed: self.collaborators.frame.is_framed(),
            recording: self.recording.active().cloned(),
        };
        let phase_changed = self.snapshot.borrow().phase != next.phase;
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if phase_changed {
            self.emitter.emit(ShellEvent::PhaseChanged(next.phase));
        }
    }
}
