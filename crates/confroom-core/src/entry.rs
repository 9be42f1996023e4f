//! Room entry state machine.
//!
//! [`EntryMachine`] is a synchronous finite-state machine: it consumes
//! [`EntryInput`]s and returns the [`EntryAction`]s the caller must perform.
//! It performs no I/O. The async driver lives in [`crate::controller`].

use chrono::{DateTime, TimeZone, Utc};

use crate::events::ConnectionState;
use crate::params::{DeviceToggle, PageParams};
use crate::room::{RoomLookup, RoomRecord};
use crate::session::{LocalTrackSet, SessionCredential};
use crate::window::{AccessWindow, EligibilityVerdict, format_boundary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    InvalidToken,
    NotYetOpen { opens_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
    TokenError(String),
    ConnectFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyMode {
    /// The participant enters manually. Carries the media error that
    /// interrupted auto-join, if any.
    Manual { media_error: Option<String> },
    /// Connected through auto-join or a manual join.
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPhase {
    Preloading,
    Blocked(BlockReason),
    AwaitingMedia,
    Connecting,
    Ready(ReadyMode),
}

impl EntryPhase {
    pub fn is_blocked(&self) -> bool {
        matches!(self, EntryPhase::Blocked(_))
    }
}

/// Discrete inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryInput {
    RecordArrived(RoomLookup),
    TracksChanged(LocalTrackSet),
    MediaFailed(String),
    /// Manual join from the pre-join screen.
    JoinRequested { identity: String },
    CredentialIssued(SessionCredential),
    CredentialFailed(String),
    ConnectSucceeded,
    ConnectFailed(String),
    HungUp,
}

/// Work the machine asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    AcquireLocalTracks,
    IssueCredential {
        identity: String,
        room_id_token: String,
    },
    Connect(SessionCredential),
    ApplyDeviceToggles {
        mic: DeviceToggle,
        cam: DeviceToggle,
    },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    pub phase: EntryPhase,
    pub auto_join_requested: bool,
    pub local_media_ready: bool,
    pub connect_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Idle,
    Credential,
    Connect,
}

pub struct EntryMachine {
    window: AccessWindow,
    params: PageParams,
    lookup: Option<RoomLookup>,
    state: EntryState,
    in_flight: InFlight,
    /// Bumped on hangup; completions from older generations are stale.
    generation: u64,
    toggles_applied: bool,
}

impl EntryMachine {
    pub fn new(params: PageParams, window: AccessWindow) -> Self {
        Self {
            window,
            params,
            lookup: None,
            state: EntryState {
                phase: EntryPhase::Preloading,
                auto_join_requested: false,
                local_media_ready: false,
                connect_started: false,
            },
            in_flight: InFlight::Idle,
            generation: 0,
            toggles_applied: false,
        }
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn phase(&self) -> &EntryPhase {
        &self.state.phase
    }

    pub fn params(&self) -> &PageParams {
        &self.params
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn record(&self) -> Option<&RoomRecord> {
        self.lookup.as_ref().and_then(RoomLookup::record)
    }

    pub fn verdict(&self, now: DateTime<Utc>) -> EligibilityVerdict {
        self.window.evaluate(self.lookup.as_ref(), now)
    }

    /// Feed a completion that was started under `generation`.
    pub fn handle_completion(
        &mut self,
        generation: u64,
        input: EntryInput,
        now: DateTime<Utc>,
    ) -> Vec<EntryAction> {
        if generation != self.generation {
            // A connect that outlived its hangup leaves the session live.
            if input == EntryInput::ConnectSucceeded && !self.state.connect_started {
                tracing::info!("connect from generation {generation} finished after hangup");
                return vec![EntryAction::Disconnect];
            }
            tracing::debug!(
                "dropping stale completion from generation {generation} (now {})",
                self.generation
            );
            return Vec::new();
        }
        self.handle(input, now)
    }

    pub fn handle(&mut self, input: EntryInput, now: DateTime<Utc>) -> Vec<EntryAction> {
        match input {
            EntryInput::RecordArrived(lookup) => self.on_record(lookup, now),
            EntryInput::TracksChanged(tracks) => self.on_tracks(&tracks),
            EntryInput::MediaFailed(reason) => self.on_media_failed(reason),
            EntryInput::JoinRequested { identity } => self.on_join(identity),
            EntryInput::CredentialIssued(credential) => self.on_credential(credential),
            EntryInput::CredentialFailed(reason) => {
                if self.expecting(InFlight::Credential) {
                    tracing::warn!("credential request failed: {reason}");
                    self.block(BlockReason::TokenError(reason));
                }
                Vec::new()
            }
            EntryInput::ConnectSucceeded => self.on_connected(),
            EntryInput::ConnectFailed(reason) => {
                if self.expecting(InFlight::Connect) {
                    tracing::warn!("session connect failed: {reason}");
                    self.block(BlockReason::ConnectFailed(reason));
                }
                Vec::new()
            }
            EntryInput::HungUp => self.on_hangup(),
        }
    }

    fn on_record(&mut self, lookup: RoomLookup, now: DateTime<Utc>) -> Vec<EntryAction> {
        if self.lookup.is_some() || self.state.phase != EntryPhase::Preloading {
            tracing::debug!("room record already received, ignoring another");
            return Vec::new();
        }

        let verdict = self.window.evaluate(Some(&lookup), now);
        tracing::info!("room eligibility: {verdict:?}");
        self.lookup = Some(lookup);

        match verdict {
            EligibilityVerdict::Pending => Vec::new(),
            EligibilityVerdict::TokenInvalid => {
                self.block(BlockReason::InvalidToken);
                Vec::new()
            }
            EligibilityVerdict::NotYetOpen { opens_at } => {
                self.block(BlockReason::NotYetOpen { opens_at });
                Vec::new()
            }
            EligibilityVerdict::Expired { expired_at } => {
                self.block(BlockReason::Expired { expired_at });
                Vec::new()
            }
            EligibilityVerdict::Open if self.params.name.is_some() => {
                self.state.auto_join_requested = true;
                self.set_phase(EntryPhase::AwaitingMedia);
                vec![EntryAction::AcquireLocalTracks]
            }
            EligibilityVerdict::Open => {
                self.set_phase(EntryPhase::Ready(ReadyMode::Manual { media_error: None }));
                Vec::new()
            }
        }
    }

    fn on_tracks(&mut self, tracks: &LocalTrackSet) -> Vec<EntryAction> {
        if self.state.phase != EntryPhase::AwaitingMedia
            || !self.state.auto_join_requested
            || self.state.connect_started
            || !tracks.is_media_ready()
        {
            return Vec::new();
        }

        tracing::info!("local media ready, requesting session credential");
        self.state.local_media_ready = true;
        let identity = self.params.name.clone().unwrap_or_default();
        self.start_connect(identity)
    }

    fn on_media_failed(&mut self, reason: String) -> Vec<EntryAction> {
        if self.state.phase != EntryPhase::AwaitingMedia {
            return Vec::new();
        }
        tracing::warn!("local media acquisition failed: {reason}");
        self.set_phase(EntryPhase::Ready(ReadyMode::Manual {
            media_error: Some(reason),
        }));
        Vec::new()
    }

    fn on_join(&mut self, identity: String) -> Vec<EntryAction> {
        if !matches!(self.state.phase, EntryPhase::Ready(ReadyMode::Manual { .. }))
            || self.state.connect_started
        {
            tracing::debug!("join ignored in phase {:?}", self.state.phase);
            return Vec::new();
        }
        self.start_connect(identity)
    }

    fn start_connect(&mut self, identity: String) -> Vec<EntryAction> {
        let Some(room_id_token) = self.record().map(|r| r.room_id_token.clone()) else {
            return Vec::new();
        };
        self.state.connect_started = true;
        self.in_flight = InFlight::Credential;
        self.set_phase(EntryPhase::Connecting);
        vec![EntryAction::IssueCredential {
            identity,
            room_id_token,
        }]
    }

    fn on_credential(&mut self, credential: SessionCredential) -> Vec<EntryAction> {
        if !self.expecting(InFlight::Credential) {
            return Vec::new();
        }
        self.in_flight = InFlight::Connect;
        vec![EntryAction::Connect(credential)]
    }

    fn on_connected(&mut self) -> Vec<EntryAction> {
        if !self.expecting(InFlight::Connect) {
            return Vec::new();
        }
        self.in_flight = InFlight::Idle;
        self.set_phase(EntryPhase::Ready(ReadyMode::Live));

        match self.params.device_toggles() {
            Some((mic, cam)) if !self.toggles_applied => {
                self.toggles_applied = true;
                vec![EntryAction::ApplyDeviceToggles { mic, cam }]
            }
            _ => Vec::new(),
        }
    }

    fn on_hangup(&mut self) -> Vec<EntryAction> {
        if !matches!(
            self.state.phase,
            EntryPhase::Connecting | EntryPhase::Ready(ReadyMode::Live)
        ) {
            return Vec::new();
        }
        self.generation += 1;
        self.in_flight = InFlight::Idle;
        self.state.connect_started = false;
        self.state.local_media_ready = false;
        self.set_phase(EntryPhase::Ready(ReadyMode::Manual { media_error: None }));
        vec![EntryAction::Disconnect]
    }

    fn expecting(&self, step: InFlight) -> bool {
        self.state.phase == EntryPhase::Connecting && self.in_flight == step
    }

    fn block(&mut self, reason: BlockReason) {
        self.in_flight = InFlight::Idle;
        self.set_phase(EntryPhase::Blocked(reason));
    }

    fn set_phase(&mut self, phase: EntryPhase) {
        tracing::info!("entry phase {:?} -> {:?}", self.state.phase, phase);
        self.state.phase = phase;
    }
}

/// What the UI should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Preloader,
    Error { title: String, message: String },
    PreJoin { media_error: Option<String> },
    Call,
}

impl Screen {
    /// Decide the screen for `phase`, formatting boundary times in `tz`.
    ///
    /// A ready room whose session is disconnected shows the pre-join screen,
    /// unless the page is framed, where the call view stays up.
    pub fn decide<Tz: TimeZone>(
        phase: &EntryPhase,
        record: Option<&RoomRecord>,
        connection: &ConnectionState,
        framed: bool,
        tz: &Tz,
    ) -> Screen
    where
        Tz::Offset: std::fmt::Display,
    {
        let title = record.map(|r| r.title.as_str()).unwrap_or_default();
        match phase {
            EntryPhase::Preloading | EntryPhase::AwaitingMedia | EntryPhase::Connecting => {
                Screen::Preloader
            }
            EntryPhase::Blocked(reason) => {
                let (heading, message) = match reason {
                    BlockReason::InvalidToken => (
                        "The room is not accessible",
                        "The room token is not valid. Please enter the valid room token and try again."
                            .to_string(),
                    ),
                    BlockReason::NotYetOpen { opens_at } => (
                        "Room is not accessible yet",
                        format!(
                            "Room {title} will be accessible at {}",
                            format_boundary(*opens_at, tz)
                        ),
                    ),
                    BlockReason::Expired { expired_at } => (
                        "Room expired",
                        format!("Room {title} expired at {}", format_boundary(*expired_at, tz)),
                    ),
                    BlockReason::TokenError(reason) => (
                        "The room is not accessible",
                        format!("A session token could not be issued: {reason}"),
                    ),
                    BlockReason::ConnectFailed(reason) => (
                        "Unable to join the room",
                        format!("The connection to the room failed: {reason}"),
                    ),
                };
                Screen::Error {
                    title: heading.to_string(),
                    message,
                }
            }
            EntryPhase::Ready(mode) => {
                if *connection == ConnectionState::Disconnected && !framed {
                    let media_error = match mode {
                        ReadyMode::Manual { media_error } => media_error.clone(),
                        ReadyMode::Live => None,
                    };
                    Screen::PreJoin { media_error }
                } else {
                    Screen::Call
                }
            }
        }
    }
}
