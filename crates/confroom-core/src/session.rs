//! Capability interfaces for the collaborators the entry flow drives.
//!
//! The real-time transport, room directory and token service live outside
//! this crate; the controller only sees these traits.

use async_trait::async_trait;

use crate::errors::ShellError;
use crate::events::{ConnectionState, TrackKind};
use crate::room::RoomLookup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub kind: TrackKind,
    pub name: String,
}

impl LocalTrack {
    pub fn audio(name: &str) -> Self {
        Self {
            kind: TrackKind::Audio,
            name: name.to_string(),
        }
    }

    pub fn video(name: &str) -> Self {
        Self {
            kind: TrackKind::Video,
            name: name.to_string(),
        }
    }
}

/// Snapshot of the session's local tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTrackSet {
    pub tracks: Vec<LocalTrack>,
    /// Acquisition still in flight.
    pub acquiring: bool,
}

impl LocalTrackSet {
    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    /// At least one audio and one video track, acquisition settled.
    pub fn is_media_ready(&self) -> bool {
        !self.acquiring && self.has_kind(TrackKind::Audio) && self.has_kind(TrackKind::Video)
    }
}

/// Short-lived token admitting a participant to the real-time session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub room_type: Option<String>,
}

/// Pushed by the real-time session into the controller, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    TracksChanged(LocalTrackSet),
    RecordingChanged(bool),
    ConnectionStateChanged(ConnectionState),
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn fetch_room_record(&self, token: &str) -> Result<RoomLookup, ShellError>;
}

/// Authentication strategy, chosen once at startup.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_credential(
        &self,
        identity: &str,
        room_id_token: &str,
    ) -> Result<SessionCredential, ShellError>;

    async fn sign_in(&self, _passcode: Option<&str>) -> Result<(), ShellError> {
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ShellError> {
        Ok(())
    }
}

/// The real-time media session. Owns the local track set; the controller
/// only requests acquisition and device toggles.
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Start acquiring microphone and camera. Progress is reported through
    /// [`SessionSignal::TracksChanged`].
    async fn acquire_local_tracks(&self) -> Result<(), ShellError>;
    fn local_tracks(&self) -> LocalTrackSet;
    async fn connect(&self, credential: &SessionCredential) -> Result<(), ShellError>;
    async fn disconnect(&self);
    fn connection_state(&self) -> ConnectionState;
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), ShellError>;
    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), ShellError>;
    fn is_microphone_enabled(&self) -> bool;
    fn is_camera_enabled(&self) -> bool;
}
