//! Conference room entry core.
//!
//! Decides whether a scheduled room may be entered, drives auto-join
//! through local media, token issuance and session connect, and turns the
//! session's recording flag into notifications. The real-time transport,
//! room directory and token service are injected through [`session`].

pub mod api;
pub mod controller;
pub mod entry;
pub mod errors;
pub mod events;
pub mod frame;
pub mod params;
pub mod recording;
pub mod room;
pub mod session;
pub mod settings;
pub mod window;

pub use controller::{Collaborators, EntryHandle, EntrySnapshot, SessionEntryController};
pub use entry::{BlockReason, EntryPhase, ReadyMode, Screen};
pub use errors::ShellError;
pub use events::ShellEvent;
pub use window::{EligibilityVerdict, evaluate};
