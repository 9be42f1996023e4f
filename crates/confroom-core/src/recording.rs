use crate::room::RoomRecord;

const PROCESSING_NOTICE: &str = "Once this room is closed, we will start processing your recording. \
When the processing finishes, we will let you know and send you the link for the video.";

/// A recording edge inferred from consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Recording was already running when first observed.
    InProgress,
    Started,
    Finished,
}

/// User-facing notification for a [`RecordingEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingNotification {
    pub event: RecordingEvent,
    pub headline: String,
    pub message: String,
}

impl RecordingNotification {
    pub fn for_event(event: RecordingEvent, record: Option<&RoomRecord>) -> Self {
        let (headline, message) = match event {
            RecordingEvent::InProgress => ("Recording is in progress.", String::new()),
            RecordingEvent::Started => ("Recording has started.", String::new()),
            RecordingEvent::Finished => ("Recording Complete!", finished_message(record)),
        };
        Self {
            event,
            headline: headline.to_string(),
            message,
        }
    }
}

fn finished_message(record: Option<&RoomRecord>) -> String {
    let owner = record.map(|r| r.owner_name.as_str()).unwrap_or_default();
    match record.and_then(|r| r.email.as_deref()) {
        Some(email) => format!(
            "{PROCESSING_NOTICE} Once this conference is completed, the recording will be processed \
and when it's ready the link will be sent to {owner} to {email}."
        ),
        None => format!(
            "{PROCESSING_NOTICE} Once this conference is completed, the recording will be processed \
and when it's ready the link will be sent to {owner} via notification. They should keep the \
browser window open after the hangup. Recording processing can take several hours."
        ),
    }
}

/// Turns a stream of `is_recording` samples into discrete notifications.
///
/// Samples must be fed in arrival order. Only one notification is active;
/// a newer one replaces it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    previous: Option<bool>,
    active: Option<RecordingNotification>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a sample against the previous one. Does not touch state.
    pub fn classify(previous: Option<bool>, current: bool) -> Option<RecordingEvent> {
        match (previous, current) {
            (None, true) => Some(RecordingEvent::InProgress),
            (Some(false), true) => Some(RecordingEvent::Started),
            (Some(true), false) => Some(RecordingEvent::Finished),
            _ => None,
        }
    }

    /// Feed one sample. Returns the notification it raised, if any.
    pub fn observe(
        &mut self,
        is_recording: bool,
        record: Option<&RoomRecord>,
    ) -> Option<&RecordingNotification> {
        let event = Self::classify(self.previous, is_recording);
        self.previous = Some(is_recording);

        let event = event?;
        tracing::info!("recording notification: {event:?}");
        self.active = Some(RecordingNotification::for_event(event, record));
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&RecordingNotification> {
        self.active.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.active = None;
    }

    /// Forget the previous sample and the active notification, so the
    /// next session starts from an unknown recording state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn previous(&self) -> Option<bool> {
        self.previous
    }
}
