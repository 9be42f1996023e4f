/// Out-of-band messages posted to the page that embeds the conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSignal {
    Close,
    Minimize,
}

impl FrameSignal {
    pub fn message(self) -> &'static str {
        match self {
            FrameSignal::Close => "close_conf_iframe",
            FrameSignal::Minimize => "minimize_conf_iframe",
        }
    }
}

/// The parent frame, if the page is embedded.
pub trait EmbeddingFrame: Send + Sync {
    /// True when the page location differs from its parent's.
    fn is_framed(&self) -> bool;
    fn post_to_parent(&self, message: &str);
}

/// Top-level page with no parent to signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopLevel;

impl EmbeddingFrame for TopLevel {
    fn is_framed(&self) -> bool {
        false
    }

    fn post_to_parent(&self, message: &str) {
        tracing::debug!("not framed, dropping parent message {message}");
    }
}

/// Post `signal` when framed. Returns whether it was sent.
pub fn send_signal(frame: &dyn EmbeddingFrame, signal: FrameSignal) -> bool {
    if !frame.is_framed() {
        return false;
    }
    tracing::info!("posting {} to parent frame", signal.message());
    frame.post_to_parent(signal.message());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFrame {
        posted: Mutex<Vec<String>>,
    }

    impl EmbeddingFrame for RecordingFrame {
        fn is_framed(&self) -> bool {
            true
        }

        fn post_to_parent(&self, message: &str) {
            self.posted.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn framed_page_receives_wire_messages() {
        let frame = RecordingFrame::default();
        assert!(send_signal(&frame, FrameSignal::Minimize));
        assert!(send_signal(&frame, FrameSignal::Close));
        assert_eq!(
            *frame.posted.lock().unwrap(),
            vec!["minimize_conf_iframe", "close_conf_iframe"]
        );
    }

    #[test]
    fn top_level_page_sends_nothing() {
        assert!(!send_signal(&TopLevel, FrameSignal::Close));
    }
}
