use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("room lookup failed: {0}")]
    RoomFetch(String),
    #[error("credential request failed: {0}")]
    Credential(String),
    #[error("local media unavailable: {0}")]
    MediaAcquisition(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("entry controller stopped")]
    ControllerStopped,
}
