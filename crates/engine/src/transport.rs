use std::path::Path;

use thiserror::Error;

/// Per-recipient failure. Every variant ends up as a FAILED outcome; the
/// variant only decides what gets logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transmission failed: {0}")]
    Transmit(String),

    #[error("cannot build message: {0}")]
    Message(String),

    #[error("interrupted before sending")]
    Interrupted,
}

/// An image embedded in every message and referenced from HTML as `cid:image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub const CONTENT_ID: &'static str = "image";

    /// Content type is guessed from the file extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let ext = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let content_type = match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            _ => "application/octet-stream",
        };

        Self {
            file_name,
            content_type: content_type.to_owned(),
            bytes,
        }
    }
}

/// The parts of a message shared by every recipient of a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    pub from: String,
    pub subject: String,
    pub image: Option<InlineImage>,
}

/// One message as handed to a connection.
#[derive(Debug, Clone, Copy)]
pub struct Outgoing<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub html: &'a str,
    pub image: Option<&'a InlineImage>,
}

impl Letter {
    pub fn to<'a>(&'a self, address: &'a str, html: &'a str) -> Outgoing<'a> {
        Outgoing {
            from: &self.from,
            to: address,
            subject: &self.subject,
            html,
            image: self.image.as_ref(),
        }
    }
}

/// Opens ready-to-use connections: connected, secured and authenticated.
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection, SendError>;
}

/// A live mail-submission connection, owned by exactly one worker.
pub trait Connection: Send + 'static {
    /// Cheap round trip to check the connection is still usable.
    fn is_alive(&mut self) -> bool;

    fn send(&mut self, message: &Outgoing<'_>) -> Result<(), SendError>;

    fn close(self) -> Result<(), SendError>;
}
