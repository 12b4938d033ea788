use {cortex_common::FromMessage, reqwest::StatusCode};

/// Flowdock transport errors.
///
/// Only [`Error::Connection`] and [`Error::StreamTerminated`] end the event
/// loop; everything else is scoped to a single event or refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream handshake did not succeed.
    #[error("stream connection failed: {message}")]
    Connection {
        status: Option<StatusCode>,
        message: String,
    },

    /// The stream closed or delivered an implausible record.
    #[error("stream terminated: {0}")]
    StreamTerminated(String),

    /// The flow list could not be fetched.
    #[error("flow directory unavailable ({status}): {body}")]
    DirectoryUnavailable { status: StatusCode, body: String },

    #[error("no flow with id {channel_id}")]
    ChannelNotFound { channel_id: String },

    /// A single stream record could not be decoded.
    #[error("undecodable event: {0}")]
    Decode(#[from] serde_json::Error),

    /// Flowdock refused a reply.
    #[error("reply rejected ({status}): {body}")]
    Post { status: StatusCode, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn channel_not_found(channel_id: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            channel_id: channel_id.into(),
        }
    }

    /// Whether the event loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::StreamTerminated(_))
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

cortex_common::impl_context!();
