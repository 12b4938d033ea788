use reqwest::StatusCode;

/// Classification failures. None of these are fatal to the pipeline; the
/// dispatcher turns them into an in-channel reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier rejected the access token")]
    Unauthorized,

    #[error("classifier returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode classifier response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("intent '{intent}' is missing the '{entity}' entity")]
    MissingEntity {
        intent: String,
        entity: &'static str,
    },

    #[error("invalid '{entity}' entity: {message}")]
    InvalidEntity {
        entity: &'static str,
        message: String,
    },

    #[error("no sound in recording")]
    EmptyAudio,
}

impl Error {
    pub(crate) fn missing(intent: &str, entity: &'static str) -> Self {
        Self::MissingEntity {
            intent: intent.to_string(),
            entity,
        }
    }

    pub(crate) fn invalid(entity: &'static str, message: impl std::fmt::Display) -> Self {
        Self::InvalidEntity {
            entity,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
