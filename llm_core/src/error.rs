use thiserror::Error;

/// Ways a streamed answer can fail before or while it is read.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response has no readable body")]
    MissingBody,

    #[error("Response stream interrupted: {0}")]
    Body(String),
}
