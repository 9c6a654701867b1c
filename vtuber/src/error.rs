use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Backend error: {0}")]
    Backend(#[from] llm_core::StreamError),

    #[error("Speech engine error: {0}")]
    Speech(#[from] anyhow::Error),

    #[error("Cannot read attachment {path}: {source}")]
    AttachmentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported attachment: {0}")]
    UnsupportedAttachment(String),

    #[error("Unknown motion: {0}")]
    UnknownMotion(String),
}
