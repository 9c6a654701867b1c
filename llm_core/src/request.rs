use reqwest::multipart::{Form, Part};

use crate::error::StreamError;

/// A file sent alongside the question.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// One question for the backend.
///
/// The backend accepts a single file per question.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub question: String,
    pub file: Option<FilePart>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: FilePart) -> Self {
        self.file = Some(file);
        self
    }

    /// Multipart body with a `question` field and an optional `file` field.
    pub fn into_form(self) -> Result<Form, StreamError> {
        let form = Form::new().text("question", self.question);
        match self.file {
            Some(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|e| StreamError::InvalidAttachment(format!("{}: {e}", file.mime)))?;
                Ok(form.part("file", part))
            }
            None => Ok(form),
        }
    }
}
