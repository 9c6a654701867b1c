use std::{fs, path::Path, sync::Arc};

use llm_core::FilePart;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// Handle to a staged image, as shown in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub name: String,
}

impl AttachmentRef {
    /// Process-local locator for previewing the image.
    pub fn preview_url(&self) -> String {
        format!("attachment://{}", self.id)
    }
}

/// A staged image and its bytes.
#[derive(Debug, Clone)]
pub struct Attachment {
    reference: AttachmentRef,
    mime: String,
    data: Arc<Vec<u8>>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Result<Self, AppError> {
        let mime = mime.into();
        if !is_image_mime(&mime) {
            return Err(AppError::UnsupportedAttachment(format!("{mime} is not an image type")));
        }
        Ok(Self {
            reference: AttachmentRef {
                id: Uuid::new_v4(),
                name: name.into(),
            },
            mime,
            data: Arc::new(data),
        })
    }

    /// Load an image file picked by the user.
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let mime = image_mime_for_path(path)
            .ok_or_else(|| AppError::UnsupportedAttachment(path.display().to_string()))?;
        let data = fs::read(path).map_err(|source| AppError::AttachmentIo {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::new(name, mime, data)
    }

    pub fn reference(&self) -> &AttachmentRef {
        &self.reference
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub fn to_file_part(&self) -> FilePart {
        FilePart {
            file_name: self.reference.name.clone(),
            mime: self.mime.clone(),
            bytes: self.data.as_ref().clone(),
        }
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// Image MIME type for a file extension, if it is one we accept.
pub fn image_mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime)
}

/// Input being composed but not yet sent.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    text: String,
    attachments: Vec<Attachment>,
}

impl Composer {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn stage(&mut self, attachment: Attachment) {
        debug!("Staged {} ({} bytes)", attachment.reference.name, attachment.len());
        self.attachments.push(attachment);
    }

    /// Stage a pasted clipboard item. Anything that is not an image is
    /// skipped and yields `None`.
    pub fn paste(&mut self, name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Option<AttachmentRef> {
        match Attachment::new(name, mime, data) {
            Ok(attachment) => {
                let reference = attachment.reference.clone();
                self.stage(attachment);
                Some(reference)
            }
            Err(e) => {
                debug!("Paste ignored: {}", e);
                None
            }
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Take the staged input, leaving the composer empty.
    pub fn take(&mut self) -> (String, Vec<Attachment>) {
        (std::mem::take(&mut self.text), std::mem::take(&mut self.attachments))
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachments.clear();
    }
}
