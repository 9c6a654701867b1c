//! Append-only chat log.
//!
//! Messages are only ever appended, except for the AI message of the turn in
//! flight: its text is overwritten in place each time a new increment
//! arrives, until the turn seals it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::attachment::AttachmentRef;

/// Text of the AI message before the first increment arrives.
pub const PLACEHOLDER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// AI placeholder, nothing received yet.
    Pending,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub fn is_open(self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub attachments: Vec<AttachmentRef>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    Appended { index: usize, message: Message },
    Updated { index: usize, text: String },
    Finished { index: usize, status: MessageStatus },
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("last message is not an open AI message")]
    NoOpenAiMessage,

    #[error("{0:?} is not a terminal status")]
    NotTerminal(MessageStatus),
}

#[derive(Debug)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    events: broadcast::Sender<TranscriptEvent>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            messages: Vec::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.events.subscribe()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn append_user(&mut self, text: impl Into<String>, attachments: Vec<AttachmentRef>) -> usize {
        self.push(Message {
            role: Role::User,
            text: text.into(),
            attachments,
            status: MessageStatus::Complete,
            created_at: Utc::now(),
        })
    }

    pub fn append_placeholder_ai(&mut self) -> usize {
        self.push(Message {
            role: Role::Ai,
            text: PLACEHOLDER.to_string(),
            attachments: Vec::new(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Overwrite the text of the open AI message at the tail.
    pub fn update_last_ai(&mut self, text: &str) -> Result<(), TranscriptError> {
        let index = self.open_ai_index()?;
        let message = &mut self.messages[index];
        message.text.clear();
        message.text.push_str(text);
        message.status = MessageStatus::Streaming;
        let _ = self.events.send(TranscriptEvent::Updated {
            index,
            text: text.to_string(),
        });
        Ok(())
    }

    /// Seal the open AI message, optionally replacing its text.
    pub fn finish_last_ai(&mut self, status: MessageStatus, text: Option<String>) -> Result<(), TranscriptError> {
        if status.is_open() {
            return Err(TranscriptError::NotTerminal(status));
        }
        let index = self.open_ai_index()?;
        if let Some(text) = text {
            self.messages[index].text = text.clone();
            let _ = self.events.send(TranscriptEvent::Updated { index, text });
        }
        self.messages[index].status = status;
        let _ = self.events.send(TranscriptEvent::Finished { index, status });
        Ok(())
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        let _ = self.events.send(TranscriptEvent::Cleared);
    }

    fn push(&mut self, message: Message) -> usize {
        let index = self.messages.len();
        self.messages.push(message.clone());
        let _ = self.events.send(TranscriptEvent::Appended { index, message });
        index
    }

    fn open_ai_index(&self) -> Result<usize, TranscriptError> {
        match self.messages.last() {
            Some(m) if m.role == Role::Ai && m.status.is_open() => Ok(self.messages.len() - 1),
            _ => Err(TranscriptError::NoOpenAiMessage),
        }
    }
}
