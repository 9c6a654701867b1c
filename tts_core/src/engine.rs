//! The boundary between the dispatcher and a speech engine.
//!
//! An engine receives an [`Utterance`] together with an
//! [`UtteranceReporter`] and reports the lifecycle of that utterance
//! through it: started, then finished or failed. Engines serialize
//! utterances themselves, one at a time, in submission order.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::voice::Voice;

/// One request to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub locale: String,
    /// `None` lets the engine use its default voice.
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceStatus {
    /// Submitted, waiting for the engine.
    Pending,
    /// Audible right now.
    Active,
    Done,
    Failed(String),
}

impl UtteranceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UtteranceStatus::Done | UtteranceStatus::Failed(_))
    }
}

pub trait SpeechEngine: Send + Sync {
    /// Voices available for selection.
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance. Must not block on synthesis.
    fn submit(&self, utterance: Utterance, reporter: UtteranceReporter);
}

/// Engine-side half of an utterance's status channel.
///
/// Every report also updates the dispatcher's shared speaking flag. A
/// reporter dropped before a terminal report marks the utterance failed so
/// the flag never stays stuck on.
#[derive(Debug)]
pub struct UtteranceReporter {
    id: u64,
    status: watch::Sender<UtteranceStatus>,
    speaking: Arc<watch::Sender<bool>>,
}

impl UtteranceReporter {
    pub(crate) fn new(id: u64, speaking: Arc<watch::Sender<bool>>) -> (Self, UtteranceHandle) {
        let (status, rx) = watch::channel(UtteranceStatus::Pending);
        let reporter = Self { id, status, speaking };
        (reporter, UtteranceHandle { id, status: rx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started(&self) {
        self.status.send_replace(UtteranceStatus::Active);
        self.speaking.send_replace(true);
    }

    pub fn finished(self) {
        self.status.send_replace(UtteranceStatus::Done);
        self.speaking.send_replace(false);
    }

    /// Engine errors stop here: they are logged and only clear the flag.
    pub fn failed(self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Utterance {} failed: {}", self.id, reason);
        self.status.send_replace(UtteranceStatus::Failed(reason));
        self.speaking.send_replace(false);
    }
}

impl Drop for UtteranceReporter {
    fn drop(&mut self) {
        if !self.status.borrow().is_terminal() {
            self.status
                .send_replace(UtteranceStatus::Failed("utterance dropped by engine".to_string()));
            self.speaking.send_replace(false);
        }
    }
}

/// Caller-side view of one utterance.
#[derive(Debug, Clone)]
pub struct UtteranceHandle {
    id: u64,
    status: watch::Receiver<UtteranceStatus>,
}

impl UtteranceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> UtteranceStatus {
        self.status.borrow().clone()
    }

    /// Wait until the utterance is done or has failed.
    pub async fn finished(mut self) -> UtteranceStatus {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                return self.status.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_lifecycle() {
        let speaking = Arc::new(watch::channel(false).0);
        let (reporter, handle) = UtteranceReporter::new(7, speaking.clone());
        assert_eq!(handle.status(), UtteranceStatus::Pending);

        reporter.started();
        assert_eq!(handle.status(), UtteranceStatus::Active);
        assert!(*speaking.borrow());

        reporter.finished();
        assert_eq!(handle.clone().finished().await, UtteranceStatus::Done);
        assert!(!*speaking.borrow());
    }

    #[tokio::test]
    async fn test_dropped_reporter_fails() {
        let speaking = Arc::new(watch::channel(false).0);
        let (reporter, handle) = UtteranceReporter::new(1, speaking.clone());
        reporter.started();
        drop(reporter);
        assert!(matches!(handle.finished().await, UtteranceStatus::Failed(_)));
        assert!(!*speaking.borrow());
    }

    #[tokio::test]
    async fn test_failure_clears_flag() {
        let speaking = Arc::new(watch::channel(false).0);
        let (reporter, handle) = UtteranceReporter::new(2, speaking.clone());
        reporter.started();
        reporter.failed("device busy");
        assert_eq!(handle.status(), UtteranceStatus::Failed("device busy".into()));
        assert!(!*speaking.borrow());
    }
}
