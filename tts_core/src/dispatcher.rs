use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::watch;
use tracing::debug;

use crate::{
    clean::clean_for_speech,
    engine::{SpeechEngine, Utterance, UtteranceHandle, UtteranceReporter},
    voice::select_voice,
};

/// How utterances should sound.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub locale: String,
    /// Preferred substring of the voice name.
    pub voice_hint: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            locale: "ko-KR".to_string(),
            voice_hint: Some("Google".to_string()),
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// Hands utterances to a speech engine and tracks whether it is speaking.
///
/// `speak` is fire-and-forget: it cleans the text, picks a voice and
/// submits. There is no queue here. Ordering comes from the engine, and
/// callers only speak text that is already final.
#[derive(Clone)]
pub struct SpeechDispatcher {
    engine: Arc<dyn SpeechEngine>,
    settings: SpeechSettings,
    speaking: Arc<watch::Sender<bool>>,
    next_id: Arc<AtomicU64>,
}

impl SpeechDispatcher {
    pub fn new(engine: Arc<dyn SpeechEngine>, settings: SpeechSettings) -> Self {
        let (speaking, _) = watch::channel(false);
        Self {
            engine,
            settings,
            speaking: Arc::new(speaking),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Speak `text`. Returns `None` when nothing speakable remains after
    /// cleaning, in which case the engine is not touched.
    pub fn speak(&self, text: &str) -> Option<UtteranceHandle> {
        let text = clean_for_speech(text);
        if text.is_empty() {
            return None;
        }

        let voices = self.engine.voices();
        let voice = select_voice(&voices, &self.settings.locale, self.settings.voice_hint.as_deref()).cloned();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Dispatching utterance {} ({} chars, voice={:?})",
            id,
            text.chars().count(),
            voice.as_ref().map(|v| v.name.as_str())
        );

        let utterance = Utterance {
            id,
            text,
            locale: self.settings.locale.clone(),
            voice,
            rate: self.settings.rate,
            pitch: self.settings.pitch,
        };
        let (reporter, handle) = UtteranceReporter::new(id, self.speaking.clone());
        self.engine.submit(utterance, reporter);
        Some(handle)
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking.borrow()
    }

    /// Observe the speaking flag, e.g. to drive a character's mouth.
    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.speaking.subscribe()
    }
}
