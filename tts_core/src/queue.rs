use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    engine::{SpeechEngine, Utterance, UtteranceReporter},
    voice::Voice,
};

/// Blocking renderer behind a [`QueuedEngine`].
pub trait Synthesizer: Send + 'static {
    fn voices(&self) -> Vec<Voice>;

    /// Make the utterance audible. Returns once it has been fully rendered.
    fn render(&mut self, utterance: &Utterance) -> anyhow::Result<()>;
}

/// Speech engine that renders utterances one at a time on a worker thread,
/// strictly in submission order.
pub struct QueuedEngine {
    tx: mpsc::UnboundedSender<(Utterance, UtteranceReporter)>,
    voices: Vec<Voice>,
}

impl QueuedEngine {
    pub fn spawn<S: Synthesizer>(mut synth: S) -> anyhow::Result<Self> {
        let voices = synth.voices();
        let (tx, mut rx) = mpsc::unbounded_channel::<(Utterance, UtteranceReporter)>();

        thread::Builder::new()
            .name("speech-engine".into())
            .spawn(move || {
                while let Some((utterance, reporter)) = rx.blocking_recv() {
                    reporter.started();
                    match synth.render(&utterance) {
                        Ok(()) => {
                            debug!("Utterance {} finished", utterance.id);
                            reporter.finished();
                        }
                        Err(e) => reporter.failed(format!("{e:#}")),
                    }
                }
                debug!("Speech engine queue closed");
            })?;

        Ok(Self { tx, voices })
    }
}

impl SpeechEngine for QueuedEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn submit(&self, utterance: Utterance, reporter: UtteranceReporter) {
        if let Err(mpsc::error::SendError((_, reporter))) = self.tx.send((utterance, reporter)) {
            reporter.failed("speech engine is not running");
        }
    }
}

/// Logs utterances instead of producing audio.
#[derive(Debug, Default)]
pub struct TextOnlySynthesizer {
    voices: Vec<Voice>,
}

impl TextOnlySynthesizer {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

impl Synthesizer for TextOnlySynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn render(&mut self, utterance: &Utterance) -> anyhow::Result<()> {
        if utterance.voice.is_none() && !self.voices.is_empty() {
            warn!("No voice selected for locale {}, using default", utterance.locale);
        }
        info!(target: "speech", "[{}] {}", utterance.locale, utterance.text);
        Ok(())
    }
}
