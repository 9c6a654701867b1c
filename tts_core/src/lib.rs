//! Speech side of the pipeline: sentence segmentation of streamed text,
//! text cleaning, voice selection and dispatch of utterances to a speech
//! engine.

mod clean;
mod dispatcher;
mod engine;
mod piper;
mod queue;
mod segmenter;
mod voice;

pub use clean::clean_for_speech;
pub use dispatcher::{SpeechDispatcher, SpeechSettings};
pub use engine::{SpeechEngine, Utterance, UtteranceHandle, UtteranceReporter, UtteranceStatus};
pub use piper::{write_wav, AudioOutput, PiperSynthesizer};
pub use queue::{QueuedEngine, Synthesizer, TextOnlySynthesizer};
pub use segmenter::SentenceSegmenter;
pub use voice::{same_locale, select_voice, Voice, VoiceCatalog};
