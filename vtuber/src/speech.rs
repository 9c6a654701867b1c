// Speech engine selection

use tracing::{info, warn};
use tts_core::{AudioOutput, PiperSynthesizer, QueuedEngine, TextOnlySynthesizer, VoiceCatalog};

use crate::{config::AppConfig, error::AppError};

/// Start the speech worker. Falls back to logging the text when no Piper
/// voice can be loaded.
pub fn build_engine(config: &AppConfig) -> Result<QueuedEngine, AppError> {
    let piper = VoiceCatalog::from_mapfile(&config.voice_map).and_then(|catalog| {
        info!("Loaded {} voice(s) for {:?}", catalog.voices().len(), catalog.languages());
        PiperSynthesizer::new(catalog, audio_output(config))
    });
    let engine = match piper {
        Ok(synth) => QueuedEngine::spawn(synth)?,
        Err(e) => {
            warn!("Piper unavailable ({e:#}), speech will only be logged");
            QueuedEngine::spawn(TextOnlySynthesizer::default())?
        }
    };
    Ok(engine)
}

#[cfg(feature = "playback")]
fn audio_output(_config: &AppConfig) -> AudioOutput {
    AudioOutput::Speaker
}

#[cfg(not(feature = "playback"))]
fn audio_output(config: &AppConfig) -> AudioOutput {
    AudioOutput::WavDir(config.audio_out_dir.clone())
}
