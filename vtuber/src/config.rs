// Runtime configuration, read from the environment

use std::path::PathBuf;

use tts_core::SpeechSettings;

use crate::{error::AppError, motion::Motion};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: String,
    pub speech: SpeechSettings,
    pub voice_map: PathBuf,
    pub audio_out_dir: PathBuf,
    /// Motion played when an answer finishes streaming.
    pub completion_motion: Option<Motion>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000/chat".to_string(),
            speech: SpeechSettings::default(),
            voice_map: PathBuf::from("models/map.json"),
            audio_out_dir: PathBuf::from("speech-out"),
            completion_motion: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset values keep their defaults;
    /// values that are set but unusable are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend_url = lookup("VTUBER_BACKEND_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.backend_url);

        let locale = lookup("VTUBER_SPEECH_LOCALE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.speech.locale);

        // An explicitly empty hint disables name matching.
        let voice_hint = match lookup("VTUBER_VOICE_HINT") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.trim().to_string()),
            None => defaults.speech.voice_hint,
        };

        let rate = match lookup("VTUBER_SPEECH_RATE") {
            Some(v) => parse_positive("VTUBER_SPEECH_RATE", &v)?,
            None => defaults.speech.rate,
        };

        let pitch = match lookup("VTUBER_SPEECH_PITCH") {
            Some(v) => parse_positive("VTUBER_SPEECH_PITCH", &v)?,
            None => defaults.speech.pitch,
        };

        let voice_map = lookup("VTUBER_VOICE_MAP")
            .map(PathBuf::from)
            .unwrap_or(defaults.voice_map);

        let audio_out_dir = lookup("VTUBER_AUDIO_OUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.audio_out_dir);

        let completion_motion = match lookup("VTUBER_COMPLETION_MOTION") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.parse::<Motion>()?),
            None => None,
        };

        Ok(Self {
            backend_url,
            speech: SpeechSettings {
                locale,
                voice_hint,
                rate,
                pitch,
            },
            voice_map,
            audio_out_dir,
            completion_motion,
        })
    }
}

fn parse_positive(key: &str, value: &str) -> Result<f32, AppError> {
    match value.trim().parse::<f32>() {
        Ok(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(AppError::InvalidConfig(format!("{key} must be a positive number, got {value:?}"))),
    }
}
