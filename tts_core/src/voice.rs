use std::{fs, path::{Path, PathBuf}};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A voice an engine can speak with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    /// Voice identifier, e.g. "kss" or "Google 한국의".
    pub name: String,
    /// Locale tag as written by the source, e.g. "ko_KR" or "ko-KR".
    pub locale: String,
    /// Model config path for file-backed voices.
    pub config: Option<PathBuf>,
    pub speaker_id: Option<i64>,
    pub display_name: Option<String>,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            config: None,
            speaker_id: None,
            display_name: None,
        }
    }

    pub fn speaks(&self, locale: &str) -> bool {
        same_locale(&self.locale, locale)
    }
}

/// Compare locale tags, treating `-` and `_` as the same separator.
pub fn same_locale(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.trim().replace('_', "-").to_ascii_lowercase();
    norm(a) == norm(b)
}

/// Pick a voice for `locale` whose name contains `name_hint`.
///
/// Without a hint the first voice for the locale wins. `None` means the
/// engine should use its own default.
pub fn select_voice<'a>(voices: &'a [Voice], locale: &str, name_hint: Option<&str>) -> Option<&'a Voice> {
    voices.iter().find(|v| {
        v.speaks(locale) && name_hint.map_or(true, |hint| v.name.contains(hint))
    })
}

/// Voices loaded from a `map.json` file.
///
/// Two layouts are accepted per language key:
///
/// ```json
/// {
///   "de_DE": "models/de_DE/de_DE-mls-medium.onnx.json",
///   "en_US": { "config": "models/en_US/lessac.onnx.json", "default_speaker": 0 },
///   "ko_KR": {
///     "default_voice": "kss",
///     "voices": { "kss": { "config": "models/ko_KR/kss.onnx.json", "display_name": "KSS" } }
///   }
/// }
/// ```
///
/// The default voice of each language is listed first.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapEntry {
    Path(String),
    Voices {
        default_voice: String,
        voices: std::collections::BTreeMap<String, VoiceSpec>,
    },
    Single {
        config: String,
        default_speaker: Option<i64>,
    },
}

#[derive(Deserialize)]
struct VoiceSpec {
    config: String,
    speaker_id: Option<i64>,
    display_name: Option<String>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    pub fn from_mapfile<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let entries: std::collections::BTreeMap<String, MapEntry> =
            serde_json::from_str(text).with_context(|| "map.json must be a JSON object of language entries")?;

        let mut voices = Vec::new();
        for (lang, entry) in entries {
            match entry {
                MapEntry::Path(config) => voices.push(Voice {
                    config: Some(PathBuf::from(config)),
                    ..Voice::new(lang.clone(), lang)
                }),
                MapEntry::Single { config, default_speaker } => voices.push(Voice {
                    config: Some(PathBuf::from(config)),
                    speaker_id: default_speaker,
                    ..Voice::new(lang.clone(), lang)
                }),
                MapEntry::Voices { default_voice, voices: specs } => {
                    if !specs.contains_key(&default_voice) {
                        anyhow::bail!("default voice '{default_voice}' is not listed for language {lang}");
                    }
                    let mut lang_voices: Vec<Voice> = specs
                        .into_iter()
                        .map(|(id, spec)| Voice {
                            config: Some(PathBuf::from(spec.config)),
                            speaker_id: spec.speaker_id,
                            display_name: spec.display_name,
                            ..Voice::new(id, lang.clone())
                        })
                        .collect();
                    // Default voice first so it wins locale-only selection.
                    lang_voices.sort_by_key(|v| v.name != default_voice);
                    voices.extend(lang_voices);
                }
            }
        }
        Ok(Self { voices })
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Sorted, de-duplicated language keys.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.voices.iter().map(|v| v.locale.clone()).collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// Default voice for a locale, falling back to the first voice overall.
    pub fn default_for(&self, locale: &str) -> Option<&Voice> {
        select_voice(&self.voices, locale, None).or_else(|| self.voices.first())
    }
}
