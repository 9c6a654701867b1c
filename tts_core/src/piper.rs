use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::{debug, info};

use crate::{
    engine::Utterance,
    queue::Synthesizer,
    voice::{Voice, VoiceCatalog},
};

/// Where rendered audio goes.
#[derive(Debug, Clone)]
pub enum AudioOutput {
    /// One 16-bit mono WAV file per utterance.
    WavDir(PathBuf),
    /// The default output device.
    #[cfg(feature = "playback")]
    Speaker,
}

struct LoadedModel {
    synth: PiperSpeechSynthesizer,
    sample_rate: u32,
}

/// Piper-backed synthesizer.
///
/// Models are loaded lazily on first use of a voice and kept for the life of
/// the synthesizer; it lives on the engine's worker thread, so no locking.
pub struct PiperSynthesizer {
    catalog: VoiceCatalog,
    output: AudioOutput,
    models: HashMap<PathBuf, LoadedModel>,
}

impl PiperSynthesizer {
    pub fn new(catalog: VoiceCatalog, output: AudioOutput) -> anyhow::Result<Self> {
        if catalog.is_empty() {
            anyhow::bail!("voice catalog is empty");
        }
        if let AudioOutput::WavDir(dir) = &output {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create audio directory {}", dir.display()))?;
        }
        info!("Piper synthesizer ready with {} voice(s)", catalog.voices().len());
        Ok(Self {
            catalog,
            output,
            models: HashMap::new(),
        })
    }

    /// Read sample rate from model config JSON
    fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

        Ok(sample_rate as u32)
    }

    fn resolve_voice(&self, utterance: &Utterance) -> anyhow::Result<Voice> {
        let chosen = utterance
            .voice
            .as_ref()
            .filter(|v| v.config.is_some())
            .or_else(|| self.catalog.default_for(&utterance.locale));
        chosen
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no voice available for locale {}", utterance.locale))
    }

    fn model_for(&mut self, cfg_path: &Path) -> anyhow::Result<&LoadedModel> {
        if !self.models.contains_key(cfg_path) {
            let sample_rate = Self::read_sample_rate(cfg_path)?;
            let model = piper_rs::from_config_path(cfg_path)
                .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
            let synth = PiperSpeechSynthesizer::new(model)?;
            debug!("Loaded piper model {} ({} Hz)", cfg_path.display(), sample_rate);
            self.models
                .insert(cfg_path.to_path_buf(), LoadedModel { synth, sample_rate });
        }
        self.models
            .get(cfg_path)
            .ok_or_else(|| anyhow::anyhow!("model cache miss for {}", cfg_path.display()))
    }

    fn synthesize(&mut self, utterance: &Utterance) -> anyhow::Result<(Vec<f32>, u32)> {
        let voice = self.resolve_voice(utterance)?;
        let cfg_path = voice
            .config
            .ok_or_else(|| anyhow::anyhow!("voice {} has no model config", voice.name))?;
        if (utterance.pitch - 1.0).abs() > f32::EPSILON {
            debug!("Piper voices ignore pitch {}", utterance.pitch);
        }

        let model = self.model_for(&cfg_path)?;
        // piper-rs has no public speaker selection, so `speaker_id` is not applied here.
        let iter: PiperSpeechStreamParallel = model
            .synth
            .synthesize_parallel(utterance.text.clone(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }
        Ok((samples, model.sample_rate))
    }
}

impl Synthesizer for PiperSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.catalog.voices().to_vec()
    }

    fn render(&mut self, utterance: &Utterance) -> anyhow::Result<()> {
        let (samples, sample_rate) = self.synthesize(utterance)?;
        match &self.output {
            AudioOutput::WavDir(dir) => {
                let path = dir.join(format!("utterance-{:05}.wav", utterance.id));
                write_wav(&path, &samples, sample_rate)?;
                debug!("Wrote {}", path.display());
                Ok(())
            }
            #[cfg(feature = "playback")]
            AudioOutput::Speaker => play(&samples, sample_rate, utterance.rate),
        }
    }
}

/// Write PCM f32 samples as a 16-bit mono WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("wav create err: {}", path.display()))?;

    const I16_MAX_F32: f32 = i16::MAX as f32;
    for &s in samples {
        // Clamp and convert f32 [-1.0, 1.0] -> i16
        let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
    }
    writer.finalize().map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    Ok(())
}

#[cfg(feature = "playback")]
fn play(samples: &[f32], sample_rate: u32, rate: f32) -> anyhow::Result<()> {
    use rodio::{buffer::SamplesBuffer, OutputStream, Sink};

    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|e| anyhow::anyhow!("Failed to open default device: {e}"))?;
    let sink = Sink::try_new(&stream_handle)
        .map_err(|e| anyhow::anyhow!("Failed to create sink: {e}"))?;
    sink.set_speed(rate);
    // Piper outputs mono audio at the model's sample rate
    sink.append(SamplesBuffer::new(1, sample_rate, samples.to_vec()));
    sink.sleep_until_end();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..2205).map(|i| (i as f32 * 0.05).sin()).collect();
        write_wav(&path, &samples, 22_050).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 2205);
    }

    #[test]
    fn test_read_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.onnx.json");
        fs::write(&path, r#"{ "audio": { "sample_rate": 16000 } }"#).unwrap();
        assert_eq!(PiperSynthesizer::read_sample_rate(&path).unwrap(), 16_000);

        fs::write(&path, r#"{ "audio": {} }"#).unwrap();
        assert!(PiperSynthesizer::read_sample_rate(&path).is_err());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = PiperSynthesizer::new(VoiceCatalog::default(), AudioOutput::WavDir(dir.path().to_path_buf()));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_voice_prefers_selected() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VoiceCatalog::from_json(
            r#"{ "ko_KR": "models/ko_KR/kss.onnx.json", "en_US": "models/en_US/lessac.onnx.json" }"#,
        )
        .unwrap();
        let synth = PiperSynthesizer::new(catalog.clone(), AudioOutput::WavDir(dir.path().to_path_buf())).unwrap();

        let mut utterance = Utterance {
            id: 1,
            text: "hi".into(),
            locale: "ko-KR".into(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
        };
        assert_eq!(synth.resolve_voice(&utterance).unwrap().locale, "ko_KR");

        utterance.voice = catalog.default_for("en_US").cloned();
        assert_eq!(synth.resolve_voice(&utterance).unwrap().locale, "en_US");

        // A voice without a model config (e.g. from another engine) is ignored.
        utterance.voice = Some(Voice::new("Google 한국의", "ko-KR"));
        assert_eq!(synth.resolve_voice(&utterance).unwrap().locale, "ko_KR");
    }
}
