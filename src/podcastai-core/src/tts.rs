//! TTS module for text-to-speech synthesis using kokoro-tiny.
//!
//! Lines are synthesized into WAV files inside an [`AudioDirectory`], which
//! also purges old files once they can no longer be played.

use async_trait::async_trait;
use chrono::Utc;
use kokoro_tiny::TtsEngine;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::collaborators::{ArtifactStore, SpeechSynthesizer, SynthesizedSpeech};
use crate::config::{AudioConfig, VoicesConfig};
use crate::error::PodcastError;
use crate::speaker::Speaker;

/// Kokoro output sample rate.
pub const SAMPLE_RATE: u32 = 24_000;

/// Maximum characters kokoro handles safely in one call.
const CHUNK_CHARS: usize = 200;

/// Directory holding synthesized audio, served under `url_prefix`.
#[derive(Debug, Clone)]
pub struct AudioDirectory {
    dir: PathBuf,
    url_prefix: String,
}

impl AudioDirectory {
    pub fn new(config: &AudioConfig) -> Result<Self, PodcastError> {
        std::fs::create_dir_all(&config.directory)?;
        Ok(Self {
            dir: config.directory.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write mono samples as a WAV file and return its public reference.
    pub async fn write_wav(
        &self,
        speaker: Speaker,
        samples: Vec<f32>,
    ) -> Result<String, PodcastError> {
        let file_name = artifact_file_name(speaker);
        let path = self.dir.join(&file_name);

        tokio::task::spawn_blocking(move || write_wav_file(&path, &samples))
            .await
            .map_err(|e| PodcastError::Synthesis(format!("WAV writer task failed: {}", e)))??;

        Ok(format!("{}/{}", self.url_prefix, file_name))
    }
}

#[async_trait]
impl ArtifactStore for AudioDirectory {
    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, PodcastError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }

            let modified = entry.metadata().await?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= max_age {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        removed += 1;
                        debug!(path = %path.display(), "deleted old audio file");
                    }
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "failed to delete audio file")
                    }
                }
            }
        }

        Ok(removed)
    }
}

/// Kokoro-backed speech synthesizer.
///
/// Synthesis is CPU-bound, so it runs on the blocking pool with the engine
/// behind a std mutex.
pub struct KokoroSynthesizer {
    engine: Arc<Mutex<TtsEngine>>,
    voices: VoicesConfig,
    output: AudioDirectory,
    available_voices: Vec<String>,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new(voices: VoicesConfig, output: AudioDirectory) -> Result<Self, PodcastError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PodcastError::Synthesis(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();
        let synthesizer = Self {
            engine: Arc::new(Mutex::new(engine)),
            voices,
            output,
            available_voices,
        };
        synthesizer.validate_all_voices()?;

        info!(voices = synthesizer.available_voices.len(), "kokoro engine ready");
        Ok(synthesizer)
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PodcastError> {
        if voice_id.is_empty() || !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PodcastError::ConfigError(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                format_voice_list(&self.available_voices)
            )));
        }
        Ok(())
    }

    fn validate_all_voices(&self) -> Result<(), PodcastError> {
        for speaker in Speaker::ORDER {
            self.validate_voice(self.voices.voice_for(speaker))?;
        }
        Ok(())
    }

    /// Synthesize text in chunks, since kokoro rejects long inputs.
    async fn render(&self, text: &str, voice_id: &str) -> Result<Vec<f32>, PodcastError> {
        let engine = Arc::clone(&self.engine);
        let chunks = split_into_chunks(text, CHUNK_CHARS);
        let voice_id = voice_id.to_string();

        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            render_chunks(&chunks, |chunk| {
                engine
                    .synthesize(chunk, Some(voice_id.as_str()))
                    .map_err(|e| PodcastError::Synthesis(format!("Synthesis failed: {}", e)))
            })
        })
        .await
        .map_err(|e| PodcastError::Synthesis(format!("Synthesis task failed: {}", e)))?
    }
}

/// Concatenate per-chunk audio with a short silence after each chunk.
fn render_chunks<F>(chunks: &[String], mut synthesize: F) -> Result<Vec<f32>, PodcastError>
where
    F: FnMut(&str) -> Result<Vec<f32>, PodcastError>,
{
    let mut all_samples = Vec::new();

    for chunk in chunks {
        all_samples.extend(synthesize(chunk)?);

        // 0.3s between chunks
        all_samples.extend(std::iter::repeat_n(0.0, (SAMPLE_RATE as usize * 3) / 10));
    }

    if all_samples.is_empty() {
        return Err(PodcastError::Synthesis("Nothing to synthesize".to_string()));
    }

    Ok(all_samples)
}

#[async_trait]
impl SpeechSynthesizer for KokoroSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        speaker: Speaker,
    ) -> Result<SynthesizedSpeech, PodcastError> {
        debug!(%speaker, chars = text.len(), "synthesizing");

        let samples = self.render(text, self.voices.voice_for(speaker)).await?;
        let samples = adjust_audio_speed(samples, self.voices.speed);
        let duration_secs = samples.len() as f64 / SAMPLE_RATE as f64;
        let audio_ref = self.output.write_wav(speaker, samples).await?;

        Ok(SynthesizedSpeech {
            audio_ref,
            duration_secs,
        })
    }
}

fn write_wav_file(path: &Path, samples: &[f32]) -> Result<(), PodcastError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| PodcastError::Synthesis(format!("Failed to create WAV: {}", e)))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| PodcastError::Synthesis(format!("Failed to write WAV: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| PodcastError::Synthesis(format!("Failed to finalize WAV: {}", e)))
}

/// `{speaker}_{millis}_{suffix}.wav`; the suffix keeps two files written in
/// the same millisecond apart.
fn artifact_file_name(speaker: Speaker) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.wav",
        speaker.id(),
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

fn format_voice_list(voices: &[String]) -> String {
    let mut english: Vec<&String> = voices
        .iter()
        .filter(|v| ["af_", "am_", "bf_", "bm_"].iter().any(|p| v.starts_with(p)))
        .collect();
    english.sort();

    english
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // Overlong sentence, fall back to commas
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Adjust audio playback speed using linear interpolation.
/// Rate < 1.0 = slower (e.g., 0.75 = 75% speed), Rate > 1.0 = faster.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 || rate <= 0.0 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_dir(tmp: &tempfile::TempDir) -> AudioDirectory {
        AudioDirectory::new(&AudioConfig {
            directory: tmp.path().join("audio"),
            url_prefix: "/static/audio/".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 35);
        }
    }

    #[test]
    fn test_split_long_sentence_on_commas() {
        let text = "one two three, four five six, seven eight nine.";
        let chunks = split_into_chunks(text, 16);
        assert_eq!(chunks, vec!["one two three,", "four five six,", "seven eight nine."]);
    }

    #[test]
    fn test_adjust_audio_speed() {
        let samples = vec![0.0; 100];
        assert_eq!(adjust_audio_speed(samples.clone(), 1.0).len(), 100);
        assert_eq!(adjust_audio_speed(samples.clone(), 2.0).len(), 50);
        assert_eq!(adjust_audio_speed(samples, 0.5).len(), 200);
    }

    #[test]
    fn test_render_chunks_inserts_gaps() {
        let chunks = vec!["One.".to_string(), "Two.".to_string()];
        let samples = render_chunks(&chunks, |_| Ok(vec![1.0; 10])).unwrap();

        let gap = (SAMPLE_RATE as usize * 3) / 10;
        assert_eq!(samples.len(), 2 * (10 + gap));
        assert_eq!(samples[9], 1.0);
        assert_eq!(samples[10], 0.0);
    }

    #[test]
    fn test_render_chunks_stops_on_first_failure() {
        let chunks = vec!["One.".to_string(), "Two.".to_string(), "Three.".to_string()];
        let mut calls = 0;
        let err = render_chunks(&chunks, |chunk| {
            calls += 1;
            if chunk == "Two." {
                Err(PodcastError::Synthesis("bad chunk".to_string()))
            } else {
                Ok(vec![0.5; 4])
            }
        })
        .unwrap_err();

        assert!(matches!(err, PodcastError::Synthesis(_)));
        assert_eq!(calls, 2);
        assert!(render_chunks(&[], |_| Ok(vec![])).is_err());
    }

    #[test]
    fn test_artifact_file_name() {
        let name = artifact_file_name(Speaker::Mira);
        assert!(name.starts_with("mira_"));
        assert!(name.ends_with(".wav"));
    }

    #[tokio::test]
    async fn test_write_wav_returns_public_reference() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = audio_dir(&tmp);

        let audio_ref = dir.write_wav(Speaker::Alex, vec![0.0; 2400]).await.unwrap();
        assert!(audio_ref.starts_with("/static/audio/alex_"));

        let file_name = audio_ref.rsplit('/').next().unwrap();
        let reader = hound::WavReader::open(dir.path().join(file_name)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.duration(), 2400);
    }

    #[tokio::test]
    async fn test_purge_removes_only_old_wav_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = audio_dir(&tmp);

        let old = dir.path().join("alex_old.wav");
        let fresh = dir.path().join("mira_fresh.wav");
        let other = dir.path().join("notes.txt");
        for path in [&old, &fresh, &other] {
            std::fs::write(path, b"x").unwrap();
        }
        let two_hours_ago = SystemTime::now() - Duration::from_secs(7200);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        let removed = dir.purge_older_than(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }
}
