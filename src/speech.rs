//! Text-to-speech using `piper-rs`, played back through `rodio`.
//!
//! Audio for each spoken span is synthesized to a WAV file under the audio
//! cache and reused when the same text comes up again. [`SpeechEngine::speak`]
//! blocks until playback has finished; the reading worker relies on that for
//! pacing.

use anyhow::{Context, Result};
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;

pub trait SpeechEngine {
    /// Speak `text` and return once playback has completed.
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Builds a speech engine on the thread that will use it; audio output
/// handles cannot move between threads.
pub type SpeechFactory = Arc<dyn Fn() -> Result<Box<dyn SpeechEngine>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub model_path: PathBuf,
    pub espeak_path: PathBuf,
    pub cache_dir: PathBuf,
    pub speed: f32,
    pub volume: f32,
}

impl From<&AppConfig> for SpeechSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model_path: PathBuf::from(&config.tts_model_path),
            espeak_path: PathBuf::from(&config.tts_espeak_path),
            cache_dir: PathBuf::from(&config.audio_cache_dir),
            speed: config.tts_speed,
            volume: config.tts_volume.clamp(0.0, 2.0),
        }
    }
}

pub fn piper_factory(settings: SpeechSettings) -> SpeechFactory {
    Arc::new(move || {
        let engine = PiperSpeech::new(settings.clone())?;
        Ok(Box::new(engine) as Box<dyn SpeechEngine>)
    })
}

pub struct PiperSpeech {
    settings: SpeechSettings,
    piper: PiperSpeechSynthesizer,
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl PiperSpeech {
    pub fn new(settings: SpeechSettings) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(settings.espeak_path.clone());
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because the variable is written once, before any synthesis starts.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }
        info!(
            model = %settings.model_path.display(),
            espeak_root = %espeak_path.display(),
            speed = settings.speed,
            "Initializing TTS engine"
        );

        let config_path = resolve_piper_config(&settings.model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                settings.model_path.display()
            );
        }
        let model = from_config_path(&config_path).context("Loading Piper model")?;
        let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        let (stream, handle) = OutputStream::try_default().context("Opening audio output")?;

        Ok(Self {
            settings,
            piper,
            _stream: stream,
            handle,
        })
    }

    fn audio_for(&self, text: &str) -> Result<PathBuf> {
        let path = cache_path(
            &self.settings.cache_dir,
            &self.settings.model_path,
            text,
            self.settings.speed,
        );
        if path.exists() {
            debug!(path = %path.display(), "Reusing cached span audio");
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Creating TTS cache directory")?;
        }
        synth_with_piper(&self.piper, &path, text, self.settings.speed)?;
        Ok(path)
    }
}

impl SpeechEngine for PiperSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        let path = self.audio_for(text)?;
        let sink = Sink::try_new(&self.handle).context("Creating sink")?;
        sink.set_volume(self.settings.volume);
        let reader = BufReader::new(File::open(&path)?);
        sink.append(Decoder::new(reader).context("Decoding span audio")?);
        sink.sleep_until_end();
        Ok(())
    }
}

fn cache_path(base: &Path, model_path: &Path, text: &str, speed: f32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(speed.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("tts-{hash}.wav"))
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that to avoid
/// duplicated segments like `/espeak-ng-data/espeak-ng-data/phonindex`.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path
        .file_name()
        .map(|n| n == "espeak-ng-data")
        .unwrap_or(false)
    {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path
        .extension()
        .map(|ext| ext == "onnx")
        .unwrap_or(false)
    {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

fn synth_with_piper(
    piper: &PiperSpeechSynthesizer,
    path: &Path,
    text: &str,
    speed: f32,
) -> Result<()> {
    debug!(
        path = %path.display(),
        speed,
        chars = text.len(),
        "Synthesizing span with Piper"
    );
    let output_config = if (speed - 1.0).abs() <= f32::EPSILON {
        None
    } else {
        Some(AudioOutputConfig {
            rate: Some(speed_to_rate_percent(speed)),
            volume: None,
            pitch: None,
            appended_silence_ms: None,
        })
    };
    piper
        .synthesize_to_file(path, text.to_string(), output_config)
        .context("Synthesizing audio")?;
    Ok(())
}

fn speed_to_rate_percent(speed: f32) -> u8 {
    let clamped = speed.clamp(0.5, 5.5);
    let percent = ((clamped - 0.5) / 5.0) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}
