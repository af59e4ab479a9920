//! Configuration loading for the PDF reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! sensible defaults so the UI can still launch.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "default_window_width")]
    pub window_width: f32,
    #[serde(default = "default_window_height")]
    pub window_height: f32,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    pub resume_last_position: bool,
    #[serde(default = "default_position_file")]
    pub position_file: String,
    #[serde(default = "default_tts_model")]
    pub tts_model_path: String,
    #[serde(default = "default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "default_tts_speed")]
    pub tts_speed: f32,
    #[serde(default = "default_tts_volume")]
    pub tts_volume: f32,
    #[serde(default = "default_audio_cache_dir")]
    pub audio_cache_dir: String,
    #[serde(default = "default_highlight_color")]
    pub highlight_color: HighlightColor,
    #[serde(default = "default_highlight_width")]
    pub highlight_width: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            window_width: default_window_width(),
            window_height: default_window_height(),
            log_level: default_log_level(),
            resume_last_position: false,
            position_file: default_position_file(),
            tts_model_path: default_tts_model(),
            tts_espeak_path: default_tts_espeak_path(),
            tts_speed: default_tts_speed(),
            tts_volume: default_tts_volume(),
            audio_cache_dir: default_audio_cache_dir(),
            highlight_color: default_highlight_color(),
            highlight_width: default_highlight_width(),
        }
    }
}

impl AppConfig {
    pub fn position_path(&self) -> PathBuf {
        PathBuf::from(&self.position_file)
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

fn default_window_width() -> f32 {
    900.0
}

fn default_window_height() -> f32 {
    700.0
}

fn default_position_file() -> String {
    "reading_position.json".to_string()
}

fn default_tts_model() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

fn default_tts_speed() -> f32 {
    1.0
}

fn default_tts_volume() -> f32 {
    1.0
}

fn default_audio_cache_dir() -> String {
    ".cache/tts".to_string()
}

fn default_highlight_color() -> HighlightColor {
    HighlightColor {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    }
}

fn default_highlight_width() -> f32 {
    1.0
}

fn default_log_level() -> LogLevel {
    LogLevel::default()
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct HighlightColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
