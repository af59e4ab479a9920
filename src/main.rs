//! Entry point for the PDF read-aloud viewer.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse the optional PDF path from the command line.
//! - Load user configuration from `conf/config.toml`.
//! - Build the read-aloud controller and launch the GUI.

mod app;
mod cancellation;
mod config;
mod document;
mod position;
mod reader;
mod speech;
mod text_utils;

use crate::app::{canvas_viewport, run_app};
use crate::config::load_config;
use crate::document::pdf_opener;
use crate::reader::{ReadAloud, ReaderSettings};
use crate::speech::{SpeechSettings, piper_factory};
use anyhow::{Context, Result, anyhow};
use iced::Size;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let pdf_path = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(level = %config.log_level, "Starting PDF read-aloud viewer");
    info!(
        model = %config.tts_model_path,
        espeak = %config.tts_espeak_path,
        speed = config.tts_speed,
        "Active TTS configuration"
    );

    let settings = ReaderSettings {
        resume_last_position: config.resume_last_position,
        position_file: config.position_path(),
    };
    let viewport = canvas_viewport(Size::new(config.window_width, config.window_height));
    let reader = ReadAloud::new(
        pdf_opener(),
        piper_factory(SpeechSettings::from(&config)),
        settings,
        viewport,
    )?;
    run_app(reader, config, pdf_path).context("Failed to start the GUI")?;
    Ok(())
}

fn parse_args() -> Result<Option<PathBuf>> {
    let Some(path) = env::args().nth(1) else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    info!(path = %path.display(), "Opening PDF from command line");
    Ok(Some(path))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
