use std::path::PathBuf;
use std::time::Instant;

use iced::window;

/// Messages emitted by the UI.
#[derive(Debug, Clone)]
pub enum Message {
    LoadPdf,
    PdfPicked(Option<PathBuf>),
    Play,
    Pause,
    Resume,
    PrevPage,
    NextPage,
    PageInputChanged(String),
    GoToPage,
    PlayPage,
    ToggleFullscreen,
    DismissError,
    WindowResized { width: f32, height: f32 },
    CloseRequested(window::Id),
    Tick(Instant),
}
