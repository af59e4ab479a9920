mod messages;
mod state;
mod update;
mod view;

pub use state::App;

use crate::config::AppConfig;
use crate::reader::{ReadAloud, Viewport};
use iced::{Size, window};
use std::path::PathBuf;

/// Height reserved above the page canvas for the toolbar.
pub(crate) const TOOLBAR_HEIGHT: f32 = 48.0;

/// Area left for the page canvas in a window of the given size.
pub fn canvas_viewport(window: Size) -> Viewport {
    Viewport::new(
        window.width.max(1.0),
        (window.height - TOOLBAR_HEIGHT).max(1.0),
    )
}

/// Launch the viewer, optionally opening `initial_pdf` right away.
pub fn run_app(
    reader: ReadAloud,
    config: AppConfig,
    initial_pdf: Option<PathBuf>,
) -> iced::Result {
    let window_settings = window::Settings {
        size: Size::new(config.window_width, config.window_height),
        // Close requests are handled so the reading position gets saved.
        exit_on_close_request: false,
        ..window::Settings::default()
    };

    iced::application("PDF Read-Aloud", App::update, App::view)
        .window(window_settings)
        .subscription(App::subscription)
        .run_with(move || App::bootstrap(reader, config, initial_pdf))
}
