use super::canvas_viewport;
use super::messages::Message;
use crate::config::AppConfig;
use crate::reader::ReadAloud;
use iced::widget::image::Handle;
use iced::{Size, Task};
use std::path::PathBuf;
use tracing::{info, warn};

/// Core application state.
pub struct App {
    pub(super) reader: ReadAloud,
    pub(super) config: AppConfig,
    pub(super) page_input: String,
    pub(super) fullscreen: bool,
    pub(super) window_size: Size,
    pub(super) error: Option<String>,
    pub(super) page_image: Option<PageImage>,
}

/// Image handle for the bitmap the reader currently displays.
pub(super) struct PageImage {
    pub(super) generation: u64,
    pub(super) handle: Handle,
}

impl App {
    pub(super) fn bootstrap(
        reader: ReadAloud,
        config: AppConfig,
        initial_pdf: Option<PathBuf>,
    ) -> (App, Task<Message>) {
        let window_size = Size::new(config.window_width, config.window_height);
        let mut app = App {
            reader,
            config,
            page_input: String::from("1"),
            fullscreen: false,
            window_size,
            error: None,
            page_image: None,
        };
        app.reader.set_viewport(canvas_viewport(window_size));
        if let Some(path) = initial_pdf {
            app.open(path);
        }
        (app, Task::none())
    }

    pub(super) fn open(&mut self, path: PathBuf) {
        match self.reader.load(&path) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    page = self.reader.current_page() + 1,
                    "Opened PDF"
                );
                self.error = None;
            }
            Err(err) => {
                warn!(path = %path.display(), "Failed to open PDF: {err:#}");
                self.error = Some(format!("Could not open {}: {err:#}", path.display()));
            }
        }
        self.sync_page_image();
    }

    /// Rebuild the image handle when the reader displayed a new bitmap.
    pub(super) fn sync_page_image(&mut self) {
        let generation = self.reader.display_generation();
        let Some(page) = self.reader.displayed() else {
            self.page_image = None;
            return;
        };
        if self
            .page_image
            .as_ref()
            .is_some_and(|image| image.generation == generation)
        {
            return;
        }
        self.page_image = Some(PageImage {
            generation,
            handle: Handle::from_rgba(
                page.placement.width,
                page.placement.height,
                page.pixels.clone(),
            ),
        });
    }
}
