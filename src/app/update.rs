use super::canvas_viewport;
use super::messages::Message;
use super::state::App;
use iced::event::{self, Event};
use iced::{Size, Subscription, Task, time, window};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

impl App {
    pub fn subscription(app: &App) -> Subscription<Message> {
        let mut subscriptions: Vec<Subscription<Message>> = vec![
            event::listen_with(runtime_event_to_message),
            window::close_requests().map(Message::CloseRequested),
        ];

        if app.reader.is_active() {
            subscriptions.push(time::every(Duration::from_millis(50)).map(Message::Tick));
        }

        Subscription::batch(subscriptions)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        let task = self.reduce(message);
        self.reader.poll();
        if let Some(error) = self.reader.take_error() {
            self.error = Some(error);
        }
        self.sync_page_image();
        task
    }

    fn reduce(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::LoadPdf => return Task::perform(pick_pdf(), Message::PdfPicked),
            Message::PdfPicked(Some(path)) => self.open(path),
            Message::PdfPicked(None) => debug!("PDF picker dismissed"),
            Message::Play => {
                self.reader.play();
            }
            Message::Pause => {
                self.reader.pause();
            }
            Message::Resume => {
                self.reader.resume();
            }
            Message::PrevPage => {
                self.reader.prev_page();
            }
            Message::NextPage => {
                self.reader.next_page();
            }
            Message::PageInputChanged(value) => self.page_input = value,
            Message::GoToPage => {
                if !self.reader.go_to_page_input(&self.page_input) {
                    debug!(input = %self.page_input, "Go to page ignored");
                }
            }
            Message::PlayPage => {
                if !self.reader.play_page_input(&self.page_input) {
                    debug!(input = %self.page_input, "Play page ignored");
                }
            }
            Message::ToggleFullscreen => return self.toggle_fullscreen(),
            Message::DismissError => self.error = None,
            Message::WindowResized { width, height } => {
                self.window_size = Size::new(width, height);
                self.reader.set_viewport(canvas_viewport(self.window_size));
            }
            Message::CloseRequested(id) => {
                info!(?id, "Close requested; saving position and stopping reader");
                self.reader.close();
                return iced::exit();
            }
            Message::Tick(_) => {}
        }
        Task::none()
    }

    fn toggle_fullscreen(&mut self) -> Task<Message> {
        self.fullscreen = !self.fullscreen;
        let fullscreen = self.fullscreen;
        let restore = Size::new(self.config.window_width, self.config.window_height);
        info!(fullscreen, "Toggling fullscreen");
        window::get_latest().and_then(move |id| {
            if fullscreen {
                window::change_mode(id, window::Mode::Fullscreen)
            } else {
                Task::batch([
                    window::change_mode(id, window::Mode::Windowed),
                    window::resize(id, restore),
                ])
            }
        })
    }
}

async fn pick_pdf() -> Option<PathBuf> {
    rfd::AsyncFileDialog::new()
        .add_filter("PDF Files", &["pdf"])
        .set_title("Select PDF File")
        .pick_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}

fn runtime_event_to_message(
    event: Event,
    _status: event::Status,
    _window_id: window::Id,
) -> Option<Message> {
    match event {
        Event::Window(window::Event::Resized(size)) => Some(Message::WindowResized {
            width: size.width,
            height: size.height,
        }),
        _ => None,
    }
}
