use super::TOOLBAR_HEIGHT;
use super::messages::Message;
use super::state::App;
use crate::config::HighlightColor;
use crate::reader::{HighlightMark, PlaybackState};
use iced::alignment::Vertical;
use iced::widget::canvas::{Frame, Path, Stroke};
use iced::widget::image::Image;
use iced::widget::{
    button, canvas, column, container, horizontal_space, row, stack, text, text_input,
};
use iced::{Color, ContentFit, Element, Length, Padding, Point, Rectangle, Renderer, Theme, mouse};

impl App {
    pub fn view(&self) -> Element<'_, Message> {
        let controls = self.reader.controls();

        let toolbar = row![
            button("Load PDF").on_press(Message::LoadPdf),
            button("Play").on_press_maybe(controls.play.then_some(Message::Play)),
            button("Pause").on_press_maybe(controls.pause.then_some(Message::Pause)),
            button("Resume").on_press_maybe(controls.resume.then_some(Message::Resume)),
            button("Prev Page").on_press_maybe(controls.prev_page.then_some(Message::PrevPage)),
            button("Next Page").on_press_maybe(controls.next_page.then_some(Message::NextPage)),
            text_input("Page", &self.page_input)
                .on_input(Message::PageInputChanged)
                .on_submit(Message::GoToPage)
                .width(Length::Fixed(64.0)),
            button("Go to Page")
                .on_press_maybe(controls.go_to_page.then_some(Message::GoToPage)),
            button("Play Page").on_press_maybe(controls.play_page.then_some(Message::PlayPage)),
            text(self.reader.page_label()),
            text(status_label(self.reader.state())),
            horizontal_space(),
            button(if self.fullscreen {
                "Exit Fullscreen"
            } else {
                "Fullscreen"
            })
            .on_press(Message::ToggleFullscreen),
        ]
        .spacing(8)
        .padding(8)
        .align_y(Vertical::Center)
        .height(Length::Fixed(TOOLBAR_HEIGHT));

        let mut layers = stack![self.page_layer(), self.highlight_layer()]
            .width(Length::Fill)
            .height(Length::Fill);
        if let Some(error) = &self.error {
            layers = layers.push(error_banner(error));
        }

        column![toolbar, layers].into()
    }

    fn page_layer(&self) -> Element<'_, Message> {
        let (Some(image), Some(page)) = (&self.page_image, self.reader.displayed()) else {
            let hint = if self.reader.has_document() {
                "This page could not be displayed"
            } else {
                "Load a PDF to start reading"
            };
            return container(text(hint))
                .center(Length::Fill)
                .into();
        };
        let placement = page.placement;
        container(
            Image::new(image.handle.clone())
                .width(Length::Fixed(placement.width as f32))
                .height(Length::Fixed(placement.height as f32))
                .content_fit(ContentFit::Fill),
        )
        .padding(Padding {
            top: placement.y.max(0) as f32,
            left: placement.x.max(0) as f32,
            ..Padding::ZERO
        })
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
    }

    fn highlight_layer(&self) -> Element<'_, Message> {
        canvas(HighlightLayer {
            marks: self.reader.highlights().to_vec(),
            color: to_color(self.config.highlight_color),
            width: self.config.highlight_width,
        })
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
    }
}

fn error_banner(error: &str) -> Element<'_, Message> {
    container(
        row![
            text(error).color(Color::WHITE),
            horizontal_space(),
            button("Dismiss").on_press(Message::DismissError),
        ]
        .spacing(8)
        .align_y(Vertical::Center),
    )
    .padding(8)
    .width(Length::Fill)
    .style(|_theme: &Theme| {
        container::Style::default().background(Color::from_rgb(0.6, 0.1, 0.1))
    })
    .into()
}

fn status_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "",
        PlaybackState::Reading => "Reading",
        PlaybackState::Paused => "Paused",
    }
}

fn to_color(color: HighlightColor) -> Color {
    Color::from_rgba(color.r, color.g, color.b, color.a)
}

/// Underline strokes for every span spoken on the displayed page.
struct HighlightLayer {
    marks: Vec<HighlightMark>,
    color: Color,
    width: f32,
}

impl canvas::Program<Message> for HighlightLayer {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let stroke = Stroke::default()
            .with_color(self.color)
            .with_width(self.width);
        for mark in &self.marks {
            let line = Path::line(Point::new(mark.x0, mark.y), Point::new(mark.x1, mark.y));
            frame.stroke(&line, stroke);
        }
        vec![frame.into_geometry()]
    }
}
