//! Read-aloud controller.
//!
//! [`ReadAloud`] owns the open document, the playback state and the page
//! index, and drives the single reading worker. Every method runs on the UI
//! thread; the worker reports progress through events that are applied by
//! [`ReadAloud::poll`].
//!
//! Known behaviors kept on purpose:
//! - `resume` restarts the current page from its first span; no span cursor
//!   survives a pause.
//! - `next_page`/`prev_page` do not touch a running pass. The pass keeps
//!   reading its own page and re-syncs the display when it advances.

mod highlight;
mod renderer;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use highlight::HighlightMark;
pub use renderer::{DisplayedPage, Viewport};

use crate::cancellation::StopFlag;
use crate::document::{DocumentOpener, DocumentSource};
use crate::position::{ReadingPosition, load_position, save_position};
use crate::speech::SpeechFactory;
use anyhow::Result;
use renderer::PageRenderer;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use worker::{PassEnd, ReaderWorker, WorkerCommand, WorkerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Reading,
    Paused,
}

/// Which toolbar actions are currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub play: bool,
    pub pause: bool,
    pub resume: bool,
    pub prev_page: bool,
    pub next_page: bool,
    pub go_to_page: bool,
    pub play_page: bool,
}

#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub resume_last_position: bool,
    pub position_file: PathBuf,
}

pub struct ReadAloud {
    opener: DocumentOpener,
    document: Option<Box<dyn DocumentSource>>,
    renderer: PageRenderer,
    worker: ReaderWorker,
    settings: ReaderSettings,
    state: PlaybackState,
    current_page: usize,
    pass_id: u64,
    stop: StopFlag,
    viewport: Viewport,
    error: Option<String>,
    /// `Load` commands the worker has not answered yet.
    loads_in_flight: usize,
}

impl ReadAloud {
    pub fn new(
        opener: DocumentOpener,
        speech: SpeechFactory,
        settings: ReaderSettings,
        viewport: Viewport,
    ) -> Result<Self> {
        let worker = ReaderWorker::spawn(opener.clone(), speech)?;
        Ok(Self {
            opener,
            document: None,
            renderer: PageRenderer::default(),
            worker,
            settings,
            state: PlaybackState::Idle,
            current_page: 0,
            pass_id: 0,
            stop: StopFlag::new(),
            viewport,
            error: None,
            loads_in_flight: 0,
        })
    }

    /// Open `path`, replacing any loaded document. On failure nothing stays
    /// loaded.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.end_active_pass();
        self.state = PlaybackState::Idle;
        self.document = None;
        self.renderer.clear();
        self.current_page = 0;

        let document = (self.opener)(path)?;
        let page_count = document.page_count();
        if self.settings.resume_last_position {
            if let Some(page) = load_position(&self.settings.position_file)
                .and_then(|position| position.resume_page(path, page_count))
            {
                info!(page = page + 1, "Resuming from saved reading position");
                self.current_page = page;
            }
        }
        info!(path = %path.display(), pages = page_count, "Loaded document");
        self.document = Some(document);
        self.worker.send(WorkerCommand::Load(path.to_path_buf()));
        self.loads_in_flight += 1;
        self.render_current();
        Ok(())
    }

    pub fn play(&mut self) -> bool {
        if self.state != PlaybackState::Idle || self.document.is_none() {
            return false;
        }
        info!(page = self.current_page + 1, "Play");
        self.start_pass(self.current_page);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Reading {
            return false;
        }
        info!(page = self.current_page + 1, "Pause");
        self.state = PlaybackState::Paused;
        self.worker.send(WorkerCommand::Pause);
        true
    }

    /// Start over at the first span of the current page.
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        info!(page = self.current_page + 1, "Resume");
        self.start_pass(self.current_page);
        true
    }

    /// Jump to `page` and read from there.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.is_valid_page(page) {
            debug!(page, "Ignoring go-to for page out of range");
            return false;
        }
        self.pause();
        self.show_page(page);
        self.start_pass(page);
        true
    }

    /// Like [`go_to_page`](Self::go_to_page), but the running pass is stopped
    /// outright rather than paused.
    pub fn play_page(&mut self, page: usize) -> bool {
        if !self.is_valid_page(page) {
            debug!(page, "Ignoring play-page for page out of range");
            return false;
        }
        self.end_active_pass();
        self.show_page(page);
        self.start_pass(page);
        true
    }

    /// `go_to_page` from a 1-based page number typed by the user.
    pub fn go_to_page_input(&mut self, input: &str) -> bool {
        match parse_page_input(input) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    /// `play_page` from a 1-based page number typed by the user.
    pub fn play_page_input(&mut self, input: &str) -> bool {
        match parse_page_input(input) {
            Some(page) => self.play_page(page),
            None => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        let page = self.current_page + 1;
        if !self.is_valid_page(page) {
            return false;
        }
        self.show_page(page);
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.document.is_none() || self.current_page == 0 {
            return false;
        }
        self.show_page(self.current_page - 1);
        true
    }

    /// Re-display the current page after the viewport changed size.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport.is_empty() || viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.refresh();
    }

    pub fn refresh(&mut self) {
        if self.document.is_some() {
            self.render_current();
        }
    }

    /// Apply everything the worker reported since the last call.
    pub fn poll(&mut self) {
        for event in self.worker.drain_events() {
            self.apply(event);
        }
    }

    /// Persist the reading position and stop the worker.
    pub fn close(&mut self) {
        if let Some(document) = &self.document {
            let position = ReadingPosition::new(document.path(), self.current_page);
            if let Err(err) = save_position(&self.settings.position_file, &position) {
                warn!("Failed to save reading position: {err:#}");
            }
        }
        self.stop.raise();
        self.worker.shutdown();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map(|d| d.page_count()).unwrap_or(0)
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Worker events may still arrive: a pass is running or paused, or a
    /// load has not been acknowledged.
    pub fn is_active(&self) -> bool {
        self.state != PlaybackState::Idle || self.loads_in_flight > 0
    }

    pub fn page_label(&self) -> String {
        if self.document.is_none() {
            return "Page: 1".to_string();
        }
        format!("Page: {} / {}", self.current_page + 1, self.page_count())
    }

    pub fn controls(&self) -> Controls {
        let loaded = self.document.is_some();
        let last_page = self.page_count().saturating_sub(1);
        Controls {
            play: loaded && self.state == PlaybackState::Idle,
            pause: self.state == PlaybackState::Reading,
            resume: self.state == PlaybackState::Paused,
            prev_page: loaded && self.current_page > 0,
            next_page: loaded && self.current_page < last_page,
            go_to_page: loaded,
            play_page: loaded,
        }
    }

    pub fn displayed(&self) -> Option<&DisplayedPage> {
        self.renderer.current()
    }

    pub fn display_generation(&self) -> u64 {
        self.renderer.generation()
    }

    pub fn highlights(&self) -> &[HighlightMark] {
        self.renderer.marks().as_slice()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    fn is_valid_page(&self, page: usize) -> bool {
        self.document.is_some() && page < self.page_count()
    }

    fn start_pass(&mut self, page: usize) {
        self.pass_id = self.pass_id.wrapping_add(1);
        self.stop = StopFlag::new();
        self.state = PlaybackState::Reading;
        self.worker.send(WorkerCommand::Start {
            pass_id: self.pass_id,
            page,
            stop: self.stop.clone(),
        });
    }

    /// Raise the stop flag of the running pass, if any.
    fn end_active_pass(&mut self) {
        if self.state == PlaybackState::Idle {
            return;
        }
        debug!(pass_id = self.pass_id, "Stopping active pass");
        self.stop.raise();
        self.worker.send(WorkerCommand::Stop);
        self.state = PlaybackState::Idle;
    }

    fn show_page(&mut self, page: usize) {
        self.current_page = page;
        self.render_current();
    }

    fn render_current(&mut self) {
        let Some(document) = self.document.as_deref() else {
            return;
        };
        if let Err(err) = self
            .renderer
            .display(document, self.current_page, self.viewport)
        {
            warn!(page = self.current_page + 1, "Failed to display page: {err:#}");
            self.error = Some(format!("Failed to display page {}: {err:#}", self.current_page + 1));
        }
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Loaded { path } => {
                self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
                debug!(path = %path.display(), "Reading worker opened document");
            }
            WorkerEvent::LoadFailed { path, error } => {
                self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
                warn!(path = %path.display(), "Reading worker could not open document");
                self.error = Some(error);
            }
            WorkerEvent::PageEntered { pass_id, page } => {
                if pass_id != self.pass_id || !self.is_valid_page(page) {
                    debug!(pass_id, current = self.pass_id, "Ignoring stale page event");
                    return;
                }
                self.show_page(page);
            }
            WorkerEvent::Speaking {
                pass_id,
                page,
                bbox,
            } => {
                if pass_id != self.pass_id {
                    return;
                }
                self.renderer.highlight(page, bbox, self.viewport);
            }
            WorkerEvent::Finished { pass_id, end } => {
                if pass_id != self.pass_id {
                    debug!(pass_id, current = self.pass_id, "Ignoring stale pass end");
                    return;
                }
                match end {
                    PassEnd::Paused => {}
                    PassEnd::Failed(reason) => {
                        warn!(pass_id, "Reading pass failed: {reason}");
                        self.error = Some(reason);
                        self.state = PlaybackState::Idle;
                    }
                    PassEnd::EndOfDocument | PassEnd::Stopped | PassEnd::Superseded => {
                        info!(pass_id, ?end, "Reading pass finished");
                        self.state = PlaybackState::Idle;
                    }
                }
            }
        }
    }
}

/// 1-based page text to a page index; anything unparsable is `None`.
fn parse_page_input(input: &str) -> Option<usize> {
    let number: i64 = input.trim().parse().ok()?;
    usize::try_from(number.checked_sub(1)?).ok()
}
