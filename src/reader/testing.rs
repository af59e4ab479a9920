//! In-memory documents and speech engines for exercising the reader.

use crate::document::{
    BBox, DocumentOpener, DocumentSource, PageRaster, PageText, TextBlock, TextLine, TextSpan,
};
use crate::speech::{SpeechEngine, SpeechFactory};
use anyhow::{Result, anyhow, bail};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const PAGE_SIZE: (f32, f32) = (100.0, 200.0);

#[derive(Clone)]
pub struct FakeDocument {
    path: PathBuf,
    pages: Arc<Vec<PageText>>,
}

impl FakeDocument {
    /// One block per page, one line per span.
    pub fn with_pages(pages: &[&[&str]]) -> Self {
        let pages = pages
            .iter()
            .map(|spans| PageText {
                blocks: vec![TextBlock {
                    lines: spans
                        .iter()
                        .enumerate()
                        .map(|(idx, text)| TextLine {
                            spans: vec![span(text, idx)],
                        })
                        .collect(),
                }],
            })
            .collect();
        Self::with_layout(pages)
    }

    pub fn with_layout(pages: Vec<PageText>) -> Self {
        Self {
            path: PathBuf::new(),
            pages: Arc::new(pages),
        }
    }

    pub fn blank(page_count: usize) -> Self {
        Self::with_layout(vec![PageText::default(); page_count])
    }

    pub fn opener(&self) -> DocumentOpener {
        let template = self.clone();
        Arc::new(move |path: &Path| {
            let mut document = template.clone();
            document.path = path.to_path_buf();
            Ok(Box::new(document) as Box<dyn DocumentSource>)
        })
    }

    pub fn failing_opener() -> DocumentOpener {
        Arc::new(|path: &Path| Err(anyhow!("{} is not a PDF", path.display())))
    }
}

pub fn span(text: &str, line: usize) -> TextSpan {
    let y = 10.0 + line as f32 * 12.0;
    TextSpan {
        text: text.to_string(),
        bbox: BBox::new(10.0, y, 90.0, y + 10.0),
    }
}

impl DocumentSource for FakeDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        if index >= self.pages.len() {
            bail!("page {index} out of range");
        }
        Ok(PAGE_SIZE)
    }

    fn render_page(&self, index: usize) -> Result<PageRaster> {
        if index >= self.pages.len() {
            bail!("page {index} out of range");
        }
        Ok(PageRaster {
            width: 10,
            height: 20,
            pixels: vec![255; 10 * 20 * 4],
        })
    }

    fn page_text(&self, index: usize) -> Result<PageText> {
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("page {index} out of range"))
    }
}

/// Speaks instantly and records every utterance.
#[derive(Clone, Default)]
pub struct RecordingSpeech {
    spoken: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingSpeech {
    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn factory(&self) -> SpeechFactory {
        let engine = self.clone();
        Arc::new(move || Ok(Box::new(engine.clone()) as Box<dyn SpeechEngine>))
    }
}

impl SpeechEngine for RecordingSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail_on.as_deref() == Some(text) {
            bail!("synthesis failed for {text:?}");
        }
        Ok(())
    }
}

/// Blocks inside every utterance until the test releases it.
#[derive(Clone)]
pub struct GatedSpeech {
    spoken: Arc<Mutex<Vec<String>>>,
    started_tx: Sender<String>,
    started_rx: Receiver<String>,
    gate_tx: Sender<()>,
    gate_rx: Receiver<()>,
}

impl GatedSpeech {
    pub fn new() -> Self {
        let (started_tx, started_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        Self {
            spoken: Arc::default(),
            started_tx,
            started_rx,
            gate_tx,
            gate_rx,
        }
    }

    pub fn factory(&self) -> SpeechFactory {
        let engine = self.clone();
        Arc::new(move || Ok(Box::new(engine.clone()) as Box<dyn SpeechEngine>))
    }

    /// Text of the next utterance that started, if one starts in time.
    pub fn wait_started(&self) -> Option<String> {
        self.started_rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    /// Let `count` utterances finish.
    pub fn release(&self, count: usize) {
        for _ in 0..count {
            let _ = self.gate_tx.send(());
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for GatedSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        let _ = self.started_tx.send(text.to_string());
        let _ = self.gate_rx.recv_timeout(Duration::from_secs(5));
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
