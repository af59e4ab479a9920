//! The single long-lived reading worker.
//!
//! The worker owns its own document handle and speech engine and executes
//! one reading pass at a time. Commands are only looked at between spans:
//! the speech call blocks until the span has been spoken, so a pause or stop
//! takes effect once the current utterance finishes.

use crate::cancellation::StopFlag;
use crate::document::{BBox, DocumentOpener, DocumentSource};
use crate::speech::{SpeechEngine, SpeechFactory};
use crate::text_utils::speakable_text;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum WorkerCommand {
    Load(PathBuf),
    Start {
        pass_id: u64,
        page: usize,
        stop: StopFlag,
    },
    Pause,
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassEnd {
    EndOfDocument,
    Paused,
    Stopped,
    /// A newer command (start, load, shutdown) took over.
    Superseded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Loaded {
        path: PathBuf,
    },
    LoadFailed {
        path: PathBuf,
        error: String,
    },
    PageEntered {
        pass_id: u64,
        page: usize,
    },
    Speaking {
        pass_id: u64,
        page: usize,
        bbox: BBox,
    },
    Finished {
        pass_id: u64,
        end: PassEnd,
    },
}

pub struct ReaderWorker {
    commands: Sender<WorkerCommand>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderWorker {
    pub fn spawn(opener: DocumentOpener, speech: SpeechFactory) -> Result<Self> {
        let (command_tx, command_rx) = unbounded::<WorkerCommand>();
        let (event_tx, event_rx) = unbounded::<WorkerEvent>();

        let handle = thread::Builder::new()
            .name("read-aloud".to_string())
            .spawn(move || {
                let speech = speech().map_err(|err| {
                    warn!("Speech engine unavailable: {err:#}");
                    format!("{err:#}")
                });
                let mut worker = Worker {
                    commands: command_rx,
                    events: event_tx,
                    opener,
                    document: None,
                    speech,
                };
                worker.run();
            })
            .context("Spawning reading worker")?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            handle: Some(handle),
        })
    }

    pub fn send(&self, command: WorkerCommand) {
        debug!(?command, "Sending worker command");
        if self.commands.send(command).is_err() {
            warn!("Reading worker is gone; command dropped");
        }
    }

    pub fn drain_events(&self) -> Vec<WorkerEvent> {
        self.events.try_iter().collect()
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!("Shutting down reading worker");
            let _ = self.commands.send(WorkerCommand::Shutdown);
            if handle.join().is_err() {
                warn!("Reading worker panicked");
            }
        }
    }
}

impl Drop for ReaderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    commands: Receiver<WorkerCommand>,
    events: Sender<WorkerEvent>,
    opener: DocumentOpener,
    document: Option<Box<dyn DocumentSource>>,
    speech: Result<Box<dyn SpeechEngine>, String>,
}

/// Why a pass must stop at a span boundary.
enum Interrupt {
    Pause,
    Stop,
    Takeover(WorkerCommand),
}

impl Worker {
    fn run(&mut self) {
        let mut pending: Option<WorkerCommand> = None;
        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match self.commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            match command {
                WorkerCommand::Load(path) => self.load(path),
                WorkerCommand::Start {
                    pass_id,
                    page,
                    stop,
                } => pending = self.read_pass(pass_id, page, &stop),
                WorkerCommand::Pause | WorkerCommand::Stop => {}
                WorkerCommand::Shutdown => break,
            }
        }
        debug!("Reading worker exited");
    }

    fn load(&mut self, path: PathBuf) {
        self.document = None;
        match (self.opener)(&path) {
            Ok(document) => {
                info!(path = %path.display(), pages = document.page_count(), "Worker opened document");
                self.document = Some(document);
                self.emit(WorkerEvent::Loaded { path });
            }
            Err(err) => {
                warn!(path = %path.display(), "Worker failed to open document: {err:#}");
                self.emit(WorkerEvent::LoadFailed {
                    path,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    /// Speak from the first span of `start_page` until the end of the
    /// document or an interruption. Returns a command that has to run next.
    fn read_pass(
        &mut self,
        pass_id: u64,
        start_page: usize,
        stop: &StopFlag,
    ) -> Option<WorkerCommand> {
        let Some(document) = self.document.as_deref() else {
            let _ = self.events.send(WorkerEvent::Finished {
                pass_id,
                end: PassEnd::Failed("No document loaded".to_string()),
            });
            return None;
        };
        let engine = match self.speech.as_mut() {
            Ok(engine) => engine,
            Err(reason) => {
                let _ = self.events.send(WorkerEvent::Finished {
                    pass_id,
                    end: PassEnd::Failed(format!("Speech engine unavailable: {reason}")),
                });
                return None;
            }
        };

        info!(pass_id, page = start_page + 1, "Reading pass started");
        let page_count = document.page_count();
        let mut page = start_page;
        while page < page_count {
            let text = match document.page_text(page) {
                Ok(text) => text,
                Err(err) => {
                    warn!(page = page + 1, "Failed to extract page text: {err:#}");
                    let _ = self.events.send(WorkerEvent::Finished {
                        pass_id,
                        end: PassEnd::Failed(format!("{err:#}")),
                    });
                    return None;
                }
            };

            for span in text.spans() {
                if let Some(interrupt) = check_boundary(&self.commands, stop) {
                    return end_pass(&self.events, pass_id, interrupt);
                }
                let Some(spoken) = speakable_text(&span.text) else {
                    continue;
                };
                let _ = self.events.send(WorkerEvent::Speaking {
                    pass_id,
                    page,
                    bbox: span.bbox,
                });
                if let Err(err) = engine.speak(&spoken) {
                    warn!(page = page + 1, "Failed to speak span: {err:#}");
                }
            }

            if let Some(interrupt) = check_boundary(&self.commands, stop) {
                return end_pass(&self.events, pass_id, interrupt);
            }
            page += 1;
            if page < page_count {
                debug!(pass_id, page = page + 1, "Advancing to next page");
                let _ = self.events.send(WorkerEvent::PageEntered { pass_id, page });
            }
        }

        info!(pass_id, "Reading pass reached the end of the document");
        let _ = self.events.send(WorkerEvent::Finished {
            pass_id,
            end: PassEnd::EndOfDocument,
        });
        None
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.events.send(event);
    }
}

fn check_boundary(commands: &Receiver<WorkerCommand>, stop: &StopFlag) -> Option<Interrupt> {
    if stop.is_raised() {
        return Some(Interrupt::Stop);
    }
    match commands.try_recv() {
        Ok(WorkerCommand::Pause) => Some(Interrupt::Pause),
        Ok(WorkerCommand::Stop) => Some(Interrupt::Stop),
        Ok(other) => Some(Interrupt::Takeover(other)),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Disconnected) => Some(Interrupt::Takeover(WorkerCommand::Shutdown)),
    }
}

fn end_pass(
    events: &Sender<WorkerEvent>,
    pass_id: u64,
    interrupt: Interrupt,
) -> Option<WorkerCommand> {
    let (end, next) = match interrupt {
        Interrupt::Pause => (PassEnd::Paused, None),
        Interrupt::Stop => (PassEnd::Stopped, None),
        Interrupt::Takeover(command) => (PassEnd::Superseded, Some(command)),
    };
    info!(pass_id, ?end, "Reading pass interrupted");
    let _ = events.send(WorkerEvent::Finished { pass_id, end });
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::{FakeDocument, GatedSpeech, RecordingSpeech, wait_for};
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    /// Pass ends seen so far; draining for one pass keeps the others.
    #[derive(Default)]
    struct PassEnds {
        seen: HashMap<u64, PassEnd>,
    }

    impl PassEnds {
        fn wait(&mut self, worker: &ReaderWorker, pass: u64) -> Option<PassEnd> {
            wait_for(Duration::from_secs(5), || {
                for event in worker.drain_events() {
                    if let WorkerEvent::Finished { pass_id, end } = event {
                        self.seen.insert(pass_id, end);
                    }
                }
                self.seen.contains_key(&pass)
            });
            self.seen.get(&pass).cloned()
        }
    }

    fn finished(worker: &ReaderWorker, pass: u64) -> Option<PassEnd> {
        PassEnds::default().wait(worker, pass)
    }

    #[test]
    fn speaks_every_page_in_order() {
        let speech = RecordingSpeech::default();
        let document = FakeDocument::with_pages(&[&["a", "b"], &["c"], &["d"]]);
        let worker = ReaderWorker::spawn(document.opener(), speech.factory()).unwrap();
        worker.send(WorkerCommand::Load("three.pdf".into()));
        worker.send(WorkerCommand::Start {
            pass_id: 1,
            page: 0,
            stop: StopFlag::new(),
        });

        assert_eq!(finished(&worker, 1), Some(PassEnd::EndOfDocument));
        assert_eq!(speech.spoken(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn start_without_document_fails() {
        let speech = RecordingSpeech::default();
        let document = FakeDocument::with_pages(&[&["a"]]);
        let worker = ReaderWorker::spawn(document.opener(), speech.factory()).unwrap();
        worker.send(WorkerCommand::Start {
            pass_id: 7,
            page: 0,
            stop: StopFlag::new(),
        });
        assert!(matches!(finished(&worker, 7), Some(PassEnd::Failed(_))));
        assert!(speech.spoken().is_empty());
    }

    #[test]
    fn load_failure_is_reported() {
        let speech = RecordingSpeech::default();
        let worker = ReaderWorker::spawn(FakeDocument::failing_opener(), speech.factory()).unwrap();
        worker.send(WorkerCommand::Load("broken.pdf".into()));
        let mut failed = None;
        wait_for(Duration::from_secs(5), || {
            for event in worker.drain_events() {
                if let WorkerEvent::LoadFailed { path, .. } = event {
                    failed = Some(path);
                }
            }
            failed.is_some()
        });
        assert_eq!(failed.as_deref(), Some(Path::new("broken.pdf")));
    }

    #[test]
    fn raised_stop_flag_ends_pass_at_next_span() {
        let speech = GatedSpeech::new();
        let document = FakeDocument::with_pages(&[&["a", "b"], &["c"]]);
        let worker = ReaderWorker::spawn(document.opener(), speech.factory()).unwrap();
        let stop = StopFlag::new();
        worker.send(WorkerCommand::Load("doc.pdf".into()));
        worker.send(WorkerCommand::Start {
            pass_id: 1,
            page: 0,
            stop: stop.clone(),
        });

        assert_eq!(speech.wait_started().as_deref(), Some("a"));
        stop.raise();
        speech.release(1);

        assert_eq!(finished(&worker, 1), Some(PassEnd::Stopped));
        assert_eq!(speech.spoken(), vec!["a"]);
    }

    #[test]
    fn new_start_supersedes_running_pass() {
        let speech = GatedSpeech::new();
        let document = FakeDocument::with_pages(&[&["a", "b"], &["c", "d"]]);
        let worker = ReaderWorker::spawn(document.opener(), speech.factory()).unwrap();
        worker.send(WorkerCommand::Load("doc.pdf".into()));
        worker.send(WorkerCommand::Start {
            pass_id: 1,
            page: 0,
            stop: StopFlag::new(),
        });
        assert_eq!(speech.wait_started().as_deref(), Some("a"));

        worker.send(WorkerCommand::Start {
            pass_id: 2,
            page: 1,
            stop: StopFlag::new(),
        });
        speech.release(10);

        let mut ends = PassEnds::default();
        assert_eq!(ends.wait(&worker, 2), Some(PassEnd::EndOfDocument));
        assert_eq!(ends.wait(&worker, 1), Some(PassEnd::Superseded));
        assert_eq!(speech.spoken(), vec!["a", "c", "d"]);
    }

    #[test]
    fn speech_errors_do_not_end_the_pass() {
        let speech = RecordingSpeech::failing_on("b");
        let document = FakeDocument::with_pages(&[&["a", "b", "c"]]);
        let worker = ReaderWorker::spawn(document.opener(), speech.factory()).unwrap();
        worker.send(WorkerCommand::Load("doc.pdf".into()));
        worker.send(WorkerCommand::Start {
            pass_id: 1,
            page: 0,
            stop: StopFlag::new(),
        });
        assert_eq!(finished(&worker, 1), Some(PassEnd::EndOfDocument));
        assert_eq!(speech.spoken(), vec!["a", "b", "c"]);
    }
}
