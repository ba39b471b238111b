//! Per-session update logs and the worker that feeds them.

use std::collections::HashMap;
use std::io::BufRead;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, TryRecvError};

use crate::aggregate::{session_state, AggregateOptions, IncrementalAggregator, SessionState};
use crate::message::Message;
use crate::update::{decode_line, parse_update_line, UpdateRecord};

/// Session id used for records that carry none.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug)]
pub enum SourceEvent {
    Update(UpdateRecord),
    Malformed { line: usize, error: String },
    Done,
}

/// Reads JSONL updates on a worker thread and forwards them in order.
/// Lines that are not UTF-8 or not JSON are reported as `Malformed` and
/// reading continues; only an I/O error ends the source early.
pub fn spawn_update_source<R>(mut reader: R) -> Receiver<SourceEvent>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => line_no += 1,
                Err(err) => {
                    tracing::warn!(line = line_no + 1, error = %err, "update source read failed");
                    break;
                }
            }
            let parsed = decode_line(&buf).and_then(|line| {
                if line.trim().is_empty() {
                    Ok(None)
                } else {
                    parse_update_line(line).map(Some)
                }
            });
            let event = match parsed {
                Ok(Some(record)) => SourceEvent::Update(record),
                Ok(None) => continue,
                Err(err) => SourceEvent::Malformed {
                    line: line_no,
                    error: format!("{err:#}"),
                },
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        let _ = tx.send(SourceEvent::Done);
    });
    rx
}

#[derive(Debug)]
struct SessionEntry {
    updates: Vec<UpdateRecord>,
    view: IncrementalAggregator,
}

/// Append-only update logs keyed by session id. Each session keeps its own
/// checkpointed aggregator so `messages` only folds what arrived since the
/// previous call.
#[derive(Debug, Default)]
pub struct SessionLog {
    options: AggregateOptions,
    sessions: HashMap<String, SessionEntry>,
    order: Vec<String>,
}

impl SessionLog {
    pub fn new(options: AggregateOptions) -> Self {
        Self {
            options,
            sessions: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn entry(&mut self, session_id: &str) -> &mut SessionEntry {
        if !self.sessions.contains_key(session_id) {
            self.order.push(session_id.to_string());
        }
        let options = self.options;
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                updates: Vec::new(),
                view: IncrementalAggregator::new(options),
            })
    }

    pub fn append(&mut self, record: UpdateRecord) {
        let session_id = record
            .session_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION.to_string());
        self.entry(&session_id).updates.push(record);
    }

    pub fn extend<I: IntoIterator<Item = UpdateRecord>>(&mut self, records: I) {
        for record in records {
            self.append(record);
        }
    }

    /// Appends everything currently queued on `rx`. Returns `true` once the
    /// source has finished or disconnected.
    pub fn drain(&mut self, rx: &Receiver<SourceEvent>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(SourceEvent::Update(record)) => self.append(record),
                Ok(SourceEvent::Malformed { line, error }) => {
                    tracing::warn!(line, %error, "skipping malformed update");
                }
                Ok(SourceEvent::Done) | Err(TryRecvError::Disconnected) => return true,
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    /// Blocks until the source is exhausted.
    pub fn drain_blocking(&mut self, rx: &Receiver<SourceEvent>) {
        for event in rx.iter() {
            match event {
                SourceEvent::Update(record) => self.append(record),
                SourceEvent::Malformed { line, error } => {
                    tracing::warn!(line, %error, "skipping malformed update");
                }
                SourceEvent::Done => break,
            }
        }
    }

    /// Session ids in order of first appearance.
    pub fn session_ids(&self) -> &[String] {
        &self.order
    }

    pub fn updates(&self, session_id: &str) -> &[UpdateRecord] {
        self.sessions
            .get(session_id)
            .map(|entry| entry.updates.as_slice())
            .unwrap_or_default()
    }

    pub fn messages(&mut self, session_id: &str) -> Vec<Message> {
        match self.sessions.get_mut(session_id) {
            Some(entry) => entry.view.sync(&entry.updates),
            None => Vec::new(),
        }
    }

    pub fn state(&self, session_id: &str) -> SessionState {
        session_state(self.updates(session_id))
    }

    /// Drops a session's log, as when the session is deleted or reset.
    pub fn reset(&mut self, session_id: &str) -> bool {
        self.order.retain(|id| id != session_id);
        self.sessions.remove(session_id).is_some()
    }
}
