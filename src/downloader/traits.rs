// Seams between the download core and its collaborators

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::errors::DownloadError;
use super::models::{Outcome, ProgressEvent};

/// Which pipe a line of child output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Output of a child process that ran to completion
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Starts external tools. The production implementation drives
/// `tokio::process`; tests script it.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and collect both pipes, killing the child when
    /// `limit` elapses.
    async fn capture(
        &self,
        program: &Path,
        args: &[String],
        limit: Duration,
    ) -> Result<CapturedOutput, DownloadError>;

    /// Run to completion, handing every output line to `on_line` as it
    /// arrives. Returns the exit code.
    async fn stream(
        &self,
        program: &Path,
        args: &[String],
        on_line: &mut (dyn for<'a> FnMut(OutputStream, &'a str) + Send),
    ) -> Result<Option<i32>, DownloadError>;
}

/// Consumer of progress events, implemented by the presentation layer
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Message on the caller-facing stream: progress, then exactly one outcome
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    Progress(ProgressEvent),
    Finished(Outcome),
}

/// Forwards events into a tokio channel for asynchronous callers
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Close the stream with the run's outcome
    pub fn finish(self, outcome: Outcome) {
        let _ = self.tx.send(SessionMessage::Finished(outcome));
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching; the run carries on.
        let _ = self.tx.send(SessionMessage::Progress(event));
    }
}

/// Keeps every event in memory
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
