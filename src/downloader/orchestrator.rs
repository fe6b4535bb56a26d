// Download orchestrator
//
// One run goes Idle -> ToolVerification -> (SingleItemDownload |
// PlaylistEnumeration -> PlaylistItemDownload x N) -> Completed | Failed.
// Exactly one child process is alive at any time. A failing playlist item is
// recorded and skipped; it never aborts the batch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::DownloaderConfig;
use super::diagnostics;
use super::errors::{DownloadError, Result};
use super::format_selector::{playlist_item_args, single_item_args};
use super::models::{DownloadRequest, Outcome, ProgressEvent};
use super::probe::MetadataProbe;
use super::progress;
use super::tools::{verify_tool, ToolKind, ToolPaths};
use super::traits::{OutputStream, ProcessRunner, ProgressSink};
use super::utils::find_output_file;

/// stderr lines kept per child for failure messages
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ToolVerification,
    SingleItemDownload,
    PlaylistEnumeration,
    /// 1-based position of the item being downloaded
    PlaylistItemDownload { current: usize, total: usize },
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// State of one run plus the per-item failure ledger
#[derive(Debug)]
pub struct Session {
    state: RunState,
    history: Vec<RunState>,
    failed_items: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
            failed_items: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state the run has been in, oldest first
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn failed_items(&self) -> &[String] {
        &self.failed_items
    }

    /// Move to `next`. Terminal states are final; returns false when the
    /// transition was refused.
    pub fn advance(&mut self, next: RunState) -> bool {
        if self.state.is_terminal() {
            tracing::warn!(
                "[Orchestrator] Ignoring transition {:?} -> {:?}",
                self.state,
                next
            );
            return false;
        }
        tracing::debug!("[Orchestrator] {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
        true
    }

    pub fn record_failure(&mut self, title: impl Into<String>) {
        self.failed_items.push(title.into());
    }

    /// Forward an event unless the run is already over
    pub fn emit(&self, sink: &dyn ProgressSink, event: ProgressEvent) {
        if !self.is_terminal() {
            sink.emit(event);
        }
    }
}

/// Shared request to stop a playlist batch before its next item
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ChildExit {
    code: Option<i32>,
    stderr_tail: String,
}

impl ChildExit {
    fn into_result(self) -> Result<()> {
        if self.code == Some(0) {
            Ok(())
        } else {
            Err(DownloadError::ExitStatus {
                code: self.code,
                detail: failure_detail(&self.stderr_tail),
            })
        }
    }
}

/// Short stderr summary, tagged with the diagnosed cause when one is known
fn failure_detail(stderr: &str) -> String {
    let summary = diagnostics::summarize(stderr);
    match diagnostics::diagnose(stderr) {
        Some(reason) if reason.is_transient() => {
            format!("{} [{}, may be temporary]", summary, reason.description())
        }
        Some(reason) if reason != diagnostics::FailureReason::Other => {
            format!("{} [{}]", summary, reason.description())
        }
        _ => summary,
    }
}

/// Runs one download request against the located tools, reporting through a
/// `ProgressSink` and stopping between playlist items once cancelled.
pub struct Downloader {
    runner: Arc<dyn ProcessRunner>,
    tools: ToolPaths,
    config: DownloaderConfig,
    cancel: CancelFlag,
}

impl Downloader {
    pub fn new(runner: Arc<dyn ProcessRunner>, tools: ToolPaths, config: DownloaderConfig) -> Self {
        Self {
            runner,
            tools,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one request to its terminal outcome
    pub async fn run(&self, request: &DownloadRequest, sink: &dyn ProgressSink) -> Outcome {
        self.run_session(request, sink).await.0
    }

    /// Like `run`, also returning the finished session
    pub async fn run_session(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> (Outcome, Session) {
        let mut session = Session::new();
        tracing::info!(
            "[Orchestrator] Starting {} download of {} (playlist: {}, scope: {:?})",
            request.media_kind(),
            request.url(),
            request.is_playlist(),
            request.scope()
        );

        session.advance(RunState::ToolVerification);
        if let Err(e) = self.verify_tools().await {
            tracing::error!("[Orchestrator] Tool verification failed: {}", e);
            session.advance(RunState::Failed);
            return (Outcome::from_error(&e), session);
        }

        let outcome = if request.wants_entire_playlist() {
            self.download_playlist(request, sink, &mut session).await
        } else {
            self.download_single(request, sink, &mut session).await
        };
        tracing::info!(
            "[Orchestrator] Finished in {:?}: {}",
            session.state(),
            outcome.message
        );
        (outcome, session)
    }

    async fn verify_tools(&self) -> Result<()> {
        let limit = self.config.verify_timeout();
        verify_tool(self.runner.as_ref(), ToolKind::Downloader, &self.tools.downloader, limit).await?;
        verify_tool(self.runner.as_ref(), ToolKind::Encoder, &self.tools.encoder, limit).await?;
        Ok(())
    }

    async fn download_single(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
        session: &mut Session,
    ) -> Outcome {
        session.advance(RunState::SingleItemDownload);
        let output = request.save_path();
        let args = single_item_args(
            request.url(),
            output,
            &self.tools.encoder,
            request.media_kind(),
        );

        let result = match self.stream_child(&args, session, sink).await {
            Ok(exit) => exit.into_result(),
            Err(e) => Err(e),
        }
        .and_then(|()| {
            find_output_file(output).ok_or_else(|| DownloadError::FileNotFound {
                expected: output.to_path_buf(),
            })
        });

        match result {
            Ok(found) => {
                tracing::info!("[Orchestrator] Output file: {}", found.display());
                session.advance(RunState::Completed);
                let name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| output.display().to_string());
                Outcome::completed(format!("Downloaded: {}", name), 1, 1)
            }
            Err(e) => {
                tracing::error!("[Orchestrator] {}", e);
                session.advance(RunState::Failed);
                Outcome {
                    total: 1,
                    ..Outcome::from_error(&e)
                }
            }
        }
    }

    async fn download_playlist(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
        session: &mut Session,
    ) -> Outcome {
        session.advance(RunState::PlaylistEnumeration);
        let probe = MetadataProbe::new(
            self.runner.clone(),
            self.tools.downloader.clone(),
            self.config.probe_timeout(),
        );
        let entries = probe.fetch_playlist_entries(request.url()).await;
        let total = entries.len();
        let dir = request.save_path();
        let mut downloaded = 0;

        for (index, entry) in entries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("[Orchestrator] Cancelled after {} of {} items", index, total);
                session.advance(RunState::Failed);
                return Outcome {
                    downloaded,
                    total,
                    ..Outcome::failed(format!(
                        "Download cancelled after {} of {} items",
                        index, total
                    ))
                    .with_failed_items(session.failed_items().to_vec())
                };
            }

            let current = index + 1;
            session.advance(RunState::PlaylistItemDownload { current, total });
            session.emit(sink, ProgressEvent::PlaylistIndex { current, total });
            session.emit(
                sink,
                ProgressEvent::ItemTitle {
                    title: entry.title.clone(),
                },
            );
            tracing::info!("[Orchestrator] Item {}/{}: {}", current, total, entry.title);

            let url = entry.watch_url(&self.config.watch_url_base);
            let args = playlist_item_args(&url, dir, &self.tools.encoder, request.media_kind());
            let result = match self.stream_child(&args, session, sink).await {
                Ok(exit) => exit.into_result(),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => downloaded += 1,
                Err(e) => {
                    let failure = DownloadError::ItemDownloadFailure {
                        title: entry.title.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("[Orchestrator] {}", failure);
                    session.record_failure(entry.title.clone());
                }
            }
        }

        session.advance(RunState::Completed);
        let message = if total == 0 {
            "Playlist download complete! The playlist has no downloadable items.".to_string()
        } else {
            format!(
                "Playlist download complete! {} of {} items downloaded.",
                downloaded, total
            )
        };
        Outcome::completed(message, downloaded, total)
            .with_failed_items(session.failed_items().to_vec())
    }

    /// Run one downloader child, turning its output into progress events
    async fn stream_child(
        &self,
        args: &[String],
        session: &Session,
        sink: &dyn ProgressSink,
    ) -> Result<ChildExit> {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut on_line = |stream: OutputStream, line: &str| {
            if stream == OutputStream::Stderr {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
            for event in progress::events_for_line(line) {
                session.emit(sink, event);
            }
        };

        let code = self
            .runner
            .stream(&self.tools.downloader, args, &mut on_line)
            .await?;
        let stderr_tail = tail.into_iter().collect::<Vec<_>>().join("\n");
        Ok(ChildExit { code, stderr_tail })
    }
}
