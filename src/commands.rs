// Caller-facing flow: validate, ask, probe, run, report
//
// Everything the user is asked goes through `UserPrompt`, so the flow is the
// same for the terminal shell and for tests.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::downloader::tools::{tool_status, ToolStatus};
use crate::downloader::utils::{default_file_name, is_playlist_url, is_valid_video_url};
use crate::downloader::{
    CancelFlag, DownloadError, DownloadRequest, Downloader, DownloaderConfig, MediaKind,
    MetadataProbe, Outcome, PlaylistEntry, PlaylistScope, ProcessRunner, ProgressSink,
    TokioProcessRunner, ToolLocator, ToolPaths,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// Questions asked during a download. `None` means the user cancelled.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// This item only, or the entire playlist
    async fn choose_scope(&self, url: &str) -> Option<PlaylistScope>;
    /// Target file for a single item, suggested name pre-filled
    async fn choose_save_file(&self, default_name: &str) -> Option<PathBuf>;
    /// Target directory for a playlist batch
    async fn choose_directory(&self) -> Option<PathBuf>;
    async fn show_message(&self, kind: MessageKind, text: &str);
}

/// Process-wide handles shared by every command
#[derive(Clone)]
pub struct AppContext {
    runner: Arc<dyn ProcessRunner>,
    config: DownloaderConfig,
}

impl AppContext {
    pub fn new(config: DownloaderConfig) -> Self {
        Self::with_runner(Arc::new(TokioProcessRunner::new()), config)
    }

    pub fn with_runner(runner: Arc<dyn ProcessRunner>, config: DownloaderConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn locator(&self) -> ToolLocator {
        ToolLocator::standard(&self.config)
    }

    pub fn locate_tools(&self) -> ToolPaths {
        let locator = self.locator();
        tracing::debug!("[Locator] Search order: {:?}", locator.search_dirs());
        locator.locate_all()
    }

    fn probe(&self, tools: &ToolPaths) -> MetadataProbe {
        MetadataProbe::new(
            self.runner.clone(),
            tools.downloader.clone(),
            self.config.probe_timeout(),
        )
    }
}

/// Full interactive download. Returns `None` when the user backed out of a
/// dialog before anything ran; otherwise the outcome that was also shown.
///
/// `cancel` belongs to this run only. A flag set during one download must not
/// leak into the next one on the same context.
pub async fn start_download(
    ctx: &AppContext,
    url: &str,
    kind: MediaKind,
    prompt: &dyn UserPrompt,
    sink: &dyn ProgressSink,
    cancel: CancelFlag,
) -> Option<Outcome> {
    let url = url.trim();
    if !is_valid_video_url(url) {
        let outcome = Outcome::from_error(&DownloadError::InvalidUrl(url.to_string()));
        prompt.show_message(MessageKind::Error, &outcome.message).await;
        return Some(outcome);
    }

    let scope = if is_playlist_url(url) {
        prompt.choose_scope(url).await?
    } else {
        PlaylistScope::SingleItem
    };

    let tools = ctx.locate_tools();
    tracing::info!(
        "[Commands] Using yt-dlp at {} and ffmpeg at {}",
        tools.downloader.display(),
        tools.encoder.display()
    );

    let save_path = if scope == PlaylistScope::EntirePlaylist {
        prompt.choose_directory().await?
    } else {
        let title = ctx.probe(&tools).fetch_title(url).await;
        let default_name = default_file_name(title.as_deref(), kind.fallback_name(), kind.extension());
        prompt.choose_save_file(&default_name).await?
    };

    let request = match DownloadRequest::new(url, kind, scope, save_path) {
        Ok(request) => request,
        Err(e) => {
            let outcome = Outcome::from_error(&e);
            prompt.show_message(MessageKind::Error, &outcome.message).await;
            return Some(outcome);
        }
    };

    let downloader = Downloader::new(ctx.runner.clone(), tools, ctx.config.clone())
        .with_cancel_flag(cancel);
    let outcome = downloader.run(&request, sink).await;

    let kind = if outcome.success {
        MessageKind::Info
    } else {
        MessageKind::Error
    };
    prompt.show_message(kind, &outcome.summary()).await;
    Some(outcome)
}

pub async fn fetch_title(ctx: &AppContext, url: &str) -> Option<String> {
    ctx.probe(&ctx.locate_tools()).fetch_title(url.trim()).await
}

pub async fn fetch_playlist(ctx: &AppContext, url: &str) -> Vec<PlaylistEntry> {
    ctx.probe(&ctx.locate_tools())
        .fetch_playlist_entries(url.trim())
        .await
}

pub async fn tools_report(ctx: &AppContext) -> Vec<ToolStatus> {
    tool_status(ctx.runner.as_ref(), &ctx.locator(), ctx.config.verify_timeout()).await
}
