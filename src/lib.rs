//! yt-dlp / ffmpeg download orchestration.
//!
//! `downloader` holds the core (tool discovery, probes, the orchestrator and
//! its progress parser); `commands` is the interactive flow built on top of
//! it, shared by the `tubesave` binary.

pub mod commands;
pub mod downloader;

pub use commands::{start_download, AppContext, MessageKind, UserPrompt};
pub use downloader::{DownloadError, DownloadRequest, Downloader, MediaKind, Outcome, ProgressEvent};
