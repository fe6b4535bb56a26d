// Download core: tool discovery, probes, orchestration of yt-dlp runs

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod progress;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DownloaderConfig;
pub use errors::DownloadError;
pub use models::{DownloadRequest, MediaKind, Outcome, PlaylistEntry, PlaylistScope, ProgressEvent};
pub use orchestrator::{CancelFlag, Downloader, RunState, Session};
pub use probe::MetadataProbe;
pub use process::TokioProcessRunner;
pub use tools::{ToolKind, ToolLocator, ToolPaths};
pub use traits::{ChannelSink, ProcessRunner, ProgressSink, RecordingSink, SessionMessage};
