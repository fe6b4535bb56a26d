// Error types for the download core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp or ffmpeg could not be started or failed its version check
    #[error("{tool} is not available at {path}: {reason}")]
    ToolUnavailable {
        tool: String,
        path: String,
        reason: String,
    },

    /// Metadata probe produced nothing usable
    #[error("Metadata probe failed: {0}")]
    ProbeFailure(String),

    /// One playlist item failed; recorded and skipped
    #[error("Failed to download \"{title}\": {reason}")]
    ItemDownloadFailure { title: String, reason: String },

    /// The single download child exited non-zero (or was killed)
    #[error("Download failed with exit code: {}{}", describe_code(.code), describe_detail(.detail))]
    ExitStatus { code: Option<i32>, detail: String },

    /// The single download child exited 0 but left no output file behind
    #[error("Download completed but file not found. It may have been downloaded with a different name. (expected {})", .expected.display())]
    FileNotFound { expected: PathBuf },

    /// The OS refused to start a child process
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// A bounded wait ran out
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("Invalid YouTube link provided: {0}")]
    InvalidUrl(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

fn describe_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!("\n\nDetails: {}", detail)
    }
}
