// Common data models for the download core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::errors::{DownloadError, Result};
use super::utils;

/// What the user wants to keep from the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Container the downloader is asked to produce
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Name suggested when no title could be probed
    pub fn fallback_name(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// How much of a playlist link to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistScope {
    /// Only the item the link points at
    #[default]
    SingleItem,
    /// Every entry of the playlist, one after another
    EntirePlaylist,
}

/// One user-initiated download. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    url: String,
    media_kind: MediaKind,
    is_playlist: bool,
    scope: PlaylistScope,
    save_path: PathBuf,
}

impl DownloadRequest {
    /// Validate the URL and normalise the scope.
    ///
    /// `save_path` is a file path for a single item and a directory for an
    /// entire playlist. The scope collapses to `SingleItem` when the URL is
    /// not a playlist reference.
    pub fn new(
        url: impl Into<String>,
        media_kind: MediaKind,
        scope: PlaylistScope,
        save_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let url = url.into().trim().to_string();
        if !utils::is_valid_video_url(&url) {
            return Err(DownloadError::InvalidUrl(url));
        }
        let is_playlist = utils::is_playlist_url(&url);
        let scope = if is_playlist {
            scope
        } else {
            PlaylistScope::SingleItem
        };

        Ok(Self {
            url,
            media_kind,
            is_playlist,
            scope,
            save_path: save_path.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn is_playlist(&self) -> bool {
        self.is_playlist
    }

    pub fn scope(&self) -> PlaylistScope {
        self.scope
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// True when the run should enumerate and download every entry
    pub fn wants_entire_playlist(&self) -> bool {
        self.is_playlist && self.scope == PlaylistScope::EntirePlaylist
    }
}

/// Playlist member as reported by the flat-playlist probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub title: String,
    pub id: String,
}

impl PlaylistEntry {
    /// Direct watch URL of this entry
    pub fn watch_url(&self, base: &str) -> String {
        format!("{}{}", base, self.id)
    }
}

/// Progress pushed to the presentation layer while a run is in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// 0.0 - 100.0 of the current child process
    Percent { value: f32 },
    /// Playlist item currently downloading (1-based)
    PlaylistIndex { current: usize, total: usize },
    /// Display name of the item currently downloading
    ItemTitle { title: String },
    /// Unparsed output line, for display only
    RawLine { text: String },
}

/// Terminal result of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
    /// Titles of playlist items that failed while the batch still completed
    pub failed_items: Vec<String>,
    pub downloaded: usize,
    pub total: usize,
}

impl Outcome {
    pub fn completed(message: impl Into<String>, downloaded: usize, total: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            failed_items: Vec::new(),
            downloaded,
            total,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            failed_items: Vec::new(),
            downloaded: 0,
            total: 0,
        }
    }

    pub fn from_error(err: &DownloadError) -> Self {
        Self::failed(err.to_string())
    }

    pub fn with_failed_items(mut self, items: Vec<String>) -> Self {
        self.failed_items = items;
        self
    }

    /// Message plus the failed-items list, ready for a dialog
    pub fn summary(&self) -> String {
        if self.failed_items.is_empty() {
            return self.message.clone();
        }
        let list = self
            .failed_items
            .iter()
            .map(|t| format!("  - {}", t))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nFailed items:\n{}", self.message, list)
    }
}
