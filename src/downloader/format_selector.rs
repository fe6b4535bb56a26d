// Argument builders for yt-dlp invocations
//
// Every download, single or per playlist item, targets exactly one resolved
// URL and forces single-item mode with --no-playlist.

use std::path::Path;

use super::models::MediaKind;

/// Muxed output capped at 1080p; pre-muxed mp4 preferred over re-muxing
pub const VIDEO_FORMAT: &str =
    "bv*[height<=1080][ext=mp4]+ba[ext=m4a]/b[height<=1080][ext=mp4]/bv*[height<=1080]+ba/b";

/// Audio always lands as mp3
pub const AUDIO_FORMAT: &str = "mp3";

/// Metadata parsed out of "Artist - Title" style video titles
pub const METADATA_FROM_TITLE: &str = "%(artist)s - %(title)s";

/// File name template for playlist items, inside the target directory
pub const PLAYLIST_ITEM_TEMPLATE: &str = "%(artist,uploader|Unknown Artist)s - %(title)s";

/// Flags that depend on the media kind
pub fn media_args(kind: MediaKind) -> Vec<String> {
    let mut args = match kind {
        MediaKind::Audio => vec![
            "-x".to_string(),
            "--audio-format".to_string(),
            AUDIO_FORMAT.to_string(),
        ],
        MediaKind::Video => vec!["-f".to_string(), VIDEO_FORMAT.to_string()],
    };
    args.extend([
        "--add-metadata".to_string(),
        "--metadata-from-title".to_string(),
        METADATA_FROM_TITLE.to_string(),
    ]);
    args
}

/// Arguments for downloading one item to an explicit output path
pub fn single_item_args(url: &str, output: &Path, encoder: &Path, kind: MediaKind) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
        "--ffmpeg-location".to_string(),
        encoder.to_string_lossy().to_string(),
    ];
    args.extend(media_args(kind));
    args.push("--newline".to_string());
    args.push("--no-playlist".to_string());
    args
}

/// Arguments for one playlist entry, named from its metadata inside `dir`
pub fn playlist_item_args(url: &str, dir: &Path, encoder: &Path, kind: MediaKind) -> Vec<String> {
    let output = dir.join(format!("{}.{}", PLAYLIST_ITEM_TEMPLATE, kind.extension()));
    single_item_args(url, &output, encoder, kind)
}

/// Title-only probe: no playlist expansion, no payload
pub fn title_probe_args(url: &str) -> Vec<String> {
    vec![
        url.to_string(),
        "--print".to_string(),
        "%(title)s".to_string(),
        "--no-playlist".to_string(),
        "--skip-download".to_string(),
    ]
}

/// Flat playlist enumeration printing `title|id` per entry
pub fn playlist_probe_args(url: &str) -> Vec<String> {
    vec![
        url.to_string(),
        "--flat-playlist".to_string(),
        "--print".to_string(),
        "%(title)s|%(id)s".to_string(),
        "--yes-playlist".to_string(),
        "--skip-download".to_string(),
    ]
}
