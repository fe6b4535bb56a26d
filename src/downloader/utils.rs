// Helper functions shared by the probe, the orchestrator and the command layer

use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    static ref VIDEO_URL_RE: Regex =
        Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+").unwrap();
    static ref PLAYLIST_URL_RE: Regex = Regex::new(r"[?&]list=").unwrap();
}

/// Characters Windows refuses in file names
const INVALID_FILENAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Number of leading characters of the expected base name a renamed output
/// file must still share
const RENAMED_PREFIX_CHARS: usize = 20;

/// Make a title safe to use as a file name on every platform.
///
/// Invalid path characters, emoji, symbols and any other non-ASCII character
/// become `_`; runs of `_` collapse to one and leading/trailing `_` are
/// dropped. Total and idempotent.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let replaced = if INVALID_FILENAME_CHARS.contains(&c)
            || is_astral(c)
            || is_symbol_block(c)
            || !c.is_ascii()
        {
            '_'
        } else {
            c
        };
        if replaced == '_' && out.ends_with('_') {
            continue;
        }
        out.push(replaced);
    }
    out.trim_matches('_').to_string()
}

// Outside the BMP: emoji and friends, encoded as surrogate pairs in UTF-16
fn is_astral(c: char) -> bool {
    (c as u32) > 0xFFFF
}

// Miscellaneous Symbols and Dingbats
fn is_symbol_block(c: char) -> bool {
    ('\u{2600}'..='\u{27BF}').contains(&c)
}

/// Accepts youtube.com and youtu.be links, with or without scheme and `www.`
pub fn is_valid_video_url(url: &str) -> bool {
    VIDEO_URL_RE.is_match(url.trim())
}

/// A link is a playlist reference when it carries a `list=` query parameter
pub fn is_playlist_url(url: &str) -> bool {
    PLAYLIST_URL_RE.is_match(url)
}

/// Default save name for a single item: sanitized title plus the container
/// extension, or `audio.mp3` / `video.mp4` when there is no usable title.
pub fn default_file_name(title: Option<&str>, fallback: &str, extension: &str) -> String {
    let base = title
        .map(sanitize_filename)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    format!("{}.{}", base, extension)
}

/// Locate the file a finished single-item download produced.
///
/// The expected path wins when it exists. Metadata-driven renaming can change
/// the final name, so otherwise any file in the same directory that contains
/// the first characters of the expected base name and ends with the expected
/// extension is accepted.
pub fn find_output_file(expected: &Path) -> Option<PathBuf> {
    if expected.is_file() {
        return Some(expected.to_path_buf());
    }

    let dir = match expected.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = expected.file_stem()?.to_string_lossy().to_string();
    let prefix: String = stem.chars().take(RENAMED_PREFIX_CHARS).collect();
    let extension = expected
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("[OutputCheck] Cannot read {}: {}", dir.display(), e);
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .find(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            // Deliberately loose: a short stem such as "a" accepts any file
            // that contains it and has the same extension.
            name.contains(&prefix) && name.ends_with(&extension)
        })
}
