// Failure diagnostics for yt-dlp stderr
//
// Only used to make messages and logs more useful. Never changes control
// flow: a diagnosed failure is still just a failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PrivateVideo,
    VideoUnavailable,
    AgeRestricted,
    GeoBlocked,
    RateLimited,
    Http403Forbidden,
    NetworkTimeout,
    UnsupportedUrl,
    EncoderMissing,
    Other,
}

impl FailureReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Not available in this region",
            Self::RateLimited => "Rate limited by YouTube",
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
            Self::UnsupportedUrl => "Unsupported URL",
            Self::EncoderMissing => "ffmpeg not found or not working",
            Self::Other => "Unknown error",
        }
    }

    /// Waiting and trying again may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::NetworkTimeout | Self::Http403Forbidden)
    }
}

/// Classify captured stderr. `None` for empty input.
pub fn diagnose(stderr: &str) -> Option<FailureReason> {
    if stderr.trim().is_empty() {
        return None;
    }
    let lower = stderr.to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    // Most specific first
    if has(&["private video", "video is private"]) {
        return Some(FailureReason::PrivateVideo);
    }
    if has(&[
        "age-restricted",
        "sign in to confirm your age",
        "age_verification",
    ]) {
        return Some(FailureReason::AgeRestricted);
    }
    if has(&[
        "not available in your country",
        "blocked in your country",
        "geo restricted",
        "geo-restricted",
    ]) {
        return Some(FailureReason::GeoBlocked);
    }
    if has(&[
        "video unavailable",
        "video has been removed",
        "no longer available",
        "video is unavailable",
    ]) {
        return Some(FailureReason::VideoUnavailable);
    }
    if has(&["unsupported url", "is not a valid url"]) {
        return Some(FailureReason::UnsupportedUrl);
    }
    if has(&[
        "ffmpeg not found",
        "ffprobe and ffmpeg not found",
        "ffmpeg is not installed",
        "postprocessing: ffmpeg",
    ]) {
        return Some(FailureReason::EncoderMissing);
    }
    if has(&["http error 429", "too many requests", "rate limit"]) {
        return Some(FailureReason::RateLimited);
    }
    if has(&["http error 403", "403: forbidden", "forbidden"]) {
        return Some(FailureReason::Http403Forbidden);
    }
    if has(&[
        "timed out",
        "timeout",
        "connection refused",
        "network is unreachable",
        "temporary failure in name resolution",
    ]) {
        return Some(FailureReason::NetworkTimeout);
    }

    Some(FailureReason::Other)
}

/// Short human summary of stderr: up to two `ERROR:` lines, else the last
/// non-empty line.
pub fn summarize(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}
