// Metadata probes: title of one item, flat listing of a playlist
//
// Probes never fail the caller. A probe that cannot run (spawn error,
// timeout) yields nothing and the caller falls back to defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::diagnostics;
use super::format_selector::{playlist_probe_args, title_probe_args};
use super::models::PlaylistEntry;
use super::traits::ProcessRunner;

pub struct MetadataProbe {
    runner: Arc<dyn ProcessRunner>,
    downloader: PathBuf,
    timeout: Duration,
}

impl MetadataProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>, downloader: PathBuf, timeout: Duration) -> Self {
        Self {
            runner,
            downloader,
            timeout,
        }
    }

    /// Title of a single item; first non-empty stdout line of a clean exit
    pub async fn fetch_title(&self, url: &str) -> Option<String> {
        let output = match self
            .runner
            .capture(&self.downloader, &title_probe_args(url), self.timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("[Probe] Title probe could not run: {}", e);
                return None;
            }
        };

        if !output.success() {
            tracing::warn!(
                "[Probe] Title probe exited with {:?}: {}",
                output.code,
                diagnostics::summarize(&output.stderr)
            );
            return None;
        }

        let title = output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);
        tracing::debug!("[Probe] Title: {:?}", title);
        title
    }

    /// Ordered playlist entries. Whatever yt-dlp printed is used even when it
    /// exits non-zero, since partial listings are common for playlists with
    /// private or deleted entries.
    pub async fn fetch_playlist_entries(&self, url: &str) -> Vec<PlaylistEntry> {
        let output = match self
            .runner
            .capture(&self.downloader, &playlist_probe_args(url), self.timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("[Probe] Playlist probe could not run: {}", e);
                return Vec::new();
            }
        };

        if !output.success() {
            tracing::warn!(
                "[Probe] Playlist probe exited with {:?}: {}",
                output.code,
                diagnostics::summarize(&output.stderr)
            );
        }

        let entries = parse_playlist_lines(&output.stdout);
        tracing::info!("[Probe] Playlist has {} entries", entries.len());
        entries
    }
}

/// Parse `title|id` lines. The id is taken after the last `|`, so titles
/// may contain the separator. Lines without an id are skipped; an empty
/// title falls back to the id.
pub fn parse_playlist_lines(stdout: &str) -> Vec<PlaylistEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let (title, id) = line.rsplit_once('|')?;
            let id = id.trim();
            if id.is_empty() || id == "NA" {
                return None;
            }
            let title = title.trim();
            Some(PlaylistEntry {
                title: if title.is_empty() { id } else { title }.to_string(),
                id: id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{FakeResponse, FakeRunner};

    fn probe(runner: FakeRunner) -> (Arc<FakeRunner>, MetadataProbe) {
        let runner = Arc::new(runner);
        let probe = MetadataProbe::new(
            runner.clone(),
            PathBuf::from("yt-dlp"),
            Duration::from_secs(1),
        );
        (runner, probe)
    }

    #[test]
    fn parses_title_id_lines() {
        let entries = parse_playlist_lines("First|aaa\nA | B|bbb\n\nbroken line\n|ccc\nx|\n");
        assert_eq!(
            entries,
            vec![
                PlaylistEntry {
                    title: "First".to_string(),
                    id: "aaa".to_string()
                },
                PlaylistEntry {
                    title: "A | B".to_string(),
                    id: "bbb".to_string()
                },
                PlaylistEntry {
                    title: "ccc".to_string(),
                    id: "ccc".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn title_probe_uses_single_item_mode() {
        let (runner, probe) = probe(FakeRunner::new(|_, _| {
            FakeResponse::ok().stdout("").stdout("  Never Gonna Give You Up  ")
        }));
        let title = probe.fetch_title("https://youtu.be/dQw4w9WgXcQ").await;
        assert_eq!(title.as_deref(), Some("Never Gonna Give You Up"));

        let calls = runner.calls_to("yt-dlp");
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"--no-playlist".to_string()));
        assert!(calls[0].contains(&"--skip-download".to_string()));
    }

    #[tokio::test]
    async fn title_probe_failures_yield_none() {
        let (_, failing) = probe(FakeRunner::new(|_, _| {
            FakeResponse::exit(1).stdout("partial").stderr("ERROR: Video unavailable")
        }));
        assert_eq!(failing.fetch_title("u").await, None);

        let (_, hung) = probe(FakeRunner::new(|_, _| FakeResponse::timed_out()));
        assert_eq!(hung.fetch_title("u").await, None);

        let (_, empty) = probe(FakeRunner::new(|_, _| FakeResponse::ok()));
        assert_eq!(empty.fetch_title("u").await, None);
    }

    #[tokio::test]
    async fn playlist_probe_keeps_partial_listing() {
        let (runner, probe) = probe(FakeRunner::new(|_, _| {
            FakeResponse::exit(1)
                .stdout("One|id1")
                .stdout("Two|id2")
                .stderr("ERROR: [youtube] id3: Private video")
        }));
        let entries = probe.fetch_playlist_entries("u").await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, "id2");
        assert!(runner.calls_to("yt-dlp")[0].contains(&"--flat-playlist".to_string()));
    }

    #[tokio::test]
    async fn playlist_probe_spawn_failure_is_empty() {
        let (_, probe) = probe(FakeRunner::new(|_, _| FakeResponse::spawn_error()));
        assert!(probe.fetch_playlist_entries("u").await.is_empty());
    }
}
