// External tool discovery and verification
//
// Both yt-dlp and ffmpeg are found the same way: an explicit override, then
// the bundled layouts next to the executable, then the working directory,
// then configured and system directories. When nothing exists on disk the
// bare command name is returned and left to the OS search path.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::config::DownloaderConfig;
use super::errors::{DownloadError, Result};
use super::traits::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Downloader,
    Encoder,
}

impl ToolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Downloader => "yt-dlp",
            ToolKind::Encoder => "ffmpeg",
        }
    }

    /// Platform file name
    pub fn binary_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.label())
        } else {
            self.label().to_string()
        }
    }

    pub fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::Downloader => "--version",
            ToolKind::Encoder => "-version",
        }
    }
}

/// Where each tool lives for the rest of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub downloader: PathBuf,
    pub encoder: PathBuf,
}

/// Candidate directory, resolved against the executable or working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchDir {
    ExeRelative(&'static str),
    CwdRelative(&'static str),
    Fixed(PathBuf),
}

impl SearchDir {
    fn resolve(&self, exe_dir: Option<&Path>, cwd: Option<&Path>) -> Option<PathBuf> {
        match self {
            SearchDir::ExeRelative(rel) => exe_dir.map(|d| join_relative(d, rel)),
            SearchDir::CwdRelative(rel) => cwd.map(|d| join_relative(d, rel)),
            SearchDir::Fixed(path) => Some(path.clone()),
        }
    }
}

fn join_relative(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Bundled layouts first, then the working directory
const BUNDLED_DIRS: &[SearchDir] = &[
    SearchDir::ExeRelative("resources/bin"),
    SearchDir::ExeRelative("bin"),
    SearchDir::ExeRelative("."),
    SearchDir::ExeRelative("../Resources/bin"),
    SearchDir::CwdRelative("bin"),
];

const SYSTEM_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

pub struct ToolLocator {
    search_dirs: Vec<PathBuf>,
    downloader_override: Option<PathBuf>,
    encoder_override: Option<PathBuf>,
}

impl ToolLocator {
    /// Standard search order for this process
    pub fn standard(config: &DownloaderConfig) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let cwd = std::env::current_dir().ok();

        let mut dirs: Vec<SearchDir> = BUNDLED_DIRS.to_vec();
        dirs.extend(config.extra_search_dirs.iter().cloned().map(SearchDir::Fixed));
        if !cfg!(windows) {
            dirs.extend(SYSTEM_DIRS.iter().map(|d| SearchDir::Fixed(PathBuf::from(d))));
        }

        let mut locator = Self::with_search_dirs(
            dirs.iter()
                .filter_map(|d| d.resolve(exe_dir.as_deref(), cwd.as_deref()))
                .collect(),
        );
        if let Some(path) = &config.downloader_path {
            locator = locator.with_override(ToolKind::Downloader, path.clone());
        }
        if let Some(path) = &config.encoder_path {
            locator = locator.with_override(ToolKind::Encoder, path.clone());
        }
        locator
    }

    /// Search exactly `dirs`, with no overrides
    pub fn with_search_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs: dirs,
            downloader_override: None,
            encoder_override: None,
        }
    }

    pub fn with_override(mut self, tool: ToolKind, path: PathBuf) -> Self {
        match tool {
            ToolKind::Downloader => self.downloader_override = Some(path),
            ToolKind::Encoder => self.encoder_override = Some(path),
        }
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// First existing candidate, or the bare command name. Never fails.
    pub fn locate(&self, tool: ToolKind) -> PathBuf {
        let overridden = match tool {
            ToolKind::Downloader => self.downloader_override.as_ref(),
            ToolKind::Encoder => self.encoder_override.as_ref(),
        };
        if let Some(path) = overridden {
            if !path.exists() {
                tracing::warn!(
                    "[Locator] Configured {} path does not exist: {}",
                    tool.label(),
                    path.display()
                );
            }
            return path.clone();
        }

        let binary = tool.binary_name();
        for dir in &self.search_dirs {
            let candidate = dir.join(&binary);
            if candidate.is_file() {
                tracing::debug!("[Locator] Found {} at {}", tool.label(), candidate.display());
                return candidate;
            }
        }

        tracing::debug!("[Locator] {} not found on disk, using PATH lookup", tool.label());
        PathBuf::from(binary)
    }

    pub fn locate_all(&self) -> ToolPaths {
        ToolPaths {
            downloader: self.locate(ToolKind::Downloader),
            encoder: self.locate(ToolKind::Encoder),
        }
    }
}

/// Run the tool's version command; the first stdout line is the version
pub async fn verify_tool(
    runner: &dyn ProcessRunner,
    tool: ToolKind,
    path: &Path,
    limit: Duration,
) -> Result<String> {
    let unavailable = |reason: String| DownloadError::ToolUnavailable {
        tool: tool.label().to_string(),
        path: path.display().to_string(),
        reason,
    };

    let output = runner
        .capture(path, &[tool.version_arg().to_string()], limit)
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    if !output.success() {
        let code = output
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        let detail = output.stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        return Err(unavailable(format!(
            "version check exited with code {} {}",
            code,
            detail.trim()
        )
        .trim_end()
        .to_string()));
    }

    let version = output
        .stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown")
        .to_string();
    tracing::info!("[Locator] {} {} at {}", tool.label(), version, path.display());
    Ok(version)
}

/// One row of the `tools` report
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: ToolKind,
    pub name: String,
    pub path: String,
    pub found_on_disk: bool,
    pub version: Option<String>,
    pub is_available: bool,
    pub error: Option<String>,
}

pub async fn tool_status(
    runner: &dyn ProcessRunner,
    locator: &ToolLocator,
    limit: Duration,
) -> Vec<ToolStatus> {
    let mut report = Vec::new();
    for tool in [ToolKind::Downloader, ToolKind::Encoder] {
        let path = locator.locate(tool);
        let found_on_disk = path.is_file();
        let (version, error) = match verify_tool(runner, tool, &path, limit).await {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        report.push(ToolStatus {
            tool,
            name: tool.label().to_string(),
            path: path.display().to_string(),
            found_on_disk,
            is_available: version.is_some(),
            version,
            error,
        });
    }
    report
}
