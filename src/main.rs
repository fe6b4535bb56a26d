use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use tubesave::commands::{self, AppContext, MessageKind, UserPrompt};
use tubesave::downloader::{
    CancelFlag, ChannelSink, DownloadError, DownloaderConfig, MediaKind, Outcome, PlaylistScope, ProgressEvent,
    SessionMessage,
};

#[derive(Parser)]
#[command(name = "tubesave")]
#[command(version)]
#[command(about = "Download YouTube audio and video with yt-dlp and ffmpeg")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// yt-dlp executable to use instead of searching for one
    #[arg(long, global = true)]
    yt_dlp: Option<PathBuf>,

    /// ffmpeg executable to use instead of searching for one
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one item or an entire playlist
    Download {
        url: String,

        /// Keep only the audio, as mp3 (default)
        #[arg(long, default_value_t = false, conflicts_with = "video")]
        audio: bool,

        /// Keep the video, as mp4 up to 1080p
        #[arg(long, default_value_t = false)]
        video: bool,

        /// For playlist links: the linked item or the whole playlist
        #[arg(short, long, value_enum)]
        scope: Option<ScopeArg>,

        /// Target file (single item) or directory (playlist)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print progress and the outcome as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the title of a video
    Title { url: String },

    /// List the entries of a playlist
    Playlist {
        url: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show where yt-dlp and ffmpeg were found and whether they run
    Tools {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long, default_value_t = false)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Item,
    Playlist,
}

impl From<ScopeArg> for PlaylistScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Item => PlaylistScope::SingleItem,
            ScopeArg::Playlist => PlaylistScope::EntirePlaylist,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tubesave=debug" } else { "tubesave=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read one answer from stdin without blocking the runtime
async fn ask(question: String) -> Option<String> {
    ask_with(question, |line| std::io::stdin().read_line(line)).await
}

/// The read runs on a detached thread rather than `spawn_blocking`: runtime
/// shutdown waits for blocking tasks, and an unanswered prompt never returns.
async fn ask_with<F>(question: String, read_line: F) -> Option<String>
where
    F: FnOnce(&mut String) -> std::io::Result<usize> + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        eprint!("{}", question);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        let answer = match read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        };
        let _ = tx.send(answer);
    });
    rx.await.ok().flatten()
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Answers from command-line flags first, stdin otherwise
struct TerminalPrompt {
    scope: Option<PlaylistScope>,
    output: Option<PathBuf>,
    json: bool,
}

#[async_trait]
impl UserPrompt for TerminalPrompt {
    async fn choose_scope(&self, _url: &str) -> Option<PlaylistScope> {
        if let Some(scope) = self.scope {
            return Some(scope);
        }
        loop {
            let answer = ask("This link is part of a playlist. Download [i]tem only, entire [p]laylist, or [c]ancel? ".to_string()).await?;
            match answer.to_lowercase().as_str() {
                "i" | "item" => return Some(PlaylistScope::SingleItem),
                "p" | "playlist" => return Some(PlaylistScope::EntirePlaylist),
                "c" | "cancel" => return None,
                _ => continue,
            }
        }
    }

    async fn choose_save_file(&self, default_name: &str) -> Option<PathBuf> {
        if let Some(output) = &self.output {
            if output.is_dir() {
                return Some(output.join(default_name));
            }
            return Some(output.clone());
        }
        let answer = ask(format!("Save as [{}]: ", default_name)).await?;
        if answer.is_empty() {
            Some(current_dir().join(default_name))
        } else {
            Some(PathBuf::from(answer))
        }
    }

    async fn choose_directory(&self) -> Option<PathBuf> {
        if let Some(output) = &self.output {
            return Some(output.clone());
        }
        let answer = ask("Save playlist to directory [.]: ".to_string()).await?;
        if answer.is_empty() {
            Some(current_dir())
        } else {
            Some(PathBuf::from(answer))
        }
    }

    async fn show_message(&self, kind: MessageKind, text: &str) {
        if self.json {
            return;
        }
        match kind {
            MessageKind::Info => println!("{}", text),
            MessageKind::Error => eprintln!("Error: {}", text),
        }
    }
}

/// Render the session stream until its outcome arrives
async fn print_session(mut rx: UnboundedReceiver<SessionMessage>, json: bool) {
    while let Some(message) = rx.recv().await {
        if json {
            let value = match &message {
                SessionMessage::Progress(event) => serde_json::to_value(event),
                SessionMessage::Finished(outcome) => serde_json::to_value(outcome).map(|o| {
                    serde_json::json!({ "type": "finished", "outcome": o })
                }),
            };
            match value {
                Ok(value) => println!("{}", value),
                Err(e) => tracing::warn!("[Main] Cannot encode event: {}", e),
            }
        } else {
            match &message {
                SessionMessage::Progress(ProgressEvent::Percent { value }) => {
                    eprint!("\r  {:5.1}%", value);
                    let _ = std::io::stderr().flush();
                }
                SessionMessage::Progress(ProgressEvent::PlaylistIndex { current, total }) => {
                    eprint!("\n[{}/{}] ", current, total);
                }
                SessionMessage::Progress(ProgressEvent::ItemTitle { title }) => {
                    eprintln!("{}", title);
                }
                SessionMessage::Progress(ProgressEvent::RawLine { text }) => {
                    tracing::debug!("[yt-dlp] {}", text);
                }
                SessionMessage::Finished(_) => eprintln!(),
            }
        }
        if matches!(message, SessionMessage::Finished(_)) {
            break;
        }
    }
}

async fn run_download(
    ctx: &AppContext,
    url: String,
    kind: MediaKind,
    prompt: TerminalPrompt,
) -> ExitCode {
    let json = prompt.json;
    let (sink, rx) = ChannelSink::new();
    let printer = tokio::spawn(print_session(rx, json));
    let cancel = CancelFlag::new();

    let outcome = {
        let run = commands::start_download(ctx, &url, kind, &prompt, &sink, cancel.clone());
        tokio::pin!(run);
        loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                _ = tokio::signal::ctrl_c() => {
                    if cancel.is_cancelled() {
                        // Dropping the run kills the running child
                        break Some(Outcome::from_error(&DownloadError::Cancelled));
                    }
                    cancel.cancel();
                    eprintln!("\nStopping after the current item. Press Ctrl-C again to abort.");
                }
            }
        }
    };

    let code = match &outcome {
        Some(o) if o.success => ExitCode::SUCCESS,
        Some(_) => ExitCode::FAILURE,
        None => {
            if !json {
                eprintln!("Cancelled.");
            }
            ExitCode::SUCCESS
        }
    };
    match outcome {
        Some(outcome) => sink.finish(outcome),
        None => drop(sink),
    }
    let _ = printer.await;
    code
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match DownloaderConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    let config = config
        .with_downloader_path(cli.yt_dlp.clone())
        .with_encoder_path(cli.ffmpeg.clone());
    let ctx = AppContext::new(config);

    match cli.command {
        Commands::Download {
            url,
            audio: _,
            video,
            scope,
            output,
            json,
        } => {
            let kind = if video { MediaKind::Video } else { MediaKind::Audio };
            let prompt = TerminalPrompt {
                scope: scope.map(PlaylistScope::from),
                output,
                json,
            };
            run_download(&ctx, url, kind, prompt).await
        }

        Commands::Title { url } => match commands::fetch_title(&ctx, &url).await {
            Some(title) => {
                println!("{}", title);
                ExitCode::SUCCESS
            }
            None => {
                let err = DownloadError::ProbeFailure(format!("no title returned for {}", url));
                eprintln!("Error: {}", err);
                ExitCode::FAILURE
            }
        },

        Commands::Playlist { url, json } => {
            let entries = commands::fetch_playlist(&ctx, &url).await;
            if json {
                match serde_json::to_string_pretty(&entries) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                for (i, entry) in entries.iter().enumerate() {
                    println!("{:>3}. {} ({})", i + 1, entry.title, entry.id);
                }
                println!("{} entries", entries.len());
            }
            ExitCode::SUCCESS
        }

        Commands::Tools { json } => {
            let report = commands::tools_report(&ctx).await;
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                for status in &report {
                    let state = match (&status.version, &status.error) {
                        (Some(version), _) => format!("ok ({})", version),
                        (None, Some(error)) => format!("unavailable: {}", error),
                        (None, None) => "unavailable".to_string(),
                    };
                    println!("{:<7} {} -> {}", status.name, status.path, state);
                }
            }
            if report.iter().all(|s| s.is_available) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Commands::Config { init } => {
            let Some(path) = DownloaderConfig::default_path() else {
                eprintln!("Error: no configuration directory on this platform");
                return ExitCode::FAILURE;
            };
            if init {
                if path.exists() {
                    println!("{} already exists", path.display());
                } else if let Err(e) = DownloaderConfig::default().save_to(&path) {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                } else {
                    println!("Wrote {}", path.display());
                }
            }
            println!("# {}", path.display());
            match serde_json::to_string_pretty(ctx.config()) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn unanswered_prompt_does_not_hold_up_shutdown() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let answer = rt.block_on(async {
            let stalled = |_: &mut String| -> std::io::Result<usize> {
                std::thread::sleep(Duration::from_secs(10));
                Ok(0)
            };
            tokio::time::timeout(Duration::from_millis(50), ask_with("? ".to_string(), stalled)).await
        });
        assert!(answer.is_err());

        let started = Instant::now();
        drop(rt);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn answer_is_trimmed_and_eof_is_none() {
        let answer = ask_with(String::new(), |line| {
            line.push_str("  p \n");
            Ok(line.len())
        })
        .await;
        assert_eq!(answer.as_deref(), Some("p"));

        assert_eq!(ask_with(String::new(), |_| Ok(0)).await, None);
    }
}
