// Child-process runner on tokio::process
//
// Children are spawned with kill_on_drop, so tearing down a run (dropping its
// future) never leaves an orphaned yt-dlp behind.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use super::errors::DownloadError;
use super::traits::{CapturedOutput, OutputStream, ProcessRunner};

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn(program: &Path, args: &[String]) -> Result<Child, DownloadError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

        cmd.spawn().map_err(|e| DownloadError::Spawn {
            program: program.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Hand each `\r`- or `\n`-separated piece of a raw line to the callback.
/// yt-dlp redraws progress with carriage returns when it thinks it has a
/// terminal.
fn dispatch(
    stream: OutputStream,
    raw: &[u8],
    on_line: &mut (dyn for<'a> FnMut(OutputStream, &'a str) + Send),
) {
    let text = String::from_utf8_lossy(raw);
    for piece in text.split(|c: char| c == '\r' || c == '\n') {
        let piece = piece.trim_end();
        if !piece.is_empty() {
            on_line(stream, piece);
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn capture(
        &self,
        program: &Path,
        args: &[String],
        limit: Duration,
    ) -> Result<CapturedOutput, DownloadError> {
        let mut child = Self::spawn(program, args)?;
        let name = program.display().to_string();

        let mut stdout_pipe = child.stdout.take().ok_or_else(|| DownloadError::Spawn {
            program: name.clone(),
            reason: "failed to capture stdout".to_string(),
        })?;
        let mut stderr_pipe = child.stderr.take().ok_or_else(|| DownloadError::Spawn {
            program: name.clone(),
            reason: "failed to capture stderr".to_string(),
        })?;

        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
        });
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
        });

        // The limit covers draining too: a grandchild can keep the pipes open
        // after the direct child has exited.
        let finished = timeout(limit, async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task)
                .await
                .map_err(|e| DownloadError::Io(std::io::Error::other(e)))??;
            let stderr = (&mut stderr_task)
                .await
                .map_err(|e| DownloadError::Io(std::io::Error::other(e)))??;
            Ok::<_, DownloadError>(CapturedOutput {
                code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).to_string(),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            })
        })
        .await;

        match finished {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("[Runner] {} timed out after {:?}, killing", name, limit);
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                Err(DownloadError::Timeout {
                    program: name,
                    secs: limit.as_secs(),
                })
            }
        }
    }

    async fn stream(
        &self,
        program: &Path,
        args: &[String],
        on_line: &mut (dyn for<'a> FnMut(OutputStream, &'a str) + Send),
    ) -> Result<Option<i32>, DownloadError> {
        tracing::debug!("[Runner] {} {}", program.display(), args.join(" "));
        let mut child = Self::spawn(program, args)?;
        let name = program.display().to_string();

        let stdout = child.stdout.take().ok_or_else(|| DownloadError::Spawn {
            program: name.clone(),
            reason: "failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| DownloadError::Spawn {
            program: name.clone(),
            reason: "failed to capture stderr".to_string(),
        })?;

        let mut out_reader = BufReader::new(stdout).split(b'\n');
        let mut err_reader = BufReader::new(stderr).split(b'\n');
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                res = out_reader.next_segment(), if !stdout_done => match res {
                    Ok(Some(raw)) => dispatch(OutputStream::Stdout, &raw, on_line),
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        tracing::warn!("[Runner] Error reading stdout of {}: {}", name, e);
                        stdout_done = true;
                    }
                },
                res = err_reader.next_segment(), if !stderr_done => match res {
                    Ok(Some(raw)) => dispatch(OutputStream::Stderr, &raw, on_line),
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        tracing::warn!("[Runner] Error reading stderr of {}: {}", name, e);
                        stderr_done = true;
                    }
                },
            }
        }

        let status = child.wait().await?;
        Ok(status.code())
    }
}
