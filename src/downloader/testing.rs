// Scripted ProcessRunner for unit tests

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::errors::DownloadError;
use super::traits::{CapturedOutput, OutputStream, ProcessRunner};

/// What a scripted child does
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    pub code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub spawn_error: bool,
    pub timeout: bool,
    pub delay: Duration,
}

impl FakeResponse {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn exit(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timeout: true,
            ..Self::default()
        }
    }

    pub fn stdout(mut self, line: &str) -> Self {
        self.stdout.push(line.to_string());
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.stderr.push(line.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Box<dyn Fn(&Path, &[String]) -> FakeResponse + Send + Sync>;

/// Records every invocation and answers from a handler closure
pub struct FakeRunner {
    handler: Handler,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Path, &[String]) -> FakeResponse + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations whose program path matches `program`
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(p, _)| p == Path::new(program))
            .map(|(_, args)| args)
            .collect()
    }

    /// Largest number of children that were running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn start(&self, program: &Path, args: &[String]) -> Result<FakeResponse, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        let response = (self.handler)(program, args);
        if response.spawn_error {
            return Err(DownloadError::Spawn {
                program: program.display().to_string(),
                reason: "No such file or directory".to_string(),
            });
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(response.delay.max(Duration::from_millis(1))).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if response.timeout {
            return Err(DownloadError::Timeout {
                program: program.display().to_string(),
                secs: 1,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn capture(
        &self,
        program: &Path,
        args: &[String],
        _limit: Duration,
    ) -> Result<CapturedOutput, DownloadError> {
        let response = self.start(program, args).await?;
        Ok(CapturedOutput {
            code: response.code,
            stdout: response.stdout.join("\n"),
            stderr: response.stderr.join("\n"),
        })
    }

    async fn stream(
        &self,
        program: &Path,
        args: &[String],
        on_line: &mut (dyn for<'a> FnMut(OutputStream, &'a str) + Send),
    ) -> Result<Option<i32>, DownloadError> {
        let response = self.start(program, args).await?;
        for line in &response.stdout {
            on_line(OutputStream::Stdout, line);
        }
        for line in &response.stderr {
            on_line(OutputStream::Stderr, line);
        }
        Ok(response.code)
    }
}

/// Value following `flag` in an argument list
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
