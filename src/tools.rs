//! External tool invocation.
//!
//! Every external step (megahit, minimap2, wgsim, bwa, samtools) goes through
//! `ToolCommand`: the full command line is logged, output is captured, the
//! exit status is checked and a run past its time limit is killed.

use anyhow::{Context, Result};
use std::env;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;

/// How much of a failing tool's stderr is kept in the error.
const STDERR_TAIL: usize = 2000;

/// Locates an executable by absolute path or on `PATH`.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() && path.exists() {
        return Ok(path.to_path_buf());
    }

    if let Ok(paths) = env::var("PATH") {
        for dir in env::split_paths(&paths) {
            let full_path = dir.join(name);
            if full_path.exists() && full_path.is_file() {
                return Ok(full_path);
            }
        }
    }

    Err(Error::Configuration(format!(
        "{} not found in PATH. Please install it or add it to your PATH.",
        name
    ))
    .into())
}

/// Shared interrupt flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the flag on SIGINT/SIGTERM. Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            log::warn!("Interrupt received, stopping after cleanup");
            flag.cancel();
        })
        .context("Failed to install signal handler")
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A single external command with a bounded run time.
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    cancel: Option<CancelFlag>,
}

impl ToolCommand {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
            cancel: None,
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `None` or a zero duration leaves the command unbounded.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Kill the command and fail with `Cancelled` once `flag` is set.
    pub fn cancel_on(mut self, flag: &CancelFlag) -> Self {
        self.cancel = Some(flag.clone());
        self
    }

    /// The command line as a single shell-like string, for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(|a| a.as_os_str()))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command to completion and returns its stdout.
    ///
    /// # Errors
    /// - `ExternalTool` when the exit status is not success
    /// - `ToolTimeout` when the time limit passes (the child is killed)
    /// - `Cancelled` when the cancel flag is raised (the child is killed)
    pub fn run(&self) -> Result<Vec<u8>> {
        let command_line = self.display();
        if let Some(flag) = &self.cancel {
            flag.check()?;
        }
        log::info!("Running: {}", command_line);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start `{}`", command_line))?;

        // Drain both pipes on their own threads so a chatty tool cannot block.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("Killed `{}`", command_line);
                return Err(Error::Cancelled.into());
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::ToolTimeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    }
                    .into());
                }
            }
            thread::sleep(Duration::from_millis(50));
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| anyhow::anyhow!("stdout reader thread panicked"))?;
        let stderr = stderr_handle
            .join()
            .map_err(|_| anyhow::anyhow!("stderr reader thread panicked"))?;

        log::debug!(
            "`{}` finished in {:.1}s ({})",
            command_line,
            started.elapsed().as_secs_f64(),
            status
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            // keep at most STDERR_TAIL chars
            let tail_start = stderr
                .char_indices()
                .rev()
                .nth(STDERR_TAIL - 1)
                .map(|(i, _)| i)
                .unwrap_or(0);
            return Err(Error::ExternalTool {
                command: command_line,
                status,
                stderr: stderr[tail_start..].to_string(),
            }
            .into());
        }

        Ok(stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_display_joins_arguments() {
        let cmd = ToolCommand::new("/usr/bin/bwa")
            .args(["aln", "-q", "5"])
            .arg("ref.fa");
        assert_eq!(cmd.display(), "/usr/bin/bwa aln -q 5 ref.fa");
    }

    #[test]
    fn test_successful_command_returns_stdout() {
        let out = ToolCommand::new("/bin/sh")
            .args(["-c", "printf hello"])
            .run()
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_nonzero_exit_is_external_tool_error() {
        let err = ToolCommand::new("/bin/sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run()
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), FailureKind::ExternalTool);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = ToolCommand::new("/bin/sh")
            .args(["-c", "sleep 5"])
            .timeout(Some(Duration::from_millis(200)))
            .run()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ToolTimeout { .. })
        ));
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let err = ToolCommand::new("/bin/sh")
            .args(["-c", "head -c 2500 /dev/zero | tr '\\0' x >&2; exit 1"])
            .run()
            .unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::ExternalTool { stderr, .. }) => {
                assert_eq!(stderr.chars().count(), STDERR_TAIL);
                assert!(stderr.chars().all(|c| c == 'x'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_short_stderr_kept_whole() {
        let err = ToolCommand::new("/bin/sh")
            .args(["-c", "echo oops >&2; exit 1"])
            .run()
            .unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::ExternalTool { stderr, .. }) => assert_eq!(stderr, "oops"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_kills_running_child() {
        let flag = CancelFlag::new();
        let trigger = flag.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = ToolCommand::new("/bin/sh")
            .args(["-c", "sleep 5"])
            .cancel_on(&flag)
            .run()
            .unwrap_err();
        canceller.join().unwrap();

        assert_eq!(FailureKind::of(&err), FailureKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cancelled_flag_prevents_start() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let flag = CancelFlag::new();
        flag.cancel();

        let err = ToolCommand::new("/bin/sh")
            .arg("-c")
            .arg(format!("touch {}", marker.display()))
            .cancel_on(&flag)
            .run()
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), FailureKind::Cancelled);
        assert!(!marker.exists());
    }

    #[test]
    fn test_find_executable_missing() {
        let err = find_executable("definitely-not-a-real-tool-xyz").unwrap_err();
        assert_eq!(FailureKind::of(&err), FailureKind::Configuration);
    }
}
