use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{PubupError, Result};

/// Poll interval while waiting on a child process.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Which pub toolchain fronts the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubTool {
    Dart,
    Flutter,
}

impl PubTool {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "dart" => Ok(Self::Dart),
            "flutter" => Ok(Self::Flutter),
            other => Err(PubupError::ProjectValidation(format!(
                "Unknown pub tool '{other}', expected 'dart' or 'flutter'"
            ))),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::Dart => "dart",
            Self::Flutter => "flutter",
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub(crate) struct CapturedOutput {
    pub status_code: i32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command to completion with a hard time budget.
///
/// stdout and stderr are drained on side threads so a chatty child cannot
/// fill a pipe and stall. On expiry the child is killed and the call fails
/// with a timeout error rather than a stale-update misdiagnosis.
pub(crate) fn run_with_timeout(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<CapturedOutput> {
    if std::env::var("PUBUP_VERBOSE").is_ok() {
        eprintln!("[VERBOSE] Running: {label}");
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| PubupError::SubprocessFailure {
        command: label.to_string(),
        status: -1,
        stderr: format!("failed to spawn: {e}"),
    })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_quietly(&mut child);
            return Err(PubupError::SubprocessTimeout {
                command: label.to_string(),
                budget_secs: timeout.as_secs(),
            });
        }
        thread::sleep(WAIT_POLL);
    };

    Ok(CapturedOutput {
        status_code: status.code().unwrap_or(-1),
        success: status.success(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    })
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn ensure_success(output: &CapturedOutput, label: &str) -> Result<()> {
    if output.success {
        return Ok(());
    }
    Err(PubupError::SubprocessFailure {
        command: label.to_string(),
        status: output.status_code,
        stderr: output.stderr.trim().to_string(),
    })
}

/// Subprocess boundary for the pub toolchain.
///
/// The agent never interprets manifest or lockfile content; it only stages
/// invocations of the external tool that does.
pub struct PubExecutionAgent {
    tool: PubTool,
    timeout: Duration,
}

impl PubExecutionAgent {
    pub fn new(tool: PubTool, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    /// Upgrade exactly one dependency in `workdir`, mutating the staged
    /// manifest and lockfile in place.
    ///
    /// When a target version is pinned the constraint itself must move, so
    /// the tool is asked to rewrite it rather than stay within the current
    /// range.
    pub fn upgrade(
        &self,
        workdir: &Path,
        dependency: &str,
        version: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()> {
        let mut args = vec!["pub", "upgrade"];
        if version.is_some() {
            args.push("--major-versions");
        }
        args.push(dependency);

        let label = format!("{} {}", self.tool.command(), args.join(" "));
        let mut command = Command::new(self.tool.command());
        command.current_dir(workdir).args(&args);
        for (key, value) in env {
            command.env(key, value);
        }

        let output = run_with_timeout(command, &label, self.timeout)?;
        ensure_success(&output, &label)
    }

    /// Produce the raw JSON report of `pub outdated` for the staged pair.
    pub fn outdated_report(&self, workdir: &Path, env: &[(String, String)]) -> Result<String> {
        let args = ["pub", "outdated", "--json"];
        let label = format!("{} {}", self.tool.command(), args.join(" "));

        let mut command = Command::new(self.tool.command());
        command.current_dir(workdir).args(args);
        for (key, value) in env {
            command.env(key, value);
        }

        let output = run_with_timeout(command, &label, self.timeout)?;
        ensure_success(&output, &label)?;
        Ok(output.stdout)
    }
}

impl crate::agents::update_orchestrator::ResolverInvoker for PubExecutionAgent {
    fn upgrade(
        &self,
        workdir: &Path,
        dependency: &str,
        version: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()> {
        PubExecutionAgent::upgrade(self, workdir, dependency, version, env)
    }
}
