//! Subprocess plumbing shared by the tool adapters.
//!
//! - `ExecContext`: caller deadline, cancellation flag and working directory
//!   for one rule evaluation.
//! - `SubprocessExecutor`: spawns a tool with piped output and polls it,
//!   killing the child on cancellation or deadline expiry.
//! - `ConfigFile`: a tool configuration written to a temp file that is
//!   removed when dropped.
//! - npm helpers for the node-based tools.

use crate::adapter::ToolOutput;
use crate::error::{Result, ValidateError};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default per-invocation ceiling.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default)]
/// Shared cancellation flag. Cloning yields a handle to the same flag.
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
    /// Directory tools run in; the process CWD when unset.
    pub work_dir: Option<PathBuf>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Fail fast when the evaluation was already cancelled or is past its
    /// deadline.
    pub fn check(&self, program: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ValidateError::Cancelled {
                program: program.to_string(),
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ValidateError::TimedOut {
                    program: program.to_string(),
                    after: Duration::ZERO,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    pub timeout: Duration,
    pub work_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Default for SubprocessExecutor {
    fn default() -> Self {
        SubprocessExecutor {
            timeout: DEFAULT_TIMEOUT,
            work_dir: None,
            env: BTreeMap::new(),
        }
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(handle: thread::JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl SubprocessExecutor {
    pub fn with_timeout(timeout: Duration) -> Self {
        SubprocessExecutor {
            timeout,
            ..Default::default()
        }
    }

    /// Run `program` to completion and capture its output.
    ///
    /// The effective deadline is the earlier of the context deadline and
    /// `self.timeout`. A nonzero exit status is returned as data, not as an
    /// error.
    pub fn execute(&self, ctx: &ExecContext, program: &str, args: &[String]) -> Result<ToolOutput> {
        ctx.check(program)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&self.env);
        if let Some(dir) = ctx.work_dir.as_ref().or(self.work_dir.as_ref()) {
            command.current_dir(dir);
        }
        debug!(program, ?args, "spawning tool");

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| ValidateError::Launch {
            program: program.to_string(),
            source,
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let own_deadline = started + self.timeout;
        let deadline = match ctx.deadline {
            Some(d) if d < own_deadline => d,
            _ => own_deadline,
        };

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if ctx.cancel.is_cancelled() {
                        let _ = child.kill();
                        let _ = child.wait();
                        debug!(program, "tool cancelled");
                        return Err(ValidateError::Cancelled {
                            program: program.to_string(),
                        });
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ValidateError::TimedOut {
                            program: program.to_string(),
                            after: started.elapsed(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ValidateError::Io(e));
                }
            }
        };

        let output = ToolOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code().unwrap_or(-1),
            duration: started.elapsed(),
        };
        debug!(program, exit_code = output.exit_code, duration = ?output.duration, "tool finished");
        Ok(output)
    }
}

/// Tool configuration on disk for the duration of one invocation.
///
/// The file is removed when the value is dropped, whichever way the
/// invocation ends.
pub struct ConfigFile {
    file: NamedTempFile,
}

impl ConfigFile {
    /// Write `content` to a fresh file named `<prefix>XXXX<suffix>` inside
    /// `dir` (created if missing), or the system temp dir when `dir` is
    /// `None`.
    pub fn create(dir: Option<&Path>, prefix: &str, suffix: &str, content: &[u8]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(suffix);
        let mut file = match dir {
            Some(d) => {
                fs::create_dir_all(d)?;
                builder.tempfile_in(d)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(content)?;
        file.flush()?;
        Ok(ConfigFile { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn path_arg(&self) -> String {
        self.file.path().to_string_lossy().into_owned()
    }
}

/// Path of a binary installed under `<tools_dir>/node_modules/.bin`.
pub fn local_bin(tools_dir: &Path, name: &str) -> PathBuf {
    tools_dir.join("node_modules").join(".bin").join(name)
}

/// Locate `name`: the tools directory first, then `PATH`.
pub fn find_tool(tools_dir: &Path, name: &str) -> Option<PathBuf> {
    let local = local_bin(tools_dir, name);
    if local.exists() {
        return Some(local);
    }
    which::which(name).ok()
}

/// `npm install <package>@<version>` into `tools_dir`, creating a private
/// `package.json` there first so npm does not walk up to a parent project.
pub fn npm_install(
    executor: &SubprocessExecutor,
    ctx: &ExecContext,
    tools_dir: &Path,
    package: &str,
    version: &str,
) -> Result<()> {
    fs::create_dir_all(tools_dir)?;
    let npm = which::which("npm").map_err(|_| ValidateError::AdapterUnavailable {
        adapter: package.to_string(),
        reason: "npm not found: please install Node.js first".to_string(),
    })?;

    let manifest = tools_dir.join("package.json");
    if !manifest.exists() {
        let pkg = serde_json::json!({
            "name": "rulegate-tools",
            "version": "1.0.0",
            "description": "Analysis tools managed by rulegate",
            "private": true
        });
        fs::write(&manifest, serde_json::to_string_pretty(&pkg)?)?;
    }

    let spec = format!("{}@{}", package, version);
    info!(package = %spec, dir = %tools_dir.display(), "installing tool");
    let install_ctx = ExecContext {
        work_dir: Some(tools_dir.to_path_buf()),
        ..ctx.clone()
    };
    let npm = npm.to_string_lossy().into_owned();
    let out = executor.execute(&install_ctx, &npm, &["install".to_string(), spec])?;
    if out.exit_code != 0 {
        return Err(ValidateError::ToolFailed {
            tool: "npm".to_string(),
            code: out.exit_code,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_exit_code() {
        let exec = SubprocessExecutor::default();
        let out = exec
            .execute(&ExecContext::new(), "sh", &sh("echo hello; echo oops 1>&2; exit 3"))
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_env_and_work_dir() {
        let dir = tempdir().unwrap();
        let mut exec = SubprocessExecutor::default();
        exec.env.insert("RULEGATE_TEST_VAR".into(), "value".into());
        let ctx = ExecContext::new().with_work_dir(dir.path());
        let out = exec
            .execute(&ctx, "sh", &sh("echo $RULEGATE_TEST_VAR; pwd"))
            .unwrap();
        let lines: Vec<&str> = out.stdout.lines().collect();
        assert_eq!(lines[0], "value");
        let reported = fs::canonicalize(lines[1]).unwrap();
        assert_eq!(reported, fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let exec = SubprocessExecutor::with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = exec
            .execute(&ExecContext::new(), "sh", &sh("sleep 5"))
            .unwrap_err();
        assert!(matches!(err, ValidateError::TimedOut { .. }));
        assert!(err.is_cancellation());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_context_deadline_wins_over_executor_timeout() {
        let exec = SubprocessExecutor::default();
        let ctx = ExecContext::new().with_timeout(Duration::from_millis(50));
        let err = exec.execute(&ctx, "sh", &sh("sleep 5")).unwrap_err();
        assert!(matches!(err, ValidateError::TimedOut { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_terminates_child() {
        let exec = SubprocessExecutor::default();
        let token = CancelToken::new();
        let ctx = ExecContext::new().with_cancel(token.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        let started = Instant::now();
        let err = exec.execute(&ctx, "sh", &sh("sleep 5")).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ValidateError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cancelled_context_does_not_spawn() {
        let ctx = ExecContext::new();
        ctx.cancel.cancel();
        let err = SubprocessExecutor::default()
            .execute(&ctx, "definitely-not-a-real-binary", &[])
            .unwrap_err();
        assert!(matches!(err, ValidateError::Cancelled { .. }));
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let err = SubprocessExecutor::default()
            .execute(&ExecContext::new(), "rulegate-missing-binary-xyz", &[])
            .unwrap_err();
        assert!(matches!(err, ValidateError::Launch { .. }));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_config_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = {
            let cfg = ConfigFile::create(Some(&dir.path().join(".tmp")), "cfg-", ".json", b"{}")
                .unwrap();
            assert_eq!(fs::read_to_string(cfg.path()).unwrap(), "{}");
            assert!(cfg.path_arg().ends_with(".json"));
            cfg.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_config_file_removed_on_error_path() {
        fn run(dir: &Path) -> Result<PathBuf> {
            let cfg = ConfigFile::create(Some(dir), "cfg-", ".xml", b"<x/>")?;
            let p = cfg.path().to_path_buf();
            Err(ValidateError::parse(p.to_string_lossy().as_ref(), "boom"))
        }
        let dir = tempdir().unwrap();
        let err = run(dir.path()).unwrap_err();
        let ValidateError::Parse { tool, .. } = err else {
            panic!("unexpected error");
        };
        assert!(!Path::new(&tool).exists());
    }

    #[test]
    fn test_find_tool_prefers_tools_dir() {
        let dir = tempdir().unwrap();
        let bin = local_bin(dir.path(), "fake-linter");
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, "").unwrap();
        assert_eq!(find_tool(dir.path(), "fake-linter"), Some(bin));
        assert_eq!(find_tool(dir.path(), "rulegate-missing-binary-xyz"), None);
    }
}
