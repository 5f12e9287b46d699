//! Bare process sandbox
//!
//! Weakest backend: the submitted code runs as an isolated child process
//! with captured output and a wall-clock deadline, nothing more. No
//! resource ceilings and no security screening. Also hosts the shared
//! host-process runner that the resource-limited backend builds on.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use super::IsolationBackend;
use crate::config::{SandboxConfig, KILL_GRACE};
use crate::core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};
use crate::errors::{ErrorInfo, ErrorKind, SandboxError};
use crate::languages::{LanguageProfile, LanguageRegistry};

pub const BACKEND_NAME: &str = "process";

/// Resource ceilings applied to a host process before exec.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostLimits {
    pub memory_bytes: u64,
    pub cpu_seconds: u64,
    pub max_open_files: u64,
}

pub(crate) struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

#[cfg(unix)]
fn apply_limits(limits: HostLimits) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    setrlimit(Resource::RLIMIT_AS, limits.memory_bytes, limits.memory_bytes)?;
    setrlimit(Resource::RLIMIT_CPU, limits.cpu_seconds, limits.cpu_seconds)?;
    setrlimit(
        Resource::RLIMIT_NOFILE,
        limits.max_open_files,
        limits.max_open_files,
    )?;
    Ok(())
}

/// Escalating termination: SIGTERM, a bounded grace wait, then SIGKILL.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    }
}

/// Write the code into a fresh tempdir, spawn the language's interpreter
/// against it, and wait up to `timeout`. The tempdir is removed on every
/// exit path when it drops.
pub(crate) async fn run_host_process(
    profile: &LanguageProfile,
    code: &str,
    timeout: std::time::Duration,
    limits: Option<HostLimits>,
) -> Result<RunOutput, SandboxError> {
    let temp_dir = tempfile::Builder::new().prefix("sandpit-").tempdir()?;
    let source_path = temp_dir.path().join(profile.source_filename());
    tokio::fs::write(&source_path, code).await?;

    let argv = profile.command_for(
        &source_path.to_string_lossy(),
        &temp_dir.path().to_string_lossy(),
    );
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| SandboxError::LaunchFailure("empty run command".to_string()))?;

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(temp_dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    if let Some(limits) = limits {
        unsafe {
            command.pre_exec(move || apply_limits(limits));
        }
    }
    #[cfg(not(unix))]
    let _ = limits;

    let mut child = command.spawn().map_err(|e| {
        SandboxError::LaunchFailure(format!("could not launch '{}': {}", program, e))
    })?;

    let mut stdout_pipe = child.stdout.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });
    let mut stderr_pipe = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = tokio::time::sleep(timeout) => {
            log::warn!("process execution timed out after {:?}, terminating", timeout);
            terminate(&mut child).await;
            return Err(SandboxError::Timeout(timeout));
        }
    };
    let status =
        status.map_err(|e| SandboxError::LaunchFailure(format!("wait failed: {}", e)))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit_code = status.code().map(i64::from).unwrap_or(-1);

    Ok(RunOutput {
        stdout,
        stderr,
        exit_code,
    })
}

/// Build a completed-run result, attributing non-zero exits to the code.
pub(crate) fn result_from_output(
    backend: &str,
    output: RunOutput,
    elapsed: std::time::Duration,
) -> ExecutionResult {
    let error = if output.exit_code != 0 {
        let message = if output.stderr.trim().is_empty() {
            format!("process exited with code {}", output.exit_code)
        } else {
            output.stderr.trim().to_string()
        };
        Some(ErrorInfo::new(ErrorKind::RuntimeExecution, message))
    } else {
        None
    };
    ExecutionResult::completed(
        backend,
        output.stdout,
        output.stderr,
        output.exit_code,
        elapsed,
        error,
    )
}

/// Probe which of the registry's interpreters resolve on `PATH`.
pub(crate) fn host_interpreter_availability(
    backend: &str,
    languages: &LanguageRegistry,
) -> BackendAvailability {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for language in languages.languages() {
        if let Ok(profile) = languages.resolve(&language) {
            let program = profile.run_command.first().cloned().unwrap_or_default();
            if which::which(&program).is_ok() {
                found.push(language);
            } else {
                missing.push(language);
            }
        }
    }
    if found.is_empty() {
        BackendAvailability {
            backend: backend.to_string(),
            available: false,
            detail: Some("no host interpreters found".to_string()),
        }
    } else {
        let mut detail = format!("host interpreters for: {}", found.join(", "));
        if !missing.is_empty() {
            detail.push_str(&format!("; missing: {}", missing.join(", ")));
        }
        BackendAvailability {
            backend: backend.to_string(),
            available: true,
            detail: Some(detail),
        }
    }
}

/// Executes code as an isolated child process with a wall-clock timeout.
pub struct ProcessSandbox {
    languages: Arc<LanguageRegistry>,
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(languages: Arc<LanguageRegistry>, config: SandboxConfig) -> Self {
        log::info!(
            "ProcessSandbox ready (timeout {:?}, {} languages)",
            config.timeout,
            languages.len()
        );
        Self { languages, config }
    }
}

#[async_trait]
impl IsolationBackend for ProcessSandbox {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let profile = match self.languages.resolve(&request.language) {
            Ok(profile) => profile,
            Err(err) => return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed()),
        };
        let timeout = request.timeout_override.unwrap_or(self.config.timeout);

        match run_host_process(profile, &request.code, timeout, None).await {
            Ok(output) => result_from_output(BACKEND_NAME, output, started.elapsed()),
            Err(err) => ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed()),
        }
    }

    async fn availability(&self) -> BackendAvailability {
        host_interpreter_availability(BACKEND_NAME, &self.languages)
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: BACKEND_NAME.to_string(),
            timeout_secs: self.config.timeout.as_secs(),
            memory_limit_bytes: 0,
            network_enabled: true,
            security_screen_enabled: false,
            languages: self.languages.languages(),
        }
    }
}
