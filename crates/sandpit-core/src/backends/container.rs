//! Container sandbox backed by the Docker engine
//!
//! Strongest backend. Each call materializes the code into a fresh
//! tempdir, mounts it read-only into an ephemeral, network-disabled,
//! non-root container running the language's interpreter, waits with a
//! deadline, collects the logs, and unconditionally removes the container
//! afterward. Secondary cleanup failures are logged, never allowed to
//! mask the primary result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    CreateImageOptions as BollardCreateImageOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    StopContainerOptions as BollardStopContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use uuid::Uuid;

use super::IsolationBackend;
use crate::config::SandboxConfig;
use crate::core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};
use crate::errors::{ErrorInfo, ErrorKind, SandboxError};
use crate::languages::LanguageRegistry;

pub const BACKEND_NAME: &str = "container";

const WORKSPACE: &str = "/workspace";
const SANDBOX_USER: &str = "1000:1000";

fn short_id(container_id: &str) -> String {
    container_id.chars().take(12).collect()
}

pub struct ContainerSandbox {
    docker: Docker,
    languages: Arc<LanguageRegistry>,
    config: SandboxConfig,
}

impl ContainerSandbox {
    pub fn new(
        languages: Arc<LanguageRegistry>,
        config: SandboxConfig,
    ) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::InfrastructureUnavailable(e.to_string()))?;
        log::info!(
            "ContainerSandbox ready (timeout {:?}, memory limit {} bytes, network {})",
            config.timeout,
            config.memory_limit,
            if config.network_enabled { "enabled" } else { "disabled" }
        );
        Ok(Self {
            docker,
            languages,
            config,
        })
    }

    /// Make sure the image is present locally, pulling it on first use.
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                log::debug!("image {} already present", image);
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                log::info!("pulling image {} (first use, this may take a while)", image);
                let options = Some(BollardCreateImageOptionsQuery {
                    from_image: Some(image.to_string()),
                    ..Default::default()
                });
                let mut pull_stream = self.docker.create_image(options, None, None);
                while let Some(progress) = pull_stream.next().await {
                    progress.map_err(|e| SandboxError::ImageResolution {
                        image: image.to_string(),
                        message: e.to_string(),
                    })?;
                }
                log::info!("image {} pulled", image);
                Ok(())
            }
            Err(e) => Err(SandboxError::InfrastructureUnavailable(e.to_string())),
        }
    }

    /// Start the container and wait for it to finish, up to `timeout`.
    /// On expiry the container is stopped so the caller's forced removal
    /// completes promptly.
    async fn wait_for_exit(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> Result<i64, SandboxError> {
        self.docker
            .start_container(container_id, None::<BollardStartContainerOptionsQuery>)
            .await
            .map_err(|e| SandboxError::ContainerStartup(e.to_string()))?;

        let mut wait_stream = self
            .docker
            .wait_container(container_id, None::<BollardWaitContainerOptionsQuery>);
        let timeout_future = tokio::time::sleep(timeout);

        let wait_outcome = tokio::select! {
            res = wait_stream.next() => res,
            _ = timeout_future => {
                log::warn!(
                    "container {} exceeded {:?}, stopping",
                    short_id(container_id),
                    timeout
                );
                let stop_options = BollardStopContainerOptionsQuery {
                    t: Some(1),
                    ..Default::default()
                };
                let _ = self.docker.stop_container(container_id, Some(stop_options)).await;
                return Err(SandboxError::Timeout(timeout));
            }
        };

        match wait_outcome {
            Some(Ok(response)) => Ok(response.status_code),
            // Non-zero exits surface as a dedicated wait error carrying
            // the status code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(SandboxError::InfrastructureUnavailable(e.to_string())),
            None => Err(SandboxError::ContainerStartup(
                "container wait stream ended unexpectedly".to_string(),
            )),
        }
    }

    /// Collect split stdout/stderr logs. Log retrieval failure degrades to
    /// empty output rather than masking the exit status.
    async fn collect_logs(&self, container_id: &str) -> (String, String) {
        let mut output_stream = self.docker.logs(
            container_id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(log_result) = output_stream.next().await {
            match log_result {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message))
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message))
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "failed to read logs from container {}: {}",
                        short_id(container_id),
                        e
                    );
                    break;
                }
            }
        }
        (stdout, stderr)
    }

    /// Forced removal; failures are logged and swallowed so cleanup never
    /// overrides the primary result.
    async fn remove_container(&self, container_id: &str) {
        let options = BollardRemoveContainerOptionsQuery {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(container_id, Some(options)).await {
            log::warn!(
                "failed to remove container {}: {}",
                short_id(container_id),
                e
            );
        }
    }
}

#[async_trait]
impl IsolationBackend for ContainerSandbox {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        let profile = match self.languages.resolve(&request.language) {
            Ok(profile) => profile,
            Err(err) => return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed()),
        };
        let image = match &profile.image {
            Some(image) => image.clone(),
            None => {
                let err = SandboxError::ImageResolution {
                    image: request.language.clone(),
                    message: "no container image configured for this language".to_string(),
                };
                return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
            }
        };

        let timeout = request.timeout_override.unwrap_or(self.config.timeout);
        let memory = request
            .memory_limit_override
            .unwrap_or(self.config.memory_limit);
        let network_enabled = request.network_enabled.unwrap_or(self.config.network_enabled);

        if let Err(err) = self.ensure_image(&image).await {
            let mut result = ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
            result.image = Some(image);
            return result;
        }

        // Host-side workspace, removed when the tempdir drops on any path.
        let temp_dir = match tempfile::Builder::new().prefix("sandpit-exec-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let err = SandboxError::from(e);
                return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
            }
        };
        let source_path = temp_dir.path().join(profile.source_filename());
        if let Err(e) = tokio::fs::write(&source_path, &request.code).await {
            let err = SandboxError::from(e);
            return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
        }

        let script_in_container = format!("{}/{}", WORKSPACE, profile.source_filename());
        let cmd = profile.command_for(&script_in_container, WORKSPACE);

        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(format!("sandpit-exec-{}", Uuid::new_v4())),
            ..Default::default()
        });
        let body = ContainerCreateBody {
            image: Some(image.clone()),
            cmd: Some(cmd),
            working_dir: Some(WORKSPACE.to_string()),
            user: Some(SANDBOX_USER.to_string()),
            network_disabled: Some(!network_enabled),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                // Read-only bind: the container can never write back into
                // the host-visible source.
                binds: Some(vec![format!(
                    "{}:{}:ro",
                    temp_dir.path().to_string_lossy(),
                    WORKSPACE
                )]),
                memory: Some(memory as i64),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = match self.docker.create_container(options, body).await {
            Ok(container) => container,
            Err(e) => {
                let err = SandboxError::ContainerStartup(e.to_string());
                let mut result = ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
                result.image = Some(image);
                return result;
            }
        };
        let container_id = container.id.clone();
        log::debug!(
            "started container {} for {} execution",
            short_id(&container_id),
            request.language
        );

        let exit_outcome = self.wait_for_exit(&container_id, timeout).await;
        let logs = match &exit_outcome {
            Ok(_) => Some(self.collect_logs(&container_id).await),
            Err(_) => None,
        };
        // Unconditional teardown, on every branch above.
        self.remove_container(&container_id).await;

        let mut result = match exit_outcome {
            Ok(exit_code) => {
                let (stdout, stderr) = logs.unwrap_or_default();
                let error = if exit_code != 0 {
                    let message = if !stderr.trim().is_empty() {
                        stderr.trim().to_string()
                    } else if !stdout.trim().is_empty() {
                        stdout.trim().to_string()
                    } else {
                        format!("container exited with code {}", exit_code)
                    };
                    Some(ErrorInfo::new(ErrorKind::RuntimeExecution, message))
                } else {
                    None
                };
                ExecutionResult::completed(
                    BACKEND_NAME,
                    stdout,
                    stderr,
                    exit_code,
                    started.elapsed(),
                    error,
                )
            }
            Err(err) => ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed()),
        };
        result.container_id = Some(short_id(&container_id));
        result.image = Some(image);
        result
    }

    async fn availability(&self) -> BackendAvailability {
        match self.docker.version().await {
            Ok(version) => BackendAvailability {
                backend: BACKEND_NAME.to_string(),
                available: true,
                detail: version.version.map(|v| format!("docker {}", v)),
            },
            Err(e) => BackendAvailability {
                backend: BACKEND_NAME.to_string(),
                available: false,
                detail: Some(e.to_string()),
            },
        }
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: BACKEND_NAME.to_string(),
            timeout_secs: self.config.timeout.as_secs(),
            memory_limit_bytes: self.config.memory_limit,
            network_enabled: self.config.network_enabled,
            security_screen_enabled: false,
            languages: self.languages.languages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Option<ContainerSandbox> {
        ContainerSandbox::new(
            Arc::new(LanguageRegistry::builtin()),
            SandboxConfig::default(),
        )
        .ok()
    }

    async fn engine_available(sandbox: &ContainerSandbox) -> bool {
        sandbox.availability().await.available
    }

    #[test]
    fn test_short_id_truncates() {
        let id = "0123456789abcdef0123456789abcdef";
        assert_eq!(short_id(id), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn test_availability_tolerates_missing_engine() {
        // Works whether or not an engine is reachable; it must never panic
        // and must report a detail when down.
        if let Some(sandbox) = sandbox() {
            let availability = sandbox.availability().await;
            assert_eq!(availability.backend, "container");
            if !availability.available {
                assert!(availability.detail.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_language_creates_nothing() {
        let Some(sandbox) = sandbox() else { return };
        let request = ExecutionRequest::new("print(1)", "cobol");
        let result = sandbox.execute(&request).await;
        assert!(!result.success);
        assert_eq!(
            result.error.unwrap().kind,
            crate::errors::ErrorKind::UnsupportedLanguage
        );
        // Fails fast before any engine call.
        assert!(result.container_id.is_none());
    }

    // The tests below exercise a real engine and pull images; run with
    // `cargo test -- --ignored` on a machine with Docker.

    #[tokio::test]
    #[ignore]
    async fn test_container_executes_python() {
        let Some(sandbox) = sandbox() else { return };
        if !engine_available(&sandbox).await {
            return;
        }
        let request = ExecutionRequest::new("print(1 + 1)", "python");
        let result = sandbox.execute(&request).await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.stdout.trim(), "2");
        assert_eq!(result.exit_code, 0);
        assert!(result.container_id.is_some());
        assert_eq!(result.image.as_deref(), Some("python:3.11-slim"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_container_runtime_error_reported() {
        let Some(sandbox) = sandbox() else { return };
        if !engine_available(&sandbox).await {
            return;
        }
        let request = ExecutionRequest::new("1/0", "python");
        let result = sandbox.execute(&request).await;
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::RuntimeExecution);
        assert!(error.message.contains("division by zero"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_container_timeout_bounded() {
        let Some(sandbox) = sandbox() else { return };
        if !engine_available(&sandbox).await {
            return;
        }
        let request = ExecutionRequest::new("import time; time.sleep(100)", "python")
            .with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let result = sandbox.execute(&request).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Timeout);
        assert_eq!(result.exit_code, -1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[ignore]
    async fn test_isolation_between_calls() {
        let Some(sandbox) = sandbox() else { return };
        if !engine_available(&sandbox).await {
            return;
        }
        let write = ExecutionRequest::new(
            "open('/tmp/leak.txt', 'w').write('leak')",
            "python",
        )
        .with_timeout(Duration::from_secs(20));
        let _ = sandbox.execute(&write).await;

        let read = ExecutionRequest::new(
            "import os; print(os.path.exists('/tmp/leak.txt'))",
            "python",
        )
        .with_timeout(Duration::from_secs(20));
        let result = sandbox.execute(&read).await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.stdout.trim(), "False");
    }

    #[tokio::test]
    #[ignore]
    async fn test_network_disabled_blocks_connections() {
        let Some(sandbox) = sandbox() else { return };
        if !engine_available(&sandbox).await {
            return;
        }
        let code = "\
import socket\n\
s = socket.socket()\n\
s.settimeout(3)\n\
try:\n\
    s.connect(('1.1.1.1', 80))\n\
    print('connected')\n\
except OSError:\n\
    print('blocked')\n";
        let request =
            ExecutionRequest::new(code, "python").with_timeout(Duration::from_secs(20));
        let result = sandbox.execute(&request).await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.stdout.trim(), "blocked");
    }
}
