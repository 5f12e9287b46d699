//! Resource- and security-checked process sandbox
//!
//! Composes the safety screen with the shared host-process runner: code is
//! screened before anything is spawned, and the child process runs under
//! rlimit ceilings (address space, CPU time, open files) with a tighter
//! default timeout than the bare process backend. Validation rejections
//! are distinct from runtime errors so callers can tell "we refused to run
//! this" apart from "the code failed".

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::process::{host_interpreter_availability, result_from_output, run_host_process, HostLimits};
use super::IsolationBackend;
use crate::config::SandboxConfig;
use crate::core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};
use crate::languages::LanguageRegistry;
use crate::safety::SafetyPolicy;

pub const BACKEND_NAME: &str = "resource_limited";

/// Ceiling on this backend's timeout regardless of the shared config;
/// the bare process and container backends keep the looser default.
pub const STRICT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_OPEN_FILES: u64 = 64;

pub struct ResourceLimitedSandbox {
    languages: Arc<LanguageRegistry>,
    config: SandboxConfig,
    policy: Arc<dyn SafetyPolicy>,
}

impl ResourceLimitedSandbox {
    pub fn new(
        languages: Arc<LanguageRegistry>,
        config: SandboxConfig,
        policy: Arc<dyn SafetyPolicy>,
    ) -> Self {
        let config = SandboxConfig {
            timeout: config.timeout.min(STRICT_TIMEOUT),
            ..config
        };
        log::info!(
            "ResourceLimitedSandbox ready (timeout {:?}, memory limit {} bytes, policy {})",
            config.timeout,
            config.memory_limit,
            policy.name()
        );
        Self {
            languages,
            config,
            policy,
        }
    }
}

#[async_trait]
impl IsolationBackend for ResourceLimitedSandbox {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        // Strict gate: rejection short-circuits before any spawn.
        if self.config.security_screen_enabled {
            if let Err(err) = self.policy.screen(&request.language, &request.code) {
                return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed());
            }
        }

        let profile = match self.languages.resolve(&request.language) {
            Ok(profile) => profile,
            Err(err) => return ExecutionResult::failure(BACKEND_NAME, &err, started.elapsed()),
        };

        let timeout = request
            .timeout_override
            .unwrap_or(self.config.timeout)
            .min(STRICT_TIMEOUT);
        let limits = HostLimits {
            memory_bytes: request
                .memory_limit_override
                .unwrap_or(self.config.memory_limit),
            cpu_seconds: timeout.as_secs().max(1),
            max_open_files: MAX_OPEN_FILES,
        };

        match run_host_process(profile, &request.code, timeout, Some(limits)).await {
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
            memory_limit_bytes: self.config.memory_limit,
            network_enabled: true,
            security_screen_enabled: self.config.security_screen_enabled,
            languages: self.languages.languages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::languages::LanguageProfile;
    use crate::safety::{DenyListPolicy, PermissivePolicy};

    fn shell_registry() -> Arc<LanguageRegistry> {
        // "python" here is really sh so the deny list applies without
        // needing a host python.
        Arc::new(LanguageRegistry::new(vec![
            LanguageProfile::new("shell", "sh", vec!["sh", "{file}"], None),
            LanguageProfile::new("python", "py", vec!["sh", "{file}"], None),
        ]))
    }

    fn sandbox(policy: Arc<dyn SafetyPolicy>) -> ResourceLimitedSandbox {
        ResourceLimitedSandbox::new(shell_registry(), SandboxConfig::default(), policy)
    }

    #[tokio::test]
    async fn test_rejected_code_never_spawns() {
        let sandbox = sandbox(Arc::new(DenyListPolicy::new()));
        let request = ExecutionRequest::new("import os\nos.system('id')", "python");
        let started = Instant::now();
        let result = sandbox.execute(&request).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, -100);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(error.message.contains("import os"));
        // No process ran: rejection is effectively instant and produces
        // no output.
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_clean_code_executes() {
        let sandbox = sandbox(Arc::new(DenyListPolicy::new()));
        let request = ExecutionRequest::new("echo screened-and-ran", "shell");
        let result = sandbox.execute(&request).await;
        assert!(result.success, "stderr: {}", result.stderr);
        assert_eq!(result.stdout.trim(), "screened-and-ran");
        assert_eq!(result.backend, "resource_limited");
    }

    #[tokio::test]
    async fn test_permissive_policy_skips_screen() {
        let sandbox = sandbox(Arc::new(PermissivePolicy::new()));
        let request = ExecutionRequest::new("echo 'eval(1)'", "python");
        let result = sandbox.execute(&request).await;
        assert!(result.success, "stderr: {}", result.stderr);
    }

    #[tokio::test]
    async fn test_screen_disabled_by_config() {
        let config = SandboxConfig {
            security_screen_enabled: false,
            ..SandboxConfig::default()
        };
        let sandbox = ResourceLimitedSandbox::new(
            shell_registry(),
            config,
            Arc::new(DenyListPolicy::new()),
        );
        // Would be rejected by the deny list, but the screen is off.
        let request = ExecutionRequest::new("echo import os", "python");
        let result = sandbox.execute(&request).await;
        assert!(result.success, "stderr: {}", result.stderr);
    }

    #[tokio::test]
    async fn test_timeout_is_clamped_to_strict_ceiling() {
        let config = SandboxConfig::default().with_timeout(Duration::from_secs(300));
        let sandbox = ResourceLimitedSandbox::new(
            shell_registry(),
            config,
            Arc::new(PermissivePolicy::new()),
        );
        assert_eq!(sandbox.info().timeout_secs, STRICT_TIMEOUT.as_secs());
    }

    fn workspace_entries() -> std::collections::HashSet<std::ffi::OsString> {
        std::fs::read_dir(std::env::temp_dir())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name())
                    .filter(|name| name.to_string_lossy().starts_with("sandpit-"))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_limited_batch_leaves_no_workspaces_behind() {
        let baseline = workspace_entries();
        let sandbox = sandbox(Arc::new(DenyListPolicy::new()));
        let requests = [
            ExecutionRequest::new("import os", "python"),
            ExecutionRequest::new("exit 4", "shell"),
            ExecutionRequest::new("sleep 30", "shell").with_timeout(Duration::from_millis(500)),
        ];
        for request in requests {
            let _ = sandbox.execute(&request).await;
        }
        // Poll: concurrently running tests may hold a live workspace, but
        // a leaked one never disappears.
        let mut leftover = Vec::new();
        for _ in 0..50 {
            leftover = workspace_entries()
                .difference(&baseline)
                .cloned()
                .collect();
            if leftover.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(leftover.is_empty(), "leftover workspaces: {:?}", leftover);
    }

    // RLIMIT_AS is readable from inside the child: sh reports it via
    // `ulimit -v` in KiB.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_memory_ceiling_applied_to_child() {
        let config = SandboxConfig::default().with_memory_limit(32 * 1024 * 1024);
        let sandbox = ResourceLimitedSandbox::new(
            shell_registry(),
            config,
            Arc::new(PermissivePolicy::new()),
        );
        let request = ExecutionRequest::new("ulimit -v", "shell");
        let result = sandbox.execute(&request).await;
        assert!(result.success, "stderr: {}", result.stderr);
        assert_eq!(result.stdout.trim(), "32768");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_memory_override_replaces_configured_ceiling() {
        let sandbox = sandbox(Arc::new(PermissivePolicy::new()));
        let request =
            ExecutionRequest::new("ulimit -v", "shell").with_memory_limit(48 * 1024 * 1024);
        let result = sandbox.execute(&request).await;
        assert!(result.success, "stderr: {}", result.stderr);
        assert_eq!(result.stdout.trim(), "49152");
    }

    #[tokio::test]
    async fn test_runtime_failure_is_not_validation() {
        let sandbox = sandbox(Arc::new(DenyListPolicy::new()));
        let request = ExecutionRequest::new("exit 3", "shell");
        let result = sandbox.execute(&request).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.error.unwrap().kind, ErrorKind::RuntimeExecution);
    }
}
