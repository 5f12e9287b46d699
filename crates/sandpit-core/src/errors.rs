//! Error types for the sandbox execution core
//!
//! Every failure mode a backend can hit is captured here. The taxonomy
//! distinguishes "we refused to run this" (validation), "the environment
//! could not be created" (launch/startup/image errors), "the code ran and
//! failed" (runtime execution), and "the engine itself is down"
//! (infrastructure) so that a caller comparing backends can tell a broken
//! backend apart from broken user code. Per-call failures never cross the
//! API boundary as `Err`; they are folded into the returned
//! `ExecutionResult` as an [`ErrorInfo`].

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("security screen rejected code: {0}")]
    Validation(String),
    #[error("failed to launch execution environment: {0}")]
    LaunchFailure(String),
    #[error("container startup failed: {0}")]
    ContainerStartup(String),
    #[error("execution timed out after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("could not resolve image '{image}': {message}")]
    ImageResolution { image: String, message: String },
    #[error("container engine unreachable: {0}")]
    InfrastructureUnavailable(String),
    #[error("backend '{0}' is not available")]
    BackendUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-readable failure category, surfaced in `ExecutionResult.error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    Validation,
    LaunchFailure,
    ContainerStartup,
    RuntimeExecution,
    Timeout,
    ImageResolution,
    InfrastructureUnavailable,
    BackendUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::Validation => "validation",
            ErrorKind::LaunchFailure => "launch_failure",
            ErrorKind::ContainerStartup => "container_startup",
            ErrorKind::RuntimeExecution => "runtime_execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ImageResolution => "image_resolution",
            ErrorKind::InfrastructureUnavailable => "infrastructure_unavailable",
            ErrorKind::BackendUnavailable => "backend_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried inside an `ExecutionResult`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            SandboxError::Validation(_) => ErrorKind::Validation,
            SandboxError::LaunchFailure(_) => ErrorKind::LaunchFailure,
            SandboxError::ContainerStartup(_) => ErrorKind::ContainerStartup,
            SandboxError::Timeout(_) => ErrorKind::Timeout,
            SandboxError::ImageResolution { .. } => ErrorKind::ImageResolution,
            SandboxError::InfrastructureUnavailable(_) => ErrorKind::InfrastructureUnavailable,
            SandboxError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            SandboxError::Io(_) => ErrorKind::LaunchFailure,
        }
    }

    /// Sentinel exit code reported when no process or container produced one.
    pub fn exit_code(&self) -> i64 {
        match self {
            SandboxError::Validation(_) => -100,
            SandboxError::LaunchFailure(_) | SandboxError::Io(_) => -2,
            SandboxError::ImageResolution { .. } => -2,
            SandboxError::ContainerStartup(_) => -3,
            SandboxError::InfrastructureUnavailable(_) => -3,
            _ => -1,
        }
    }
}

impl From<&SandboxError> for ErrorInfo {
    fn from(err: &SandboxError) -> Self {
        ErrorInfo::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_echoes_configured_value() {
        let err = SandboxError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains('5'));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_validation_uses_sentinel_exit_code() {
        let err = SandboxError::Validation("disallowed construct: eval(".to_string());
        assert_eq!(err.exit_code(), -100);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UnsupportedLanguage).unwrap();
        assert_eq!(json, "\"unsupported_language\"");
    }
}
