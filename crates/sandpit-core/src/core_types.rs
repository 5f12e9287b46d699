//! Request and result types shared by every isolation backend
//!
//! A request is created per call and discarded once the corresponding
//! result is returned; the core persists nothing. Exactly one
//! `ExecutionResult` is produced per request regardless of which failure
//! mode occurred.

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::errors::{ErrorInfo, SandboxError};

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// A single code execution request. Immutable once constructed; the
/// optional fields override the owning backend's configuration for this
/// call only.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub timeout_override: Option<Duration>,
    pub memory_limit_override: Option<u64>,
    pub network_enabled: Option<bool>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            timeout_override: None,
            memory_limit_override: None,
            network_enabled: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_override = Some(bytes);
        self
    }

    pub fn with_network(mut self, enabled: bool) -> Self {
        self.network_enabled = Some(enabled);
        self
    }
}

/// Outcome of one execution. `success` implies `exit_code == 0`; a
/// non-zero exit, timeout, or any pre-execution rejection is reported
/// through `error` rather than by returning `Err` to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    #[serde(serialize_with = "serialize_secs")]
    pub execution_time: Duration,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ExecutionResult {
    /// Result for a run that completed (successfully or not) with a real
    /// exit status.
    pub fn completed(
        backend: impl Into<String>,
        stdout: String,
        stderr: String,
        exit_code: i64,
        execution_time: Duration,
        error: Option<ErrorInfo>,
    ) -> Self {
        Self {
            success: exit_code == 0 && error.is_none(),
            stdout,
            stderr,
            exit_code,
            execution_time,
            backend: backend.into(),
            container_id: None,
            image: None,
            error,
        }
    }

    /// Result for a call that failed before or instead of producing an
    /// exit status of its own.
    pub fn failure(
        backend: impl Into<String>,
        err: &SandboxError,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: err.exit_code(),
            execution_time,
            backend: backend.into(),
            container_id: None,
            image: None,
            error: Some(ErrorInfo::from(err)),
        }
    }
}

/// Liveness report for one backend, derived on demand by probing it.
#[derive(Debug, Clone, Serialize)]
pub struct BackendAvailability {
    pub backend: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Static configuration summary for one backend, for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub backend: String,
    pub timeout_secs: u64,
    pub memory_limit_bytes: u64,
    pub network_enabled: bool,
    pub security_screen_enabled: bool,
    pub languages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_completed_success_iff_zero_exit() {
        let ok = ExecutionResult::completed(
            "process",
            "2\n".into(),
            String::new(),
            0,
            Duration::from_millis(12),
            None,
        );
        assert!(ok.success);

        let failed = ExecutionResult::completed(
            "process",
            String::new(),
            "boom".into(),
            1,
            Duration::from_millis(12),
            Some(ErrorInfo::new(ErrorKind::RuntimeExecution, "boom")),
        );
        assert!(!failed.success);
        assert_eq!(failed.exit_code, 1);
    }

    #[test]
    fn test_failure_carries_structured_error() {
        let err = SandboxError::UnsupportedLanguage("cobol".into());
        let result = ExecutionResult::failure("container", &err, Duration::ZERO);
        assert!(!result.success);
        let info = result.error.unwrap();
        assert_eq!(info.kind, ErrorKind::UnsupportedLanguage);
        assert!(info.message.contains("cobol"));
    }

    #[test]
    fn test_execution_time_serializes_as_seconds() {
        let result = ExecutionResult::completed(
            "process",
            String::new(),
            String::new(),
            0,
            Duration::from_millis(1500),
            None,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["execution_time"], serde_json::json!(1.5));
    }

    #[test]
    fn test_request_overrides() {
        let request = ExecutionRequest::new("print(1)", "python")
            .with_timeout(Duration::from_secs(1))
            .with_network(true);
        assert_eq!(request.timeout_override, Some(Duration::from_secs(1)));
        assert_eq!(request.network_enabled, Some(true));
        assert_eq!(request.memory_limit_override, None);
    }
}
