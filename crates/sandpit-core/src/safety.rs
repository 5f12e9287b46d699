//! Static pre-execution code screening
//!
//! A `SafetyPolicy` decides whether code may be handed to a weaker backend
//! at all. The shipped deny-list policy is a heuristic substring scan: it
//! gates the resource-limited backend and must not be relied on as the
//! sole defense. Code it rejects is never executed; code it passes is not
//! thereby proven safe. Only the container backend provides real
//! isolation, and deployments that rely on it exclusively can select the
//! permissive policy instead.

use crate::errors::SandboxError;

pub trait SafetyPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Screen code before execution. `Err(Validation)` means the call must
    /// be rejected with zero execution attempted.
    fn screen(&self, language: &str, code: &str) -> Result<(), SandboxError>;
}

// Knowingly incomplete: the aim is to cheaply reject obviously hostile
// snippets, not to prove safety.
const PYTHON_DENY: &[&str] = &[
    "import os",
    "from os",
    "import sys",
    "from sys",
    "import subprocess",
    "from subprocess",
    "import socket",
    "from socket",
    "import shutil",
    "import ctypes",
    "import pickle",
    "import marshal",
    "__import__",
    "eval(",
    "exec(",
    "compile(",
    "open(",
    "globals()",
    "locals()",
];

const JAVASCRIPT_DENY: &[&str] = &[
    "require('child_process')",
    "require(\"child_process\")",
    "require('fs')",
    "require(\"fs\")",
    "require('net')",
    "require(\"net\")",
    "require('http')",
    "require(\"http\")",
    "process.binding",
    "eval(",
];

/// Fast substring deny-list screen. Languages without a deny list pass
/// unscreened, matching the original behavior of screening only the
/// languages it knows about.
pub struct DenyListPolicy;

impl DenyListPolicy {
    pub fn new() -> Self {
        Self
    }

    fn deny_list(language: &str) -> &'static [&'static str] {
        match language {
            "python" => PYTHON_DENY,
            "javascript" => JAVASCRIPT_DENY,
            _ => &[],
        }
    }
}

impl Default for DenyListPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyPolicy for DenyListPolicy {
    fn name(&self) -> &str {
        "deny_list"
    }

    fn screen(&self, language: &str, code: &str) -> Result<(), SandboxError> {
        for needle in Self::deny_list(language) {
            if code.contains(needle) {
                log::warn!(
                    "security screen rejected {} code containing {:?}",
                    language,
                    needle
                );
                return Err(SandboxError::Validation(format!(
                    "disallowed construct: {}",
                    needle
                )));
            }
        }
        Ok(())
    }
}

/// No screening at all: defer entirely to the isolation strength of the
/// executing backend.
pub struct PermissivePolicy;

impl PermissivePolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PermissivePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyPolicy for PermissivePolicy {
    fn name(&self) -> &str {
        "permissive"
    }

    fn screen(&self, _language: &str, _code: &str) -> Result<(), SandboxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_deny_list_rejects_os_import() {
        let policy = DenyListPolicy::new();
        let err = policy
            .screen("python", "import os\nos.system('ls')")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("import os"));
    }

    #[test]
    fn test_deny_list_rejects_dynamic_eval() {
        let policy = DenyListPolicy::new();
        assert!(policy.screen("python", "eval('1+1')").is_err());
        assert!(policy.screen("javascript", "eval('1+1')").is_err());
    }

    #[test]
    fn test_deny_list_passes_benign_code() {
        let policy = DenyListPolicy::new();
        let code = "import math\nprint(math.sqrt(16))";
        assert!(policy.screen("python", code).is_ok());
    }

    #[test]
    fn test_deny_list_ignores_unknown_languages() {
        let policy = DenyListPolicy::new();
        assert!(policy.screen("shell", "rm -rf /").is_ok());
    }

    #[test]
    fn test_permissive_passes_everything() {
        let policy = PermissivePolicy::new();
        assert!(policy.screen("python", "import os").is_ok());
        assert_eq!(policy.name(), "permissive");
    }
}
