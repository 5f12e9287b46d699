//! Manager facade routing execution requests to isolation backends
//!
//! Holds zero or more backends and routes a request to the one named by
//! the caller, or to all of them for comparison. Selecting an unknown or
//! unavailable backend yields a `BackendUnavailable` result rather than an
//! error, so callers iterating over every backend never crash the whole
//! comparison because one is down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{
    container, process, resource_limited, ContainerSandbox, IsolationBackend, ProcessSandbox,
    ResourceLimitedSandbox,
};
use crate::config::SandboxConfig;
use crate::core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};
use crate::errors::SandboxError;
use crate::languages::LanguageRegistry;
use crate::safety::{DenyListPolicy, PermissivePolicy, SafetyPolicy};

pub struct SandboxManager {
    backends: HashMap<String, Arc<dyn IsolationBackend>>,
}

impl SandboxManager {
    /// Build the standard backend set from one shared language table and
    /// configuration. The container backend is registered only when an
    /// engine client can be constructed; a warning is logged otherwise and
    /// `availability` reports it absent.
    pub fn new(languages: LanguageRegistry, config: SandboxConfig) -> Self {
        let languages = Arc::new(languages);
        let mut backends: HashMap<String, Arc<dyn IsolationBackend>> = HashMap::new();

        let process_backend =
            ProcessSandbox::new(Arc::clone(&languages), config.clone());
        backends.insert(process::BACKEND_NAME.to_string(), Arc::new(process_backend));

        let policy: Arc<dyn SafetyPolicy> = if config.security_screen_enabled {
            Arc::new(DenyListPolicy::new())
        } else {
            Arc::new(PermissivePolicy::new())
        };
        let resource_backend =
            ResourceLimitedSandbox::new(Arc::clone(&languages), config.clone(), policy);
        backends.insert(
            resource_limited::BACKEND_NAME.to_string(),
            Arc::new(resource_backend),
        );

        match ContainerSandbox::new(Arc::clone(&languages), config) {
            Ok(container_backend) => {
                backends.insert(
                    container::BACKEND_NAME.to_string(),
                    Arc::new(container_backend),
                );
            }
            Err(e) => log::warn!("container backend not registered: {}", e),
        }

        Self { backends }
    }

    /// Assemble a manager from explicit backend instances, mainly for
    /// tests and non-standard deployments.
    pub fn with_backends(backend_list: Vec<Arc<dyn IsolationBackend>>) -> Self {
        let backends = backend_list
            .into_iter()
            .map(|b| (b.name().to_string(), b))
            .collect();
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute(
        &self,
        code: &str,
        language: &str,
        backend: &str,
    ) -> ExecutionResult {
        self.execute_request(ExecutionRequest::new(code, language), backend)
            .await
    }

    pub async fn execute_request(
        &self,
        request: ExecutionRequest,
        backend: &str,
    ) -> ExecutionResult {
        match self.backends.get(backend) {
            Some(selected) => selected.execute(&request).await,
            None => {
                let err = SandboxError::BackendUnavailable(backend.to_string());
                ExecutionResult::failure(backend, &err, Duration::ZERO)
            }
        }
    }

    /// Run the same code on every registered backend and collect the
    /// per-backend results.
    pub async fn compare(&self, code: &str, language: &str) -> HashMap<String, ExecutionResult> {
        let mut results = HashMap::new();
        for (name, backend) in &self.backends {
            let request = ExecutionRequest::new(code, language);
            results.insert(name.clone(), backend.execute(&request).await);
        }
        results
    }

    pub async fn availability(&self) -> HashMap<String, BackendAvailability> {
        let mut report = HashMap::new();
        for (name, backend) in &self.backends {
            report.insert(name.clone(), backend.availability().await);
        }
        report
    }

    pub fn info(&self, backend: &str) -> Option<BackendInfo> {
        self.backends.get(backend).map(|b| b.info())
    }
}
