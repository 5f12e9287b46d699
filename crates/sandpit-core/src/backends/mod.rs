//! Isolation backends for sandboxed code execution
//!
//! Three strategies of increasing strength sit behind one contract: a bare
//! process sandbox, a resource- and security-checked sandbox, and a full
//! container sandbox. The manager treats them polymorphically through
//! [`IsolationBackend`]; new backends can be added without touching call
//! sites.

use async_trait::async_trait;

use crate::core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};

#[async_trait]
pub trait IsolationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Execute one request. Never returns `Err`: every failure mode is
    /// folded into the result, and every resource acquired during the call
    /// is released before it returns.
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult;

    /// Probe whether this backend can currently execute anything.
    async fn availability(&self) -> BackendAvailability;

    /// Static configuration summary for status displays.
    fn info(&self) -> BackendInfo;
}

pub mod container;
pub mod process;
pub mod resource_limited;

pub use container::ContainerSandbox;
pub use process::ProcessSandbox;
pub use resource_limited::ResourceLimitedSandbox;
