//! Sandboxed code execution with selectable isolation strength.
//!
//! A caller submits source code plus a target language and receives back
//! captured output, exit status, and timing, with the guarantee that the
//! code cannot damage the host, read unrelated data, or run unbounded.
//! Three isolation backends of increasing strength sit behind a single
//! execution contract:
//!
//! - **Process**: an isolated child process with a wall-clock timeout.
//! - **Resource-limited**: adds a static security screen and rlimit
//!   ceilings on memory, CPU time, and open files.
//! - **Container**: an ephemeral, network-disabled, non-root Docker
//!   container with a read-only workspace mount, the only backend with a
//!   strong isolation guarantee.
//!
//! The [`SandboxManager`] facade routes requests to a named backend,
//! compares all backends on the same input, and reports which backends are
//! currently usable. Every per-call failure is folded into the returned
//! [`ExecutionResult`]; backends never leak processes, temp files, or
//! containers, on any exit path.

pub mod backends;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod languages;
pub mod manager;
pub mod safety;

pub use backends::{ContainerSandbox, IsolationBackend, ProcessSandbox, ResourceLimitedSandbox};
pub use config::{parse_memory_size, SandboxConfig};
pub use core_types::{BackendAvailability, BackendInfo, ExecutionRequest, ExecutionResult};
pub use errors::{ErrorInfo, ErrorKind, SandboxError};
pub use languages::{LanguageProfile, LanguageRegistry};
pub use manager::SandboxManager;
pub use safety::{DenyListPolicy, PermissivePolicy, SafetyPolicy};
