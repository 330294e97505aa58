//! Domain layer: pure logic, no I/O.
//!
//! Nothing here imports from `crate::application`, `crate::infra` or
//! `crate::http`.

pub mod agent;
pub mod error;
pub mod quota;

pub use error::{GatewayError, OrchestratorError, RuntimeError, StoreError, WorkspaceError};
