//! Infrastructure layer: concrete implementations of the application ports.

pub mod docker;
pub mod gateway;
pub mod memory;
pub mod valkey;
pub mod workspace_fs;
