//! Application layer: use cases orchestrated over port traits.
//!
//! Imports only from `crate::domain` and `fleet_common`; all I/O goes through
//! the traits in [`ports`].

pub mod ports;
pub mod services;
