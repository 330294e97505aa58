//! Application services: one module per use case.

pub mod bridge;
pub mod credits;
pub mod gateway;
pub mod health;
pub mod lifecycle;
pub mod provision;
pub mod rate_limit;
pub mod usage;
