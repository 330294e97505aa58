//! Agent fleet orchestrator.
//!
//! Provisions, isolates and tears down per-user agent containers, and meters
//! each user's use of the shared LLM gateway through a credit ledger and an
//! hourly token budget.

pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
