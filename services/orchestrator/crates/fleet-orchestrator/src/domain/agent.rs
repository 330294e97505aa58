//! Agent identity and deterministic resource naming.

use std::collections::HashMap;

use fleet_common::api::DEFAULT_DISPLAY_NAME;
use fleet_common::contract::{CONTAINER_PREFIX, NETWORK_PREFIX, labels};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;

/// Number of leading `agent_id` characters used in resource names.
pub const SHORT_ID_LEN: usize = 8;

/// Runtime resource names derived from an agent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub container: String,
    pub network: String,
}

/// Fresh agent identifier (UUID v4).
#[must_use]
pub fn generate_agent_id() -> String {
    Uuid::new_v4().to_string()
}

/// Use the caller's id when present, otherwise generate one.
///
/// A blank id counts as absent.
pub fn resolve_agent_id(requested: Option<&str>) -> Result<String, OrchestratorError> {
    match requested.map(str::trim).filter(|id| !id.is_empty()) {
        None => Ok(generate_agent_id()),
        Some(id) => {
            validate_agent_id(id)?;
            Ok(id.to_string())
        }
    }
}

pub fn validate_agent_id(agent_id: &str) -> Result<(), OrchestratorError> {
    fleet_common::validate_agent_id(agent_id)
        .map_err(|reason| OrchestratorError::Validation(reason.to_string()))
}

pub fn validate_user_id(user_id: &str) -> Result<(), OrchestratorError> {
    fleet_common::validate_user_id(user_id)
        .map_err(|reason| OrchestratorError::Validation(reason.to_string()))
}

/// Stable truncation: the same agent id always yields the same names, so a
/// retried provisioning call targets the resources of the first attempt.
#[must_use]
pub fn resource_names(agent_id: &str) -> ResourceNames {
    let short: String = agent_id.chars().take(SHORT_ID_LEN).collect();
    ResourceNames {
        container: format!("{CONTAINER_PREFIX}{short}"),
        network: format!("{NETWORK_PREFIX}{short}"),
    }
}

#[must_use]
pub fn resolve_display_name(requested: Option<String>) -> String {
    requested
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
}

/// Labels attached to every runtime resource owned by an agent.
#[must_use]
pub fn agent_labels(agent_id: &str, user_id: &str) -> HashMap<String, String> {
    HashMap::from([
        (labels::AGENT_ID.to_string(), agent_id.to_string()),
        (labels::USER_ID.to_string(), user_id.to_string()),
        (labels::ROLE.to_string(), "agent".to_string()),
    ])
}

/// Refuse a runtime resource found under an agent's name unless its owner
/// label is that agent.
///
/// Ids that share their first [`SHORT_ID_LEN`] characters map onto the same
/// names, so a name match alone does not prove ownership.
pub fn ensure_owned(
    resource: &str,
    owner: Option<&str>,
    agent_id: &str,
) -> Result<(), OrchestratorError> {
    match owner {
        Some(owner) if owner == agent_id => Ok(()),
        Some(owner) => Err(OrchestratorError::InvalidState(format!(
            "{resource} belongs to agent '{owner}'; agent_id '{agent_id}' needs a different \
             {SHORT_ID_LEN}-character prefix"
        ))),
        None => Err(OrchestratorError::InvalidState(format!(
            "{resource} exists but was not created for agent '{agent_id}'"
        ))),
    }
}
