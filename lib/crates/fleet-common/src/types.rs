use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status recorded in the agent registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Paused,
    Stopped,
}

impl AgentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// `stopped` is terminal: the agent's resources are gone and its id is
    /// never provisioned again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            other => Err(RecordError::InvalidStatus(other.to_string())),
        }
    }
}

/// Live state of a container as reported by the container runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// The runtime has no such container.
    NotFound,
    Unknown,
}

impl RuntimeState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when decoding a stored agent record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("agent record is missing field '{0}'")]
    MissingField(&'static str),

    #[error("unknown agent status '{0}'")]
    InvalidStatus(String),

    #[error("invalid created_at timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Registry entry for one agent.
///
/// `container_*` and `network_*` are written once, when provisioning
/// completes; lifecycle operations only ever touch `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRecord {
    pub agent_id: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    pub container_id: String,
    pub container_name: String,
    #[serde(default)]
    pub network_id: String,
    pub network_name: String,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Flatten the record into hash fields.
    #[must_use]
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("agent_id", self.agent_id.clone()),
            ("user_id", self.user_id.clone()),
            ("display_name", self.display_name.clone()),
            ("container_id", self.container_id.clone()),
            ("container_name", self.container_name.clone()),
            ("network_id", self.network_id.clone()),
            ("network_name", self.network_name.clone()),
            ("status", self.status.as_str().to_string()),
            ("created_at", self.created_at.to_rfc3339()),
        ]
    }

    /// Rebuild a record from hash fields. `display_name` and `network_id`
    /// default to empty for records written before they existed.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, RecordError> {
        let required = |name: &'static str| {
            fields
                .get(name)
                .cloned()
                .ok_or(RecordError::MissingField(name))
        };
        let optional = |name: &str| fields.get(name).cloned().unwrap_or_default();

        let created_raw = required("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map_err(|_| RecordError::InvalidTimestamp(created_raw.clone()))?
            .with_timezone(&Utc);

        Ok(Self {
            agent_id: required("agent_id")?,
            user_id: required("user_id")?,
            display_name: optional("display_name"),
            container_id: required("container_id")?,
            container_name: required("container_name")?,
            network_id: optional("network_id"),
            network_name: required("network_name")?,
            status: required("status")?.parse()?,
            created_at,
        })
    }
}

/// Configuration snapshot written into each agent workspace.
///
/// The field names are read by the agent runtime image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    pub agent_id: String,
    pub user_id: String,
    pub display_name: String,
    #[serde(rename = "litellm_base_url")]
    pub gateway_base_url: String,
    pub created_at: DateTime<Utc>,
}
