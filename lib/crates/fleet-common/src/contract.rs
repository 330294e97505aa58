//! Contract with the agent runtime image: where the workspace is mounted,
//! which files it contains, and which environment variables are injected.

/// Mount point of the workspace inside the agent container.
pub const AGENT_MOUNT: &str = "/agent";

/// Behavior specification document inside the workspace.
pub const BEHAVIOR_SPEC_FILE: &str = "SOUL.md";

/// Configuration snapshot inside the workspace.
pub const CONFIG_SNAPSHOT_FILE: &str = "config.json";

/// Prefix of the deterministic container name.
pub const CONTAINER_PREFIX: &str = "agent_";

/// Prefix of the deterministic per-agent network name.
pub const NETWORK_PREFIX: &str = "agent_net_";

/// Environment variables injected into the agent container.
pub mod env {
    pub const AGENT_ID: &str = "AGENT_ID";
    pub const USER_ID: &str = "USER_ID";
    pub const GATEWAY_BASE_URL: &str = "LITELLM_BASE_URL";
    pub const GATEWAY_API_KEY: &str = "LITELLM_API_KEY";
    /// Same scoped credential, under the name the assistant process reads.
    pub const ASSISTANT_API_KEY: &str = "ANTHROPIC_API_KEY";
}

/// Labels attached to runtime resources created by the orchestrator.
pub mod labels {
    pub const AGENT_ID: &str = "fleet.agent_id";
    pub const USER_ID: &str = "fleet.user_id";
    pub const ROLE: &str = "fleet.role";
}

/// Peripheral messaging bridge.
pub mod bridge {
    pub const CONTAINER_NAME: &str = "messaging-bridge";
    pub const SESSIONS_MOUNT: &str = "/app/.wwebjs_auth";
    pub const PORT_ENV: &str = "PORT";
}
