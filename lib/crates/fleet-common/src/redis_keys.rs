/// Key prefixes for orchestrator state in Valkey
pub mod keys {
    /// Agent registry records
    /// Format: fleet:agent:{agent_id}
    /// Value: hash (agent_id, user_id, display_name, container_id,
    ///        container_name, network_id, network_name, status, created_at)
    /// TTL: None (records outlive deprovisioning)
    pub const AGENT: &str = "fleet:agent";

    /// Cached credit balance per user
    /// Format: fleet:credits:{user_id}
    /// Value: integer cents (may be negative)
    /// TTL: None (overwritten by sync from the billing store)
    pub const CREDITS: &str = "fleet:credits";

    /// Hourly token window per user
    /// Format: fleet:rate:{user_id}:hourly
    /// Value: integer token count
    /// TTL: RATE_WINDOW_SECS, refreshed on every allowed increment
    pub const RATE: &str = "fleet:rate";
}

/// TTL constants
pub mod ttl {
    /// Token window lifetime (1 hour)
    pub const RATE_WINDOW_SECS: u64 = 3600;
}

/// Maximum accepted length of a user identifier.
pub const MAX_USER_ID_LEN: usize = 128;

/// Caller-supplied agent ids must be at least this long so the derived
/// resource names (first 8 chars) are fully populated.
pub const MIN_AGENT_ID_LEN: usize = 8;

/// Upper bound for caller-supplied agent ids.
pub const MAX_AGENT_ID_LEN: usize = 64;

pub fn agent_key(agent_id: &str) -> String {
    format!("{}:{}", keys::AGENT, agent_id)
}

pub fn credits_key(user_id: &str) -> String {
    format!("{}:{}", keys::CREDITS, user_id)
}

pub fn rate_key(user_id: &str) -> String {
    format!("{}:{}:hourly", keys::RATE, user_id)
}

/// Validate an agent id before it is used in a key or a resource name.
/// Accepts 8–64 chars of `[A-Za-z0-9_-]` (UUIDs included).
pub fn validate_agent_id(agent_id: &str) -> Result<(), &'static str> {
    if agent_id.len() < MIN_AGENT_ID_LEN {
        return Err("agent_id must be at least 8 characters");
    }
    if agent_id.len() > MAX_AGENT_ID_LEN {
        return Err("agent_id must be at most 64 characters");
    }
    if !agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("agent_id may only contain [A-Za-z0-9_-]");
    }
    Ok(())
}

/// Validate a user id before it is used in a key.
/// SECURITY: ':' is the key separator, so it is rejected to keep one user's
/// keys from aliasing another's.
pub fn validate_user_id(user_id: &str) -> Result<(), &'static str> {
    if user_id.is_empty() {
        return Err("user_id required");
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err("user_id must be at most 128 characters");
    }
    if user_id
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == ':')
    {
        return Err("user_id must not contain whitespace, control characters or ':'");
    }
    Ok(())
}
