pub mod api;
pub mod contract;
pub mod redis_keys;
pub mod types;

pub use redis_keys::{
    agent_key, credits_key, keys, rate_key, ttl, validate_agent_id, validate_user_id,
};
pub use types::*;
