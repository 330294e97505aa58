//! LLM gateway client (LiteLLM-compatible admin and chat endpoints).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fleet_common::api::SmokeTestResponse;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::LlmGateway;
use crate::domain::GatewayError;

const SMOKE_TEST_MAX_TOKENS: u32 = 150;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub master_key: String,
    pub timeout: Duration,
    /// Models an issued key may call.
    pub models: Vec<String>,
}

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    master_key: String,
    models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build gateway HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            master_key: settings.master_key,
            models: settings.models,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.master_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl LlmGateway for HttpGateway {
    async fn issue_key(&self, user_id: &str, max_budget: f64) -> Result<String, GatewayError> {
        let body = json!({
            "user_id": user_id,
            "max_budget": max_budget,
            "budget_duration": "monthly",
            "models": self.models,
            "metadata": {
                "created_by": "fleet-orchestrator",
                "created_at": Utc::now().to_rfc3339(),
            },
        });
        let response = self.post("/key/generate", &body).await?;
        let parsed: KeyResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(parsed.key)
    }

    async fn smoke_test(
        &self,
        message: &str,
        model: &str,
    ) -> Result<SmokeTestResponse, GatewayError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": message }],
            "max_tokens": SMOKE_TEST_MAX_TOKENS,
        });
        let response = self.post("/chat/completions", &body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        // A reply without choices or content still proves the gateway answered.
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(SmokeTestResponse {
            model: model.to_string(),
            response: content,
            usage: parsed.usage,
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
