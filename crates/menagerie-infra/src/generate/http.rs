//! HTTP reply generator adapter.
//!
//! Talks to the reply generator service over a small JSON API: the
//! compiled system prompt plus windowed history goes out, reply text and
//! usage come back. The engine applies its own timeout around `generate`;
//! this client only sets a connect timeout.

use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use menagerie_core::generate::ReplyGenerator;
use menagerie_types::config::GeneratorConfig;
use menagerie_types::conversation::TurnRole;
use menagerie_types::generate::{GenerateError, ReplyOutput, ReplyRequest};

/// HTTP-backed implementation of `ReplyGenerator`.
pub struct HttpReplyGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: Option<SecretString>,
}

impl HttpReplyGenerator {
    /// Build a generator from config. The API key comes from the
    /// `MENAGERIE_GENERATOR_KEY` environment variable when present.
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| GenerateError::Provider(e.to_string()))?;

        let api_key = std::env::var("MENAGERIE_GENERATOR_KEY")
            .ok()
            .map(SecretString::from);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: String,
    model: String,
    usage: WireUsage,
}

fn role_str(role: &TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    }
}

impl ReplyGenerator for HttpReplyGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<ReplyOutput, GenerateError> {
        let mut messages: Vec<WireMessage<'_>> = request
            .history
            .iter()
            .map(|m| WireMessage {
                role: role_str(&m.role),
                content: &m.content,
            })
            .collect();
        messages.push(WireMessage {
            role: "user",
            content: &request.message,
        });

        let body = WireRequest {
            model: &self.model,
            system: &request.system_prompt,
            messages,
            max_tokens: self.max_tokens,
        };

        let mut http_request = self
            .client
            .post(format!("{}/v1/replies", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key.expose_secret());
        }

        let started = Instant::now();
        let response = http_request
            .send()
            .await
            .map_err(|e| GenerateError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GenerateError::AuthenticationFailed);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerateError::Provider(format!("{status}: {detail}")));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Deserialization(e.to_string()))?;
        let processing_ms = started.elapsed().as_millis() as u64;

        Ok(ReplyOutput {
            content: wire.content,
            model: wire.model,
            input_tokens: wire.usage.input_tokens,
            output_tokens: wire.usage.output_tokens,
            processing_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use menagerie_types::generate::HistoryMessage;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let generator = HttpReplyGenerator::new(&GeneratorConfig {
            base_url: "http://localhost:8089/".to_string(),
            model: "ambassador-large".to_string(),
            max_tokens: 1024,
        })
        .unwrap();
        assert_eq!(generator.base_url, "http://localhost:8089");
        assert_eq!(generator.name(), "http");
    }

    #[test]
    fn test_wire_request_shape() {
        let request = ReplyRequest {
            system_prompt: "<personality>warm</personality>".to_string(),
            history: vec![HistoryMessage {
                role: TurnRole::Assistant,
                content: "Hi, I'm Bella!".to_string(),
            }],
            message: "Tell me about quills".to_string(),
        };

        let mut messages: Vec<WireMessage<'_>> = request
            .history
            .iter()
            .map(|m| WireMessage {
                role: role_str(&m.role),
                content: &m.content,
            })
            .collect();
        messages.push(WireMessage {
            role: "user",
            content: &request.message,
        });
        let body = WireRequest {
            model: "ambassador-large",
            system: &request.system_prompt,
            messages,
            max_tokens: 1024,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Tell me about quills");
        assert_eq!(json["max_tokens"], 1024);
    }

    #[test]
    fn test_wire_response_parses_usage() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"content":"Quills are modified hairs!","model":"ambassador-large","usage":{"input_tokens":120,"output_tokens":35}}"#,
        )
        .unwrap();
        assert_eq!(wire.usage.input_tokens, 120);
        assert_eq!(wire.usage.output_tokens, 35);
        assert_eq!(wire.content, "Quills are modified hairs!");
    }
}
