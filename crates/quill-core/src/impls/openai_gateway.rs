//! OpenAiGateway - OpenAI Responses API を呼ぶ GenerationGateway
//!
//! # フロー
//! 1. ユーザー入力から分析用プロンプトを組み立てる
//! 2. `POST {base_url}/responses` に投げる（Bearer 認証）
//! 3. `output[].content[]` の `output_text` を連結する
//! 4. `ReportDocument::from_llm_output` で構造化（フォールバック込み）
//!
//! API キーが無い場合は呼び出し時に `GenerationError::MissingCredential` を返します。
//! 起動は失敗させません（タスクが FAILED になるだけ）。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{GenerationError, ReportDocument};
use crate::ports::GenerationGateway;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Connection settings for the OpenAI gateway.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Per-request HTTP timeout. `None` waits as long as the provider does.
    pub request_timeout: Option<Duration>,
}

impl OpenAiConfig {
    /// Defaults, with the API key taken from `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok(),
            ..Self::default()
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Transport(Box::new(e))
    }
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingCredential)
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }
}

fn build_prompt(user_input: &str) -> String {
    format!(
        r#"Analyze the following text and generate a report.
You MUST return ONLY valid JSON with this exact structure:
{{
  "summary": "A brief summary of the text",
  "key_points": ["Point 1", "Point 2", "Point 3"],
  "confidence_score": 0.75
}}

Text to analyze:
{user_input}

Return ONLY the raw JSON object. Do not wrap it in markdown code fences.
Do not add any explanation, comments, or additional text. Start with {{ and end with }}."#
    )
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    /// Concatenate every `output_text` part of every message item.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[async_trait]
impl GenerationGateway for OpenAiGateway {
    async fn generate(&self, user_input: &str) -> Result<ReportDocument, GenerationError> {
        let api_key = self.api_key()?;
        let request = ResponsesRequest {
            model: &self.config.model,
            input: build_prompt(user_input),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ResponsesReply = response.json().await?;
        let raw = reply.output_text();
        debug!(model = %self.config.model, chars = raw.len(), "model output received");

        ReportDocument::from_llm_output(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_input_and_schema() {
        let prompt = build_prompt("quarterly numbers went up");
        assert!(prompt.contains("quarterly numbers went up"));
        assert!(prompt.contains("\"summary\""));
        assert!(prompt.contains("\"key_points\""));
        assert!(prompt.contains("\"confidence_score\""));
    }

    #[test]
    fn reply_text_joins_output_text_parts() {
        let reply: ResponsesReply = serde_json::from_value(serde_json::json!({
            "id": "resp_1",
            "output": [
                { "type": "reasoning", "content": [] },
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [
                        { "type": "output_text", "text": "{\"summary\":" },
                        { "type": "refusal", "refusal": "no" },
                        { "type": "output_text", "text": "\"ok\"}" }
                    ]
                }
            ]
        }))
        .unwrap();

        assert_eq!(reply.output_text(), r#"{"summary":"ok"}"#);
    }

    #[test]
    fn reply_without_output_is_empty() {
        let reply: ResponsesReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.output_text(), "");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let gateway = OpenAiGateway::new(OpenAiConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap();
        assert_eq!(gateway.endpoint(), "http://localhost:9999/v1/responses");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let gateway = OpenAiGateway::new(OpenAiConfig {
            api_key: Some("   ".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap();

        assert!(matches!(
            gateway.generate("hello").await,
            Err(GenerationError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let gateway = OpenAiGateway::new(OpenAiConfig {
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Some(Duration::from_secs(2)),
            ..OpenAiConfig::default()
        })
        .unwrap();

        assert!(matches!(
            gateway.generate("hello").await,
            Err(GenerationError::Transport(_))
        ));
    }
}
