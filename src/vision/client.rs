//! Transport for the vision model.
//!
//! `VisionBackend` is the narrow seam the analysis pipeline talks
//! through; `OpenAiVision` is the real OpenAI-compatible implementation.
//! Tests substitute a scripted fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::OpenAiConfig;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("image unreadable: {0}")]
    ImageUnreadable(String),
    #[error("vision api call failed: {0}")]
    Api(String),
    #[error("vision api returned no usable analysis")]
    NoUsableAnalysis,
}

/// A declared function tool constraining the model's output shape.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One request to the vision model.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image_data_url: String,
    pub tool: Option<ToolSpec>,
    /// When set, ask for a JSON-only response (`response_format` json_object).
    pub json_only: bool,
    pub max_tokens: u32,
}

/// The model's reply: free-text content and/or structured-call arguments.
#[derive(Debug, Clone, Default)]
pub struct VisionReply {
    pub content: Option<String>,
    pub tool_arguments: Option<String>,
}

#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn submit(&self, request: &VisionRequest) -> Result<VisionReply, VisionError>;
}

// --- OpenAI-compatible wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    #[allow(dead_code)]
    name: String,
    arguments: String,
}

pub struct OpenAiVision {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiVision {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_body<'a>(&'a self, request: &'a VisionRequest) -> ApiRequest<'a> {
        let user_content = json!([
            { "type": "text", "text": request.prompt },
            { "type": "image_url", "image_url": { "url": request.image_data_url } }
        ]);

        let tools = request.tool.as_ref().map(|tool| {
            vec![json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })]
        });
        let tool_choice = request.tool.as_ref().map(|tool| {
            json!({ "type": "function", "function": { "name": tool.name } })
        });
        let response_format = request
            .json_only
            .then(|| json!({ "type": "json_object" }));

        ApiRequest {
            model: &self.config.model,
            messages: vec![ApiMessage {
                role: "user",
                content: user_content,
            }],
            max_tokens: request.max_tokens,
            temperature: 0.1,
            tools,
            tool_choice,
            response_format,
        }
    }
}

#[async_trait]
impl VisionBackend for OpenAiVision {
    async fn submit(&self, request: &VisionRequest) -> Result<VisionReply, VisionError> {
        let body = self.build_body(request);
        // Only sizes here; the encoded payload itself is never logged.
        debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            image_len = request.image_data_url.len(),
            tool = request.tool.is_some(),
            json_only = request.json_only,
            "vision request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "vision api send failed");
                VisionError::Api(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VisionError::Api(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            error!(%status, body = %text.chars().take(200).collect::<String>(), "vision api error");
            return Err(VisionError::Api(format!("status {status}")));
        }

        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| VisionError::Api(format!("unparseable api response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::Api("api returned no choices".into()))?;

        let tool_arguments = choice
            .message
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|call| call.function.arguments);

        debug!(
            content_len = choice.message.content.as_ref().map(String::len),
            has_tool_call = tool_arguments.is_some(),
            "vision reply"
        );

        Ok(VisionReply {
            content: choice.message.content,
            tool_arguments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: "test".into(),
            base_url: "https://api.openai.com/v1/".into(),
            model: "gpt-4o".into(),
            max_tokens: 1000,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let vision = OpenAiVision::new(test_config()).unwrap();
        assert_eq!(vision.api_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn structured_request_declares_tool_and_forces_choice() {
        let vision = OpenAiVision::new(test_config()).unwrap();
        let request = VisionRequest {
            prompt: "analyze".into(),
            image_data_url: "data:image/jpeg;base64,AAAA".into(),
            tool: Some(ToolSpec {
                name: "report_food_analysis".into(),
                description: "report".into(),
                parameters: json!({"type": "object"}),
            }),
            json_only: false,
            max_tokens: 1000,
        };
        let body = serde_json::to_value(vision.build_body(&request)).unwrap();
        assert_eq!(body["tools"][0]["function"]["name"], "report_food_analysis");
        assert_eq!(
            body["tool_choice"]["function"]["name"],
            "report_food_analysis"
        );
        assert!(body.get("response_format").is_none());
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn json_only_request_sets_response_format_without_tools() {
        let vision = OpenAiVision::new(test_config()).unwrap();
        let request = VisionRequest {
            prompt: "analyze".into(),
            image_data_url: "data:image/png;base64,BBBB".into(),
            tool: None,
            json_only: true,
            max_tokens: 800,
        };
        let body = serde_json::to_value(vision.build_body(&request)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("tools").is_none());
        assert_eq!(body["max_tokens"], 800);
    }

    #[test]
    fn response_with_tool_call_deserializes() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "report_food_analysis", "arguments": "{\"foods\":[]}"}
                    }]
                }
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let call = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(call[0].function.arguments, "{\"foods\":[]}");
    }
}
