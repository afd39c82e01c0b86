//! Three-stage fallback for extracting a structured analysis from the
//! vision model.
//!
//! Stage order, first success wins:
//! 1. structured call — one request with a declared function tool; parse
//!    the returned arguments.
//! 2. inline JSON — same reply, scan the free-text content for an
//!    embedded object.
//! 3. forced JSON — one retry asking for JSON-only output, capped to a
//!    smaller token budget.
//!
//! At most two network calls happen per analysis. Errors before the last
//! stage advance the pipeline; the last stage's failure propagates and the
//! caller is responsible for cleanup (deleting the orphaned image record).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, warn};

use super::client::{ToolSpec, VisionBackend, VisionError, VisionRequest};
use super::parse;
use super::prompt;
use super::types::{AnalysisOutcome, Stage};

pub async fn analyze_image(
    backend: &dyn VisionBackend,
    image: &[u8],
    mime_type: &str,
    max_tokens: u32,
) -> Result<AnalysisOutcome, VisionError> {
    if image.is_empty() {
        return Err(VisionError::ImageUnreadable("empty image payload".into()));
    }

    let data_url = format!("data:{};base64,{}", mime_type, BASE64.encode(image));
    let analysis_prompt = prompt::analysis_prompt();

    let structured = VisionRequest {
        prompt: analysis_prompt.clone(),
        image_data_url: data_url.clone(),
        tool: Some(ToolSpec {
            name: prompt::ANALYSIS_TOOL_NAME.to_string(),
            description: "Report the foods identified in the photo and their calorie estimates"
                .to_string(),
            parameters: prompt::analysis_tool_parameters(),
        }),
        json_only: false,
        max_tokens,
    };

    match backend.submit(&structured).await {
        Ok(reply) => {
            // stage 1: structured-call arguments
            if let Some(arguments) = &reply.tool_arguments {
                match parse::from_tool_arguments(arguments) {
                    Ok(raw) => {
                        info!(foods = raw.foods.len(), "analysis via structured call");
                        return Ok(AnalysisOutcome {
                            raw,
                            stage: Stage::StructuredCall,
                            prompt_sent: analysis_prompt,
                            response_received: arguments.clone(),
                        });
                    }
                    Err(e) => debug!(error = %e, "structured arguments unparseable"),
                }
            }
            // stage 2: embedded JSON in the same reply's free text
            if let Some(content) = &reply.content {
                match parse::extract_embedded(content) {
                    Ok(raw) => {
                        info!(foods = raw.foods.len(), "analysis via inline json");
                        return Ok(AnalysisOutcome {
                            raw,
                            stage: Stage::InlineJson,
                            prompt_sent: analysis_prompt,
                            response_received: content.clone(),
                        });
                    }
                    Err(e) => debug!(error = %e, "no usable inline json"),
                }
            }
            warn!("structured call produced no parseable result, retrying with forced json");
        }
        Err(e) => warn!(error = %e, "structured vision call failed, retrying with forced json"),
    }

    // stage 3: one retry with JSON-only output
    let json_prompt = prompt::json_only_prompt();
    let retry = VisionRequest {
        prompt: json_prompt.clone(),
        image_data_url: data_url,
        tool: None,
        json_only: true,
        max_tokens: prompt::RETRY_MAX_TOKENS,
    };
    let reply = backend.submit(&retry).await?;
    let content = reply.content.ok_or(VisionError::NoUsableAnalysis)?;
    let raw = parse::extract_embedded(&content).map_err(|e| {
        warn!(error = %e, "forced-json retry unparseable");
        VisionError::NoUsableAnalysis
    })?;

    info!(foods = raw.foods.len(), "analysis via forced-json retry");
    Ok(AnalysisOutcome {
        raw,
        stage: Stage::ForcedJson,
        prompt_sent: json_prompt,
        response_received: content,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::vision::client::VisionReply;

    /// Replays a fixed sequence of replies and records what was requested.
    struct ScriptedBackend {
        replies: Mutex<Vec<Result<VisionReply, String>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<VisionRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<VisionReply, String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        async fn submit(&self, request: &VisionRequest) -> Result<VisionReply, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            assert!(!replies.is_empty(), "backend called more times than scripted");
            replies.remove(0).map_err(VisionError::Api)
        }
    }

    const APPLE_JSON: &str = r#"{"foods":[{"name":"apple","estimated_grams":150,"calories_per_100g":52,"confidence":0.9}],"total_calories":78,"analysis_confidence":0.9}"#;

    fn tool_reply(arguments: &str) -> Result<VisionReply, String> {
        Ok(VisionReply {
            content: None,
            tool_arguments: Some(arguments.to_string()),
        })
    }

    fn text_reply(content: &str) -> Result<VisionReply, String> {
        Ok(VisionReply {
            content: Some(content.to_string()),
            tool_arguments: None,
        })
    }

    #[tokio::test]
    async fn stage1_structured_call_wins_with_one_request() {
        let backend = ScriptedBackend::new(vec![tool_reply(APPLE_JSON)]);
        let outcome = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap();
        assert_eq!(outcome.stage, Stage::StructuredCall);
        assert_eq!(outcome.raw.foods[0].name, "apple");
        assert_eq!(outcome.raw.total_calories, 78.0);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn stage2_parses_json_embedded_in_prose_without_second_call() {
        let content = format!(
            "Sure! Here is what I found:\n{}\nHope that helps.",
            r#"{"foods": [], "total_calories": 0, "analysis_confidence": 0.0}"#
        );
        let backend = ScriptedBackend::new(vec![text_reply(&content)]);
        let outcome = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap();
        assert_eq!(outcome.stage, Stage::InlineJson);
        assert!(outcome.raw.foods.is_empty());
        assert_eq!(outcome.raw.total_calories, 0.0);
        assert_eq!(outcome.raw.analysis_confidence, 0.0);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn stage3_retries_with_forced_json_after_unusable_reply() {
        let backend = ScriptedBackend::new(vec![
            text_reply("I am unable to produce the analysis you requested."),
            text_reply(APPLE_JSON),
        ]);
        let outcome = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap();
        assert_eq!(outcome.stage, Stage::ForcedJson);
        assert_eq!(outcome.raw.foods[0].estimated_grams, 150.0);
        assert_eq!(backend.calls(), 2);

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].tool.is_some());
        assert!(!requests[0].json_only);
        assert!(requests[1].tool.is_none());
        assert!(requests[1].json_only);
        assert_eq!(requests[1].max_tokens, prompt::RETRY_MAX_TOKENS);
    }

    #[tokio::test]
    async fn network_failure_on_first_call_falls_through_to_retry() {
        let backend = ScriptedBackend::new(vec![
            Err("connection refused".to_string()),
            text_reply(APPLE_JSON),
        ]);
        let outcome = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap();
        assert_eq!(outcome.stage, Stage::ForcedJson);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn all_stages_failing_propagates_no_usable_analysis() {
        let backend = ScriptedBackend::new(vec![
            tool_reply("{broken arguments"),
            text_reply("still not json"),
        ]);
        let err = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::NoUsableAnalysis));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn retry_network_failure_propagates_as_api_error() {
        let backend = ScriptedBackend::new(vec![
            Err("timeout".to_string()),
            Err("timeout".to_string()),
        ]);
        let err = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::Api(_)));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn empty_image_fails_before_any_network_call() {
        let backend = ScriptedBackend::new(vec![]);
        let err = analyze_image(&backend, b"", "image/jpeg", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::ImageUnreadable(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn bad_tool_arguments_fall_back_to_content_of_same_reply() {
        let reply = Ok(VisionReply {
            content: Some(APPLE_JSON.to_string()),
            tool_arguments: Some("{unbalanced".to_string()),
        });
        let backend = ScriptedBackend::new(vec![reply]);
        let outcome = analyze_image(&backend, b"fakejpeg", "image/jpeg", 1000)
            .await
            .unwrap();
        assert_eq!(outcome.stage, Stage::InlineJson);
        assert_eq!(backend.calls(), 1);
    }
}
