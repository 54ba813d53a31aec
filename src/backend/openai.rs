use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{Completion, CompletionRequest, InferenceBackend, InferenceError, ModelEntry};

/// OpenAI-compatible backend configuration.
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub timeout: Duration,
}

/// Client for any server speaking the OpenAI completions protocol:
/// llama.cpp server, vLLM, Ollama, or hosted endpoints.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to build HTTP client with timeout, using defaults");
                Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            default_model: config.default_model,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/completions", self.base_url)
    }

    fn to_wire(&self, request: &CompletionRequest) -> CompletionsRequest {
        CompletionsRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: if request.stop.is_empty() {
                None
            } else {
                Some(request.stop.clone())
            },
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn models(&self) -> Vec<ModelEntry> {
        vec![ModelEntry {
            id: self.default_model.clone(),
            kind: "text-generation".into(),
        }]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, InferenceError> {
        let url = self.completions_url();
        let wire = self.to_wire(&request);

        debug!(model = %wire.model, "sending completion request");

        let mut http_request = self.client.post(&url).json(&wire);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status, message });
        }

        let body: CompletionsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("no choices returned".into()))?;

        let usage = body
            .usage
            .ok_or_else(|| InferenceError::InvalidResponse("missing usage accounting".into()))?;

        Ok(Completion {
            text: choice.text,
            model: body.model,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionsRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    model: String,
    choices: Vec<CompletionsChoice>,
    usage: Option<CompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionsUsage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig {
            base_url: base_url.into(),
            api_key: None,
            default_model: "m1".into(),
            timeout: Duration::from_secs(5),
        })
    }

    fn request(model: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            prompt: "hi".into(),
            model: model.map(String::from),
            max_tokens: 16,
            temperature: 0.7,
            top_p: 0.9,
            stop: vec![],
        }
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            backend("http://localhost:8080").completions_url(),
            "http://localhost:8080/v1/completions"
        );
        // trailing slash is stripped at construction
        assert_eq!(
            backend("http://localhost:8080/").completions_url(),
            "http://localhost:8080/v1/completions"
        );
    }

    #[test]
    fn test_wire_request_uses_default_model() {
        let b = backend("http://localhost:8080");
        assert_eq!(b.to_wire(&request(None)).model, "m1");
        assert_eq!(b.to_wire(&request(Some("m2"))).model, "m2");
    }

    #[test]
    fn test_wire_request_omits_empty_stop() {
        let b = backend("http://localhost:8080");
        let json = serde_json::to_string(&b.to_wire(&request(None))).unwrap();
        assert!(!json.contains("stop"));
    }

    #[test]
    fn test_parses_completions_response() {
        let body: CompletionsResponse = serde_json::from_str(
            r#"{
                "id": "cmpl-1",
                "object": "text_completion",
                "model": "m1",
                "choices": [{"text": " hello", "index": 0, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(body.model, "m1");
        assert_eq!(body.choices[0].text, " hello");
        let usage = body.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 1);
    }
}
