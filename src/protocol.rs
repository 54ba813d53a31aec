use serde::{Deserialize, Serialize};

/// Error response returned by the API.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response to register and login; the plaintext API key appears only here.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub api_key: String,
}

fn default_max_tokens() -> i64 {
    256
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

/// Generation request body. Numeric fields are range-checked by the
/// generation service, not during deserialization.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

/// Token accounting attached to a generation response.
#[derive(Debug, Serialize)]
pub struct GenerateUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
}

/// Successful generation response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub usage: GenerateUsage,
    pub response_time_ms: i64,
}

/// One entry in the model listing.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Model listing response.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_defaults() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(req.prompt, "hi");
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.temperature, 0.7);
        assert_eq!(req.top_p, 0.9);
        assert!(req.model.is_none());
        assert!(req.stop_sequences.is_empty());
    }

    #[test]
    fn test_generate_request_full_body() {
        let req: GenerateRequest = serde_json::from_str(
            r#"{
                "prompt": "write a haiku",
                "max_tokens": 64,
                "temperature": 1.2,
                "top_p": 0.5,
                "model": "m1",
                "stop_sequences": ["\n\n"]
            }"#,
        )
        .unwrap();
        assert_eq!(req.max_tokens, 64);
        assert_eq!(req.temperature, 1.2);
        assert_eq!(req.model.as_deref(), Some("m1"));
        assert_eq!(req.stop_sequences, vec!["\n\n"]);
    }

    #[test]
    fn test_generate_request_rejects_missing_prompt() {
        let result = serde_json::from_str::<GenerateRequest>(r#"{"max_tokens": 10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_response_shape() {
        let resp = GenerateResponse {
            text: "hello".into(),
            model: "m1".into(),
            provider: "openai".into(),
            usage: GenerateUsage {
                input_tokens: 3,
                output_tokens: 1,
                total_tokens: 4,
                cost: 0.002,
            },
            response_time_ms: 12,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""text":"hello""#));
        assert!(json.contains(r#""total_tokens":4"#));
        // timing rides on the response body, next to the nested usage block
        assert!(json.contains(r#""response_time_ms":12"#));
    }

    #[test]
    fn test_model_info_type_field_name() {
        let info = ModelInfo {
            id: "m1".into(),
            provider: "openai".into(),
            kind: "text-generation".into(),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains(r#""type":"text-generation""#));
    }
}
