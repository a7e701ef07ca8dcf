use std::time::Duration;

use jobhunter_core::error::AppError;
use jobhunter_core::traits::Generator;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Gemini's OpenAI compatibility endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_SYSTEM_PROMPT: &str = "You classify job postings. Answer only with the JSON array requested by the user.";

/// OpenAI-compatible chat-completions client used as the classifier's generator.
///
/// Works with any OpenAI-compatible API, including:
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
/// - OpenAI directly (`https://api.openai.com/v1`)
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    system_prompt: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let system_prompt = self.system_prompt.clone();
        Ok(Self::build(&self.api_key, &self.model, &self.base_url, timeout)?
            .with_system_prompt(system_prompt))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("LLM API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        }
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a non-success HTTP status and body to an error.
fn status_error(status_code: u16, body: &str) -> AppError {
    if status_code == 429 {
        return AppError::RateLimitExceeded;
    }
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));
    AppError::LlmError {
        message,
        status_code,
    }
}

/// Text of the first choice. A missing choice or content is an empty answer,
/// which the classifier treats as a skipped batch.
fn response_text(body: &str) -> Result<String, AppError> {
    let chat_response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {}", e)))?;

    Ok(chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending prompt");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read LLM response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let text = response_text(&body)?;
        tracing::debug!(response_len = text.len(), "Received response");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_system_and_user_messages() {
        let generator = OpenAiGenerator::new("key", DEFAULT_MODEL)
            .unwrap()
            .with_system_prompt("Be terse.");
        let json = serde_json::to_value(generator.request("Jobs to analyze")).unwrap();

        assert_eq!(json["model"], "gemini-2.5-flash");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Be terse.");
        assert_eq!(json["messages"][1]["content"], "Jobs to analyze");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let generator = OpenAiGenerator::with_base_url("key", "gpt-4o-mini", "https://api.openai.com/v1/").unwrap();
        assert_eq!(generator.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_with_timeout_keeps_settings() {
        let generator = OpenAiGenerator::with_base_url("key", "gpt-4o-mini", "https://api.openai.com/v1")
            .unwrap()
            .with_system_prompt("Be terse.")
            .with_timeout(Duration::from_secs(30))
            .unwrap();
        assert_eq!(generator.timeout_secs, 30);
        assert_eq!(generator.model(), "gpt-4o-mini");
        assert_eq!(generator.base_url, "https://api.openai.com/v1");
        assert_eq!(generator.system_prompt, "Be terse.");
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(matches!(
            OpenAiGenerator::new("  ", DEFAULT_MODEL),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_response_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[{\"id\":\"0\"}]"}}]}"#;
        assert_eq!(response_text(body).unwrap(), r#"[{"id":"0"}]"#);
    }

    #[test]
    fn test_missing_content_is_empty_text() {
        assert_eq!(response_text(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(), "");
        assert_eq!(response_text(r#"{"choices":[]}"#).unwrap(), "");
        assert!(response_text("<html>").is_err());
    }

    #[test]
    fn test_status_errors() {
        assert!(matches!(status_error(429, ""), AppError::RateLimitExceeded));

        match status_error(400, r#"{"error":{"message":"API key not valid"}}"#) {
            AppError::LlmError {
                message,
                status_code,
            } => {
                assert_eq!(status_code, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = status_error(503, "upstream down");
        assert!(err.to_string().contains("HTTP 503: upstream down"));
    }
}
