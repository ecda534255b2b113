//! Language-model completion client.
//!
//! The pipeline talks to the model through [`CompletionModel`], a single
//! blocking call from prompt to text. [`OpenAiClient`] implements it against
//! an OpenAI-compatible `chat/completions` endpoint using `ureq`.

use std::time::Duration;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::config::LlmConfig;

/// Errors from the language-model subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("no API key configured for the language model")]
    #[diagnostic(
        code(knowtree::llm::missing_credential),
        help("Set `api_key` under [llm] in the configuration file, or export {env}.")
    )]
    MissingCredential { env: String },

    #[error("language-model request failed: {message}")]
    #[diagnostic(
        code(knowtree::llm::request_failed),
        help("Check network connectivity and the configured `base_url`.")
    )]
    RequestFailed { message: String },

    #[error("language-model endpoint returned HTTP {status}: {body}")]
    #[diagnostic(
        code(knowtree::llm::status),
        help("401 means the API key was rejected; 429 means the account is rate limited.")
    )]
    Status { status: u16, body: String },

    #[error("failed to parse language-model response: {message}")]
    #[diagnostic(
        code(knowtree::llm::parse_error),
        help("The endpoint returned an unexpected response format.")
    )]
    ParseError { message: String },
}

/// One completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    /// Output cap; `None` lets the endpoint decide.
    pub max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    /// Deterministic sampling, no output cap.
    pub fn deterministic(prompt: &'a str) -> Self {
        Self {
            prompt,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A blocking text-completion backend.
pub trait CompletionModel {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

impl<M: CompletionModel + ?Sized> CompletionModel for &M {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        (**self).complete(request)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Maximum number of body bytes quoted in a status error.
const STATUS_BODY_PREVIEW: usize = 500;

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    config: LlmConfig,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl OpenAiClient {
    /// Build a client; the credential is resolved from the config or the
    /// configured environment variable.
    pub fn new(config: LlmConfig) -> Self {
        let api_key = config.resolve_api_key();
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: LlmConfig, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            agent,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl CompletionModel for OpenAiClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let Some(ref api_key) = self.api_key else {
            return Err(LlmError::MissingCredential {
                env: self.config.api_key_env.clone(),
            });
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::Value::from(max_tokens);
        }

        tracing::debug!(
            model = %self.config.model,
            prompt_chars = request.prompt.chars().count(),
            max_tokens = ?request.max_tokens,
            "sending completion request"
        );

        let resp = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(body);

        let resp = match resp {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(LlmError::Status {
                    status,
                    body: preview(&body, STATUS_BODY_PREVIEW),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(LlmError::RequestFailed {
                    message: transport.to_string(),
                });
            }
        };

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        parse_completion(&resp_str)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("has_credential", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat-completion body.
pub(crate) fn parse_completion(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| LlmError::ParseError {
        message: e.to_string(),
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::ParseError {
            message: "response has no choices[0].message.content".into(),
        })
}

/// First `max` bytes of `text`, cut on a character boundary.
fn preview(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_without_credential_fails_before_network() {
        let client = OpenAiClient::with_api_key(LlmConfig::default(), None);
        assert!(!client.has_credential());
        let err = client
            .complete(&CompletionRequest::deterministic("hi"))
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential { ref env } if env == "OPENAI_API_KEY"));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let client = OpenAiClient::with_api_key(LlmConfig::default(), Some("  ".into()));
        assert!(!client.has_credential());
    }

    #[test]
    fn unreachable_endpoint_is_request_failure() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:1/v1".into(), // unreachable port
            timeout_secs: 2,
            ..Default::default()
        };
        let client = OpenAiClient::with_api_key(config, Some("sk-test".into()));
        let err = client
            .complete(&CompletionRequest::deterministic("hi"))
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }

    #[test]
    fn parses_first_choice_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Fotossíntese"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Fotossíntese");
    }

    #[test]
    fn empty_choices_is_parse_error() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::ParseError { .. }));
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "ção".repeat(10);
        let cut = preview(&text, 5);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 8);
    }

    #[test]
    fn debug_hides_api_key() {
        let client = OpenAiClient::with_api_key(LlmConfig::default(), Some("sk-secret".into()));
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("has_credential: true"));
    }
}
