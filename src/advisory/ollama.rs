use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AdvisoryError, GenerateRequest, LlmClient};

/// Ollama HTTP client for the advisory model.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, AdvisoryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AdvisoryError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send_error(&self, e: reqwest::Error) -> AdvisoryError {
        if e.is_connect() {
            AdvisoryError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            AdvisoryError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            AdvisoryError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl<'a> From<&GenerateRequest<'a>> for OllamaGenerateRequest<'a> {
    fn from(request: &GenerateRequest<'a>) -> Self {
        Self {
            model: request.model,
            prompt: request.prompt,
            system: request.system,
            stream: false,
            format: request.format,
            options: request
                .temperature
                .map(|temperature| OllamaOptions { temperature }),
        }
    }
}

impl LlmClient for OllamaClient {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, AdvisoryError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest::from(request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AdvisoryError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| AdvisoryError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }

    fn list_models(&self) -> Result<Vec<String>, AdvisoryError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AdvisoryError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| AdvisoryError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// A request as seen by [`MockLlmClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub temperature: Option<f32>,
    pub format: Option<serde_json::Value>,
}

enum Scripted {
    Reply(String),
    Unreachable,
}

/// Mock LLM client for testing: replays scripted replies in order, then
/// falls back to a default reply. Every request is captured.
pub struct MockLlmClient {
    default_reply: String,
    script: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<CapturedRequest>>,
    available_models: Vec<String>,
    unreachable: bool,
}

impl MockLlmClient {
    pub fn new(default_reply: &str) -> Self {
        Self {
            default_reply: default_reply.to_string(),
            script: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
            available_models: vec!["medgemma:latest".to_string()],
            unreachable: false,
        }
    }

    /// A client whose every call fails as if the service were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new("")
        }
    }

    /// Queue a reply for the next call.
    pub fn then_reply(self, reply: &str) -> Self {
        self.script
            .borrow_mut()
            .push_back(Scripted::Reply(reply.to_string()));
        self
    }

    /// Queue a transport failure for the next call.
    pub fn then_fail(self) -> Self {
        self.script.borrow_mut().push_back(Scripted::Unreachable);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.borrow().clone()
    }

    fn unreachable_error() -> AdvisoryError {
        AdvisoryError::Connection("mock://unreachable".into())
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, AdvisoryError> {
        self.requests.borrow_mut().push(CapturedRequest {
            model: request.model.to_string(),
            prompt: request.prompt.to_string(),
            system: request.system.to_string(),
            temperature: request.temperature,
            format: request.format.cloned(),
        });

        if self.unreachable {
            return Err(Self::unreachable_error());
        }
        match self.script.borrow_mut().pop_front() {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Unreachable) => Err(Self::unreachable_error()),
            None => Ok(self.default_reply.clone()),
        }
    }

    fn list_models(&self) -> Result<Vec<String>, AdvisoryError> {
        if self.unreachable {
            return Err(Self::unreachable_error());
        }
        Ok(self.available_models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_replays_script_then_default() {
        let client = MockLlmClient::new("default").then_reply("first").then_fail();
        let request = GenerateRequest::new("medgemma", "hi", "");
        assert_eq!(client.generate(&request).unwrap(), "first");
        assert!(matches!(client.generate(&request), Err(AdvisoryError::Connection(_))));
        assert_eq!(client.generate(&request).unwrap(), "default");
        assert_eq!(client.requests().len(), 3);
    }

    #[test]
    fn unreachable_mock_always_fails() {
        let client = MockLlmClient::unreachable();
        let request = GenerateRequest::new("medgemma", "hi", "");
        assert!(client.generate(&request).is_err());
        assert!(client.generate(&request).is_err());
        assert!(client.list_models().is_err());
    }

    #[test]
    fn mock_captures_generation_parameters() {
        let schema = serde_json::json!({"type": "array"});
        let client = MockLlmClient::new("[]");
        client
            .generate(
                &GenerateRequest::new("medgemma", "prompt", "system")
                    .temperature(0.6)
                    .format(&schema),
            )
            .unwrap();
        let captured = &client.requests()[0];
        assert_eq!(captured.system, "system");
        assert_eq!(captured.temperature, Some(0.6));
        assert_eq!(captured.format.as_ref(), Some(&schema));
    }

    #[test]
    fn mock_model_availability() {
        let client = MockLlmClient::new("").with_models(vec!["llama3:8b".into()]);
        assert!(client.is_model_available("llama3").unwrap());
        assert!(!client.is_model_available("medgemma").unwrap());
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
    }

    #[test]
    fn request_body_omits_unset_options() {
        let request = GenerateRequest::new("medgemma", "prompt", "system");
        let body = serde_json::to_value(OllamaGenerateRequest::from(&request)).unwrap();
        assert_eq!(body["stream"], false);
        assert!(body.get("format").is_none());
        assert!(body.get("options").is_none());
    }

    #[test]
    fn request_body_carries_temperature_and_format() {
        let schema = serde_json::json!({"type": "array"});
        let request = GenerateRequest::new("medgemma", "prompt", "system")
            .temperature(0.5)
            .format(&schema);
        let body = serde_json::to_value(OllamaGenerateRequest::from(&request)).unwrap();
        assert_eq!(body["options"]["temperature"], 0.5);
        assert_eq!(body["format"]["type"], "array");
    }

    #[test]
    fn unreachable_server_is_a_connection_error() {
        // Port 9 (discard) is closed on test machines.
        let client = OllamaClient::new("http://127.0.0.1:9", 2).unwrap();
        let result = client.generate(&GenerateRequest::new("medgemma", "hi", ""));
        assert!(matches!(
            result,
            Err(AdvisoryError::Connection(_)) | Err(AdvisoryError::HttpClient(_))
        ));
    }
}
