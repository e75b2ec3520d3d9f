//! Client for a local Ollama server's `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use explainer_shared::{ExplainerError, OllamaConfig, Result, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("explainer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Non-streaming Ollama text generator.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExplainerError::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    #[instrument(skip_all, fields(model = %model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, model: &str, temperature: f32) -> Result<String> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExplainerError::Generation(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExplainerError::Generation(format!(
                "{}: HTTP {status}: {}",
                self.endpoint,
                detail.trim()
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ExplainerError::Generation(format!("{}: invalid response body: {e}", self.endpoint))
        })?;
        debug!(chars = parsed.response.len(), "generation complete");
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::new(&OllamaConfig {
            base_url: format!("{}/", server.uri()),
            max_tokens: 256,
            ..OllamaConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_response_field() {
        let server = MockServer::start().await;
        let reply = json!({
            "model": "llama3.2:1b",
            "response": "{\"topic\": \"websocket\"}",
            "done": true
        });
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3.2:1b",
                "prompt": "hello",
                "stream": false,
                "options": {"num_predict": 256}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .expect(1)
            .mount(&server)
            .await;

        let out = client_for(&server)
            .generate("hello", "llama3.2:1b", 0.0)
            .await
            .unwrap();
        assert_eq!(out, r#"{"topic": "websocket"}"#);
    }

    #[tokio::test]
    async fn http_error_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("hello", "missing", 0.1)
            .await
            .unwrap_err();
        match err {
            ExplainerError::Generation(msg) => {
                assert!(msg.contains("404"));
                assert!(msg.contains("model not found"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_generation_error() {
        let client = OllamaClient::new(&OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..OllamaConfig::default()
        })
        .unwrap();
        let err = client.generate("hi", "m", 0.0).await.unwrap_err();
        assert!(matches!(err, ExplainerError::Generation(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("hi", "m", 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ExplainerError::Generation(_)));
    }
}
