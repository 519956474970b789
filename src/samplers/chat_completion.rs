//! Sampler for OpenAI-compatible chat completion APIs

use crate::error::{Result, SimpEvalError};
use crate::samplers::SamplerConfig;
use crate::types::{Message, MessageList, Sampler};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// One attempt's outcome, before retry classification
enum Attempt {
    Completion(String),
    /// Provider-classified invalid request, never retried
    Rejected(String),
}

/// Backoff before the attempt-th retry: 2^attempt seconds, no cap, no jitter
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
}

/// Samples from an OpenAI-compatible chat completion endpoint
pub struct ChatCompletionSampler {
    client: Client,
    config: SamplerConfig,
    api_key: String,
    endpoint: String,
}

impl ChatCompletionSampler {
    pub fn new(config: SamplerConfig, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");
        let endpoint = format!("{}/v1/chat/completions", config.url.trim_end_matches('/'));
        Self {
            client,
            config,
            api_key,
            endpoint,
        }
    }

    async fn try_once(&self, messages: &[Message]) -> Result<Attempt> {
        let request = ChatCompletionRequest {
            model: &self.config.model_name,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            return Ok(Attempt::Rejected(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimpEvalError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let body: ChatCompletionResponse = response.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SimpEvalError::ApiError("No choices in response".to_string()))?;
        Ok(Attempt::Completion(choice.message.content))
    }
}

#[async_trait]
impl Sampler for ChatCompletionSampler {
    async fn sample(&self, message_list: &MessageList) -> Result<String> {
        // System message is prepended per call; the caller's list is untouched.
        let mut messages = Vec::with_capacity(message_list.len() + 1);
        if let Some(ref system_message) = self.config.system_message {
            messages.push(Message::system(system_message));
        }
        messages.extend(message_list.iter().cloned());

        let mut attempt = 0u32;
        loop {
            match self.try_once(&messages).await {
                Ok(Attempt::Completion(text)) => return Ok(text),
                Ok(Attempt::Rejected(body)) => {
                    warn!(model = %self.config.model_name, "Bad request, degrading to empty completion: {}", body);
                    return Ok(String::new());
                }
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        return Err(SimpEvalError::MaxRetriesExceeded {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = backoff_delay(attempt);
                    warn!(
                        model = %self.config.model_name,
                        "Transient failure on attempt {}, retrying in {}s: {}",
                        attempt,
                        delay.as_secs(),
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn config(url: &str) -> SamplerConfig {
        SamplerConfig::from_arg_string(&format!("model_name=test-model,url={}", url)).unwrap()
    }

    #[test]
    fn test_backoff_doubles_without_cap() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(10), Duration::from_secs(1024));
        for n in 1..20 {
            assert!(backoff_delay(n) > backoff_delay(n - 1));
        }
    }

    #[tokio::test]
    async fn test_sample_returns_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = ChatCompletionSampler::new(config(&server.uri()), "test-token".to_string());
        let reply = sampler.sample(&vec![Message::user("hello")]).await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn test_system_message_injected_without_mutating_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": crate::samplers::DEFAULT_SYSTEM_MESSAGE},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = ChatCompletionSampler::new(config(&server.uri()), "t".to_string());
        let convo = vec![Message::user("hello")];
        sampler.sample(&convo).await.unwrap();
        assert_eq!(convo.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_degrades_to_empty_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("content refused"))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = ChatCompletionSampler::new(config(&server.uri()), "t".to_string());
        let reply = sampler.sample(&vec![Message::user("bad")]).await.unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.max_retries = 0;
        let sampler = ChatCompletionSampler::new(cfg, "t".to_string());
        let err = sampler.sample(&vec![Message::user("q")]).await.unwrap_err();
        assert!(matches!(
            err,
            SimpEvalError::MaxRetriesExceeded { attempts: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_stalled_request_fails_at_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("too late"))
                    .set_delay(Duration::from_secs(600)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.timeout_seconds = 1;
        cfg.max_retries = 0;
        let sampler = ChatCompletionSampler::new(cfg, "t".to_string());
        let err = sampler.sample(&vec![Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, SimpEvalError::MaxRetriesExceeded { .. }));
    }

    #[tokio::test]
    async fn test_retry_budget_allows_one_retry_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(2)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.max_retries = 1;
        let sampler = ChatCompletionSampler::new(cfg, "t".to_string());
        let err = sampler.sample(&vec![Message::user("q")]).await.unwrap_err();
        assert!(matches!(
            err,
            SimpEvalError::MaxRetriesExceeded { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
            .expect(1)
            .mount(&server)
            .await;

        let sampler = ChatCompletionSampler::new(config(&server.uri()), "t".to_string());
        let reply = sampler.sample(&vec![Message::user("q")]).await.unwrap();
        assert_eq!(reply, "recovered");
    }
}
