//! OpenAI-backed `Embedder`/`Summarizer`/`Generator`.
//!
//! Grounded on the teacher's `embed_openai` (`POST /v1/embeddings`, bearer
//! auth, same retry/backoff), generalized to also cover chat completions
//! for summarization and generation.

use std::time::Duration;

use async_trait::async_trait;
use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::providers::{Embedder, GenerateOptions, Generator, SummarizeOptions, Summarizer};

use super::{classify_status, with_backoff, RequestOutcome};

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    embed_model: String,
    dims: usize,
    chat_model: String,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        embed_model: String,
        dims: usize,
        chat_model: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::provider("openai", e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            embed_model,
            dims,
            chat_model,
            max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.embed_model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.embed_model, "input": text });

        with_backoff("openai", self.max_retries, || async {
            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match resp {
                Ok(r) => r,
                Err(e) => return Err(RequestOutcome::Retryable(e.to_string())),
            };
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_status(status, text));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RequestOutcome::FailFast(e.to_string()))?;
            let embedding = json
                .get("data")
                .and_then(|d| d.as_array())
                .and_then(|a| a.first())
                .and_then(|item| item.get("embedding"))
                .and_then(|e| e.as_array())
                .ok_or_else(|| RequestOutcome::FailFast("missing embedding in response".to_string()))?;

            Ok(embedding.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
        })
        .await
    }
}

#[async_trait]
impl Summarizer for OpenAiProvider {
    async fn summarize(&self, text: &str, opts: &SummarizeOptions) -> Result<String> {
        let style = opts.style.as_deref().unwrap_or("concise");
        let prompt = format!(
            "Summarize the following in a {style} style, at most {} tokens:\n\n{text}",
            opts.max_tokens
        );
        self.generate(&prompt, &GenerateOptions { max_tokens: opts.max_tokens, temperature: 0.2 })
            .await
    }
}

#[async_trait]
impl Generator for OpenAiProvider {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String> {
        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": opts.max_tokens,
            "temperature": opts.temperature,
        });

        with_backoff("openai", self.max_retries, || async {
            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match resp {
                Ok(r) => r,
                Err(e) => return Err(RequestOutcome::Retryable(e.to_string())),
            };
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_status(status, text));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RequestOutcome::FailFast(e.to_string()))?;
            json.get("choices")
                .and_then(|c| c.as_array())
                .and_then(|a| a.first())
                .and_then(|choice| choice.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| RequestOutcome::FailFast("missing message content".to_string()))
        })
        .await
    }
}
