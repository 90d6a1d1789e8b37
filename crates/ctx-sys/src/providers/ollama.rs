//! Ollama-backed `Embedder`/`Summarizer`/`Generator`.
//!
//! Default provider per configuration (`embeddings.provider = "ollama"`).
//! Grounded on the teacher's `embed_ollama` (same endpoint, same request
//! shape) generalized to also cover `/api/generate` for summarization and
//! generation.

use std::time::Duration;

use async_trait::async_trait;
use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::providers::{Embedder, GenerateOptions, Generator, SummarizeOptions, Summarizer};

use super::{classify_status, with_backoff, RequestOutcome};

pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    embed_model: String,
    dims: usize,
    generate_model: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(
        url: String,
        embed_model: String,
        dims: usize,
        generate_model: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::provider("ollama", e.to_string()))?;
        Ok(Self {
            client,
            url,
            embed_model,
            dims,
            generate_model,
            max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    fn model_id(&self) -> &str {
        &self.embed_model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.embed_model, "input": [text] });

        with_backoff("ollama", self.max_retries, || async {
            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
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
            let embeddings = json
                .get("embeddings")
                .and_then(|e| e.as_array())
                .and_then(|a| a.first())
                .and_then(|v| v.as_array())
                .ok_or_else(|| RequestOutcome::FailFast("missing embeddings in response".to_string()))?;

            Ok(embeddings
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect())
        })
        .await
    }
}

#[async_trait]
impl Summarizer for OllamaProvider {
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
impl Generator for OllamaProvider {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String> {
        let body = serde_json::json!({
            "model": self.generate_model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": opts.temperature,
                "num_predict": opts.max_tokens,
            }
        });

        with_backoff("ollama", self.max_retries, || async {
            let resp = self
                .client
                .post(format!("{}/api/generate", self.url))
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
            json.get("response")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| RequestOutcome::FailFast("missing response field".to_string()))
        })
        .await
    }
}
