//! Concrete `Embedder`/`Summarizer`/`Generator` implementations.
//!
//! Grounded on the teacher's `embedding::{OllamaProvider, OpenAIProvider}`
//! (same retry/backoff loop, same status-code branching), generalized from
//! an embeddings-only trait to the three provider capabilities
//! `ctx-sys-core::providers` defines.

pub mod ollama;
pub mod openai;

use std::time::Duration;

use ctx_sys_core::error::Error;

/// Shared retry loop: HTTP 429/5xx and network errors retry with
/// exponential backoff (1s, 2s, 4s, ... capped at 2^5); any other 4xx
/// fails immediately. Mirrors the teacher's `embed_openai`/`embed_ollama`
/// loop, generalized over the request closure so all three provider
/// capabilities can share it.
pub(crate) async fn with_backoff<T, F, Fut>(
    capability: &'static str,
    max_retries: u32,
    mut request: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RequestOutcome>>,
{
    let mut last_message = String::from("request failed after retries");

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match request().await {
            Ok(value) => return Ok(value),
            Err(RequestOutcome::Retryable(message)) => {
                last_message = message;
                continue;
            }
            Err(RequestOutcome::FailFast(message)) => {
                return Err(Error::provider(capability, message));
            }
        }
    }

    Err(Error::provider(capability, last_message))
}

/// Classifies a completed HTTP attempt (or network failure) into retry
/// policy, mirroring the teacher's status-code branching.
pub(crate) enum RequestOutcome {
    Retryable(String),
    FailFast(String),
}

pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> RequestOutcome {
    if status.as_u16() == 429 || status.is_server_error() {
        RequestOutcome::Retryable(format!("HTTP {status}: {body}"))
    } else {
        RequestOutcome::FailFast(format!("HTTP {status}: {body}"))
    }
}
