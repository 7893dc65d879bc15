use async_trait::async_trait;
use thiserror::Error;

use super::types::ChatMessage;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model provider failed: {0}")]
    Transport(String),
    #[error("model provider timed out")]
    Timeout,
    #[error("model provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model provider returned an unexpected payload: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::MalformedResponse(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// Text generation. An `Ok("")` is an empty completion, not a failure.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Text embedding, one vector per input in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
