//! Typed errors for model calls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("No LLM API key found. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    MissingApiKey,

    /// The endpoint could not be reached or the reply could not be decoded.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status, e.g. rejected credentials.
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("No response from {0}")]
    EmptyResponse(&'static str),
}
