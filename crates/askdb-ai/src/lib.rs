//! askdb AI - natural language to SQL answering
//!
//! This crate provides:
//! - LLM API client (OpenAI-compatible/Anthropic) behind the `ChatModel` trait
//! - Prompt composition for SQL generation and answer synthesis
//! - SQL extraction from free-text model replies
//! - The per-question answer pipeline

pub mod client;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod synthesizer;
pub mod translator;

pub use client::{ChatModel, LlmClient, LlmProvider};
pub use error::AiError;
pub use pipeline::{AnswerPipeline, PipelineError, Stage};
pub use prompt::{clean_sql, PromptComposer, PromptPayload};
pub use synthesizer::{Answer, Synthesizer};
pub use translator::{SqlCandidate, Translator};
