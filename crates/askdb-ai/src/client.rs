//! LLM API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AiError;
use crate::prompt::PromptPayload;

pub const DEFAULT_OPENAI_MODEL: &str = "openai/gpt-4.1";
pub const DEFAULT_OPENAI_BASE: &str = "https://models.github.ai/inference";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_BASE: &str = "https://api.anthropic.com";

/// A model that turns a system + human prompt into free text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &PromptPayload) -> Result<String, AiError>;
}

/// LLM provider configuration
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Any endpoint speaking the OpenAI chat-completions protocol.
    /// `base_url` includes the version segment, e.g. `https://api.openai.com/v1`.
    OpenAI {
        api_key: String,
        model: String,
        base_url: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        base_url: String,
    },
}

impl LlmProvider {
    pub fn model(&self) -> &str {
        match self {
            LlmProvider::OpenAI { model, .. } | LlmProvider::Anthropic { model, .. } => model,
        }
    }
}

/// Client for the hosted model endpoint. Construct once and pass by reference.
#[derive(Debug)]
pub struct LlmClient {
    provider: LlmProvider,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from environment variables
    pub fn from_env() -> Result<Self, AiError> {
        // Try OpenAI first, then Anthropic
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let model =
                std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
            let base_url =
                std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_OPENAI_BASE.to_string());
            Ok(Self::new(LlmProvider::OpenAI {
                api_key,
                model,
                base_url,
            }))
        } else if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            let model = std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string());
            let base_url = std::env::var("ANTHROPIC_API_BASE")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE.to_string());
            Ok(Self::new(LlmProvider::Anthropic {
                api_key,
                model,
                base_url,
            }))
        } else {
            Err(AiError::MissingApiKey)
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Generate a response from the LLM
    pub async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        match &self.provider {
            LlmProvider::OpenAI {
                api_key,
                model,
                base_url,
            } => {
                self.call_openai(api_key, model, base_url, system_prompt, user_prompt)
                    .await
            }
            LlmProvider::Anthropic {
                api_key,
                model,
                base_url,
            } => {
                self.call_anthropic(api_key, model, base_url, system_prompt, user_prompt)
                    .await
            }
        }
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AiError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'static str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageContent,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageContent {
            content: Option<String>,
        }

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(OpenAIMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(OpenAIMessage {
            role: "user",
            content: user_prompt,
        });

        let request = OpenAIRequest {
            model,
            messages,
            temperature: 0.1,
        };

        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        debug!("Calling OpenAI-compatible API at {} with model: {}", url, model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(AiError::Api {
                provider: "OpenAI",
                status,
                body,
            });
        }

        let response: OpenAIResponse = response.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyResponse("OpenAI"))?;

        info!("Received response from OpenAI-compatible endpoint");
        Ok(content)
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AiError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<&'a str>,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'static str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model,
            max_tokens: 4096,
            system: (!system_prompt.is_empty()).then_some(system_prompt),
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        debug!("Calling Anthropic API with model: {}", model);

        let response = self
            .client
            .post(format!("{}/v1/messages", base_url.trim_end_matches('/')))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(AiError::Api {
                provider: "Anthropic",
                status,
                body,
            });
        }

        let response: AnthropicResponse = response.json().await?;
        let content = response
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(AiError::EmptyResponse("Anthropic"))?;

        info!("Received response from Anthropic");
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, prompt: &PromptPayload) -> Result<String, AiError> {
        self.generate(&prompt.system, &prompt.user).await
    }
}
