//! Natural language to SQL translation

use serde::Serialize;
use tracing::debug;

use crate::client::ChatModel;
use crate::error::AiError;
use crate::prompt::{clean_sql, PromptComposer, PromptPayload};

/// SQL extracted from a model reply. Not validated: a reply without SQL
/// passes through unchanged and fails at execution instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlCandidate {
    pub sql: String,
    pub raw_reply: String,
}

impl SqlCandidate {
    pub fn from_reply(raw_reply: impl Into<String>) -> Self {
        let raw_reply = raw_reply.into();
        Self {
            sql: clean_sql(&raw_reply),
            raw_reply,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Sends the composed prompt to the model and extracts the SQL.
pub struct Translator<'a> {
    model: &'a dyn ChatModel,
    composer: PromptComposer,
}

impl<'a> Translator<'a> {
    pub fn new(model: &'a dyn ChatModel, composer: PromptComposer) -> Self {
        Self { model, composer }
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    pub async fn translate(&self, question: &str) -> Result<SqlCandidate, AiError> {
        let payload = self.composer.compose(question);
        self.request(&payload).await
    }

    /// One model call with an already composed payload.
    pub async fn request(&self, payload: &PromptPayload) -> Result<SqlCandidate, AiError> {
        let reply = self.model.complete(payload).await?;
        debug!("Model reply for SQL generation: {}", reply);
        Ok(SqlCandidate::from_reply(reply))
    }
}
