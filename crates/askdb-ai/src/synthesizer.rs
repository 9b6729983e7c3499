//! Final answer synthesis from the question, the SQL and its result

use std::fmt;

use askdb_store::QueryResult;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::ChatModel;
use crate::error::AiError;
use crate::prompt::{build_synthesis_prompt, PromptPayload, SYNTHESIS_SYSTEM_PROMPT};

/// Used when the model returns an empty explanation.
pub const NO_EXPLANATION: &str = "The model returned no explanation.";

/// The externally visible result of one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question: String,
    /// The model's reply before fences were stripped.
    pub raw_reply: String,
    pub sql: String,
    pub result: QueryResult,
    pub explanation: String,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### SQL Query")?;
        writeln!(f, "```sql")?;
        writeln!(f, "{}", self.sql)?;
        writeln!(f, "```")?;
        writeln!(f, "### SQL Result")?;
        writeln!(f, "{}", self.result)?;
        writeln!(f, "### Explanation")?;
        write!(f, "{}", self.explanation)
    }
}

pub struct Synthesizer<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> Synthesizer<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// One model call, no retry. Failed results are explained, not raised.
    ///
    /// `raw_reply` is set to `sql`; callers holding the original reply
    /// overwrite it.
    pub async fn synthesize(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<Answer, AiError> {
        let payload = PromptPayload {
            system: SYNTHESIS_SYSTEM_PROMPT.to_string(),
            user: build_synthesis_prompt(question, sql, result),
        };
        debug!("Synthesis prompt: {}", payload.user);

        let reply = self.model.complete(&payload).await?;
        let explanation = if reply.trim().is_empty() {
            warn!("Model returned an empty explanation");
            NO_EXPLANATION.to_string()
        } else {
            reply.trim().to_string()
        };

        Ok(Answer {
            question: question.to_string(),
            raw_reply: sql.to_string(),
            sql: sql.to_string(),
            result: result.clone(),
            explanation,
        })
    }
}
