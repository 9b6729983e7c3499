//! Per-question answer pipeline
//!
//! A request moves linearly through
//! `Received -> Composed -> Translated -> Executed -> Synthesized -> Done`.
//! A model call that fails moves it to `Failed` and halts the request.
//! Execution failures are not fatal: they travel inside the `QueryResult`
//! and are explained by the synthesis call.

use std::fmt;

use askdb_store::QueryExecutor;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::client::ChatModel;
use crate::error::AiError;
use crate::prompt::PromptComposer;
use crate::synthesizer::{Answer, Synthesizer};
use crate::translator::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Composed,
    Translated,
    Executed,
    Synthesized,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Composed => "composed",
            Stage::Translated => "translated",
            Stage::Executed => "executed",
            Stage::Synthesized => "synthesized",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal failure, tagged with the last stage the request completed.
#[derive(Debug, Error)]
#[error("request failed after stage '{after}': {source}")]
pub struct PipelineError {
    pub after: Stage,
    #[source]
    pub source: AiError,
}

struct RequestState {
    stage: Stage,
}

impl RequestState {
    fn new() -> Self {
        Self {
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("{} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, source: AiError) -> PipelineError {
        let after = self.stage;
        self.advance(Stage::Failed);
        PipelineError { after, source }
    }
}

/// Wires composer, translator, executor and synthesizer for one question at a time.
pub struct AnswerPipeline<'a> {
    translator: Translator<'a>,
    executor: &'a QueryExecutor,
    synthesizer: Synthesizer<'a>,
}

impl<'a> AnswerPipeline<'a> {
    pub fn new(
        model: &'a dyn ChatModel,
        executor: &'a QueryExecutor,
        composer: PromptComposer,
    ) -> Self {
        Self {
            translator: Translator::new(model, composer),
            executor,
            synthesizer: Synthesizer::new(model),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let span = info_span!("request", id = %Uuid::new_v4());
        self.run(question).instrument(span).await
    }

    async fn run(&self, question: &str) -> Result<Answer, PipelineError> {
        let mut state = RequestState::new();
        info!("Answering question: {}", question);

        let payload = self.translator.composer().compose(question);
        state.advance(Stage::Composed);

        let candidate = self
            .translator
            .request(&payload)
            .await
            .map_err(|e| state.fail(e))?;
        state.advance(Stage::Translated);
        info!("Generated SQL: {}", candidate.sql);

        let result = self.executor.execute(&candidate.sql).await;
        state.advance(Stage::Executed);

        let mut answer = self
            .synthesizer
            .synthesize(question, &candidate.sql, &result)
            .await
            .map_err(|e| state.fail(e))?;
        answer.raw_reply = candidate.raw_reply;
        state.advance(Stage::Synthesized);

        state.advance(Stage::Done);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Received.to_string(), "received");
        assert_eq!(Stage::Synthesized.to_string(), "synthesized");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[test]
    fn test_request_state_fail_records_last_stage() {
        let mut state = RequestState::new();
        state.advance(Stage::Composed);
        let err = state.fail(AiError::EmptyResponse("OpenAI"));
        assert_eq!(err.after, Stage::Composed);
        assert_eq!(state.stage, Stage::Failed);
        assert_eq!(
            err.to_string(),
            "request failed after stage 'composed': No response from OpenAI"
        );
    }
}
