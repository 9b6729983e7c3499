//! Prompt building for SQL generation and answer synthesis

use askdb_store::{QueryResult, TableSchema};

/// Rows to return when the question does not ask for a specific number.
pub const DEFAULT_ROW_LIMIT: usize = 30;

/// System prompt for the second model call
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are a data analyst explaining the result of a SQL query to the person who asked the question.

Your answer must contain:
- The SQL query used, inside a ```sql block.
- The SQL result.
- An Explanation section describing how the result answers the question.

If the SQL result is an error, say that the query failed, quote the error, and explain the likely cause. Never invent numbers that are not in the SQL result."#;

/// One request to the model: a system turn and a human turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

/// Renders the fixed SQL-agent instructions plus the user's question.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    row_limit: usize,
    schema: Option<TableSchema>,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            schema: None,
        }
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Attach the table layout so the model only references real columns.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    pub fn compose(&self, question: &str) -> PromptPayload {
        let mut system = sql_agent_instructions(self.row_limit);
        if let Some(schema) = &self.schema {
            system.push_str("\n\n## Database schema\n");
            system.push_str(&schema.describe());
        }
        PromptPayload {
            system,
            user: question.to_string(),
        }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn sql_agent_instructions(row_limit: usize) -> String {
    format!(
        r#"You are an agent designed to interact with a SQL database.

## Instructions:
- Given an input question, create a syntactically correct SQLite query to run, then look at the results of the query and return the answer.
- Unless the user specifies a specific number of examples, ALWAYS limit to {row_limit} rows.
- ONLY select relevant columns, never SELECT *.
- If a query fails, rewrite it and try again.
- DO NOT write INSERT, UPDATE, DELETE, DROP, or other destructive statements.
- NEVER hallucinate table names: only use the tables that exist in the database.
- NEVER add markdown backticks inside the SQL query itself.
- Final answer must always contain:
  - The SQL query used.
  - The SQL result.
  - An Explanation section showing how you arrived at the answer.
- Always provide your SQL inside ```sql blocks in the final answer (but NOT during execution).
- If the question is not related to the database, answer "I don't know".

Your task: Convert the user's question into a SQL query that answers the question."#
    )
}

/// Strip code-fence markers from a model reply and trim it.
pub fn clean_sql(raw: &str) -> String {
    raw.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Build the human turn for the answer-synthesis call.
///
/// A failed result is passed through verbatim so the model can explain it.
pub fn build_synthesis_prompt(question: &str, sql: &str, result: &QueryResult) -> String {
    format!(
        r#"Use the query and results below to produce the final answer.

### Question
{question}

### SQL Query
```sql
{sql}
```

### SQL Results
{result}

### Final Answer"#
    )
}
