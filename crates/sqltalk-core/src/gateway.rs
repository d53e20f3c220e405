//! Language-model gateway capability and the two prompts the pipeline uses
//!
//! Any chat-style completion backend works: the pipeline only needs a
//! system instruction and a user message in, one block of text out.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("model returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError>;
}

/// Instruction for pulling table names out of the user's prompt
pub const EXTRACTION_PROMPT: &str =
    "Extract table names used in the prompt. Comma-separated, no explanation.";

/// Instruction for SQL synthesis, grounded on the rendered schema context
pub fn synthesis_prompt(schema_context: &str) -> String {
    format!(
        "You are a MySQL expert.\n\
         Use the schema below to write a valid SQL query for the user's prompt.\n\
         \n\
         {}\n\
         \n\
         Return only the SQL query, nothing else.\n",
        schema_context
    )
}

/// Split the extraction reply into table-name tokens
///
/// Tokens are trimmed, stripped of surrounding quotes/backticks, and empties
/// dropped, so `" users, ,`orders`,"` yields `["users", "orders"]`.
pub fn parse_table_list(reply: &str) -> Vec<String> {
    strip_code_fence(reply)
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reduce a synthesis reply to the bare statement
///
/// Strips surrounding whitespace, a Markdown code fence, and trailing
/// semicolons. Returns an empty string when nothing usable is left.
pub fn clean_sql(reply: &str) -> String {
    strip_code_fence(reply)
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string (```sql) up to the first newline
    match rest.find('\n') {
        Some(idx) => {
            let body = &rest[idx + 1..];
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => strip_info_word(rest.strip_suffix("```").unwrap_or(rest).trim()),
    }
}

/// Words a generated statement can open with
const STATEMENT_KEYWORDS: &[&str] = &[
    "select", "with", "insert", "update", "delete", "replace", "create", "alter", "drop",
    "truncate", "show", "describe", "desc", "explain", "call", "set", "use",
];

fn starts_like_statement(text: &str) -> bool {
    if text.starts_with('(') {
        return true;
    }
    let first = text
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    STATEMENT_KEYWORDS.iter().any(|k| first.eq_ignore_ascii_case(k))
}

/// Single-line fence: `sql SELECT 1` loses its `sql` tag, `SELECT 1` is untouched
fn strip_info_word(body: &str) -> &str {
    if starts_like_statement(body) {
        return body;
    }
    match body.split_once(char::is_whitespace) {
        Some((word, remainder))
            if word.chars().all(|c| c.is_ascii_alphanumeric())
                && starts_like_statement(remainder.trim_start()) =>
        {
            remainder.trim_start()
        }
        _ => body,
    }
}
