//! Statement classification.
//!
//! The executor needs exactly one bit about a statement: does it return rows
//! (run it directly) or mutate data (wrap it in a transaction)? That bit
//! comes from the leading keyword alone. Anything that is not a known
//! row-returning keyword is treated as a write, which errs on the side of
//! transactional safety for statements like `SET` or `CALL`.
//!
//! There is deliberately no SQL parsing here. Keeping the heuristic isolated
//! in this module means a smarter classifier can replace it without touching
//! the executor.

use crate::error::{GatewayError, GatewayResult};

/// How a statement will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Row-returning; executed directly, rows fetched.
    Read,
    /// Potentially mutating; executed inside a transaction.
    Write,
}

/// Leading keywords that mark a statement as row-returning.
const READ_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN"];

/// Classify a statement by its leading keyword.
///
/// Empty or whitespace-only SQL is rejected; that check belongs before any
/// connection is touched, and callers rely on it happening here at the
/// latest.
pub fn classify(sql: &str) -> GatewayResult<StatementKind> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::invalid_request("SQL must not be empty"));
    }

    let keyword: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if READ_KEYWORDS.contains(&keyword.as_str()) {
        Ok(StatementKind::Read)
    } else {
        Ok(StatementKind::Write)
    }
}
