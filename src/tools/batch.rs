//! Batch request parsing.
//!
//! Batches arrive as a single string of `database:sql` pairs separated by
//! `;`. Each pair is split at the FIRST colon, so SQL containing colons
//! (time literals, JSON operators) survives intact. Empty segments, such as
//! the one after a trailing `;`, are skipped. Any malformed pair fails the
//! whole parse; partial batches are never executed.

use crate::error::{GatewayError, GatewayResult};
use crate::models::QueryRequest;

/// Parse a `database:sql;database:sql` batch string into requests.
pub fn parse_batch(input: &str) -> GatewayResult<Vec<QueryRequest>> {
    let mut requests = Vec::new();

    for segment in input.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let Some((database, sql)) = segment.split_once(':') else {
            return Err(GatewayError::invalid_request(format!(
                "Malformed batch segment '{}': expected 'database:sql'",
                segment
            )));
        };

        let database = database.trim();
        let sql = sql.trim();
        if database.is_empty() {
            return Err(GatewayError::invalid_request(format!(
                "Malformed batch segment '{}': database name is empty",
                segment
            )));
        }
        if sql.is_empty() {
            return Err(GatewayError::invalid_request(format!(
                "Malformed batch segment '{}': SQL is empty",
                segment
            )));
        }

        requests.push(QueryRequest::new(database, sql));
    }

    if requests.is_empty() {
        return Err(GatewayError::invalid_request(
            "Batch contains no queries: expected 'database:sql' pairs separated by ';'",
        ));
    }

    Ok(requests)
}
