//! Data models for the gateway.

pub mod query;

pub use query::{QueryOutcome, QueryReport, QueryRequest};
