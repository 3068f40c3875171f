//! MySQL Gateway MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for executing
//! SQL against the multiple databases of a single MySQL server, with a
//! fixed-capacity connection pool and per-request database binding.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, MySqlGateway};
pub use mcp::GatewayService;
