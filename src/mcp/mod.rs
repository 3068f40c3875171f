//! MCP protocol layer.
//!
//! Exposes the gateway's tools over the Model Context Protocol via rmcp.

pub mod service;

pub use service::GatewayService;
