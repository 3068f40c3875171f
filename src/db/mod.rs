//! Database access layer.
//!
//! This module provides the building blocks the gateway orchestrates:
//! - Session and connector traits over the physical MySQL connection
//! - Fixed-capacity connection pool with RAII handles
//! - Per-handle database binding
//! - Statement classification
//! - Transactional statement execution
//! - MySQL value to JSON decoding

pub mod binder;
pub mod classifier;
pub mod executor;
pub mod pool;
pub mod session;
pub mod types;

pub use binder::bind;
pub use classifier::{StatementKind, classify};
pub use executor::{Execution, execute};
pub use pool::{ConnectionPool, Handle, PooledHandle};
pub use session::{Connector, JsonRow, MySqlConnector, MySqlSession, SqlSession};
pub use types::{RowToJson, TypeCategory};
