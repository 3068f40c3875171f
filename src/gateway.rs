//! Request orchestration.
//!
//! [`Gateway::run`] is the one path every request takes: validate, borrow a
//! handle, bind it, classify the statement, execute, and hand the handle
//! back. Failures at any stage are folded into an error outcome rather than
//! raised, so callers always get one [`QueryOutcome`] per request.
//!
//! [`Gateway::run_batch`] fans requests out concurrently. Each item borrows
//! its own handle and fails on its own; results come back in input order no
//! matter how execution interleaves.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::db::pool::ConnectionPool;
use crate::db::session::Connector;
use crate::db::{Execution, bind, classify, execute};
use crate::error::GatewayError;
use crate::models::{QueryOutcome, QueryRequest};

/// The gateway: a connection pool plus the request pipeline over it.
pub struct Gateway<C: Connector> {
    pool: ConnectionPool<C>,
}

impl<C: Connector> Gateway<C> {
    /// Create a gateway over a pool with `capacity` slots.
    pub fn new(connector: C, capacity: usize, acquire_timeout: Option<Duration>) -> Self {
        Self {
            pool: ConnectionPool::new(connector, capacity, acquire_timeout),
        }
    }

    /// Execute one request. Never raises; failures become error outcomes.
    pub async fn run(&self, request: QueryRequest) -> QueryOutcome {
        // Request-shape problems are rejected before a handle is borrowed
        if let Err(e) = request.validate() {
            debug!(error = %e, "Rejected malformed request");
            return QueryOutcome::from_error(&request, &e);
        }

        let mut lease = match self.pool.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                warn!(database = %request.database, error = %e, "Failed to acquire connection");
                return QueryOutcome::from_error(&request, &e);
            }
        };

        let result = async {
            bind(&mut lease, &request.database).await?;
            let kind = classify(&request.sql)?;
            execute(lease.session(), &request.sql, kind).await
        }
        .await;

        // A handle whose rollback failed may still have a transaction open,
        // and one that hit a transport failure has a suspect socket; neither
        // may be lent out again
        let poisoned = matches!(&result, Err(e) if e.poisons_connection());
        if poisoned {
            lease.discard();
        } else {
            lease.release();
        }

        match result {
            Ok(Execution::Read { rows }) => QueryOutcome::Read {
                database: request.database,
                rows,
            },
            Ok(Execution::Write { rows_affected }) => QueryOutcome::Write {
                database: request.database,
                rows_affected,
            },
            Err(e) => QueryOutcome::from_error(&request, &e),
        }
    }

    /// Execute a batch concurrently, preserving input order in the results.
    ///
    /// Items are fully isolated: each borrows its own handle and its failure
    /// does not disturb its neighbors. With fewer pool slots than items, the
    /// pool's capacity is the only thing serializing them.
    pub async fn run_batch(&self, requests: Vec<QueryRequest>) -> Vec<QueryOutcome> {
        debug!(count = requests.len(), "Dispatching batch");
        join_all(requests.into_iter().map(|request| self.run(request))).await
    }

    /// Drain in-flight requests and close every pooled connection.
    pub async fn close(&self) {
        info!("Shutting down gateway");
        self.pool.close().await;
    }

    /// The underlying pool, exposed for observability.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }
}

/// Convenience alias for the production gateway.
pub type MySqlGateway = Gateway<crate::db::MySqlConnector>;

impl MySqlGateway {
    /// Build the production gateway from a server URL.
    pub fn connect_lazy(
        url: &str,
        capacity: usize,
        acquire_timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let connector = crate::db::MySqlConnector::from_url(url)?;
        Ok(Self::new(connector, capacity, acquire_timeout))
    }
}
