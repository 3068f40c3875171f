//! Gateway behavior tests against an in-memory mock server.
//!
//! The mock connector implements the session traits over a shared in-memory
//! "server": a set of databases, a committed-statement store per database,
//! and counters for connects and switches. Statement text drives behavior:
//! - "BOOM" anywhere in the SQL makes execution fail
//! - "DROPPED" anywhere in the SQL fails with a connection-level error, as
//!   if the server closed the socket mid-statement
//! - "rows=N" in a SELECT returns N rows; "rows=N" in a write reports N
//!   affected rows
//! - "sleep=MS" delays execution, for concurrency tests under a paused clock
//! - "SELECT COMMITTED" returns one row per statement committed to the
//!   bound database

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value as JsonValue;

use mysql_gateway_mcp::db::session::{Connector, JsonRow, SqlSession};
use mysql_gateway_mcp::error::{GatewayError, GatewayResult};
use mysql_gateway_mcp::gateway::Gateway;
use mysql_gateway_mcp::models::{QueryOutcome, QueryRequest};

// =============================================================================
// Mock server
// =============================================================================

#[derive(Default)]
struct MockServer {
    databases: HashSet<String>,
    committed: Mutex<HashMap<String, Vec<String>>>,
    connects: AtomicUsize,
    switches: AtomicUsize,
    /// Statements finish in this order; lets tests observe interleaving.
    completions: Mutex<Vec<String>>,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl MockServer {
    fn with_databases(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            databases: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    fn committed_in(&self, database: &str) -> Vec<String> {
        self.committed
            .lock()
            .unwrap()
            .get(database)
            .cloned()
            .unwrap_or_default()
    }

    fn completions(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }
}

/// Pull `key=N` out of a statement, e.g. "sleep=25" or "rows=3".
fn directive(sql: &str, key: &str) -> Option<u64> {
    let marker = format!("{}=", key);
    let start = sql.find(&marker)? + marker.len();
    let digits: String = sql[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

struct MockSession {
    server: Arc<MockServer>,
    database: Option<String>,
    pending: Vec<String>,
    in_tx: bool,
}

impl MockSession {
    async fn simulate(&self, sql: &str) -> GatewayResult<()> {
        if let Some(ms) = directive(sql, "sleep") {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if sql.contains("BOOM") {
            return Err(GatewayError::statement("simulated failure", None));
        }
        if sql.contains("DROPPED") {
            return Err(GatewayError::connection("server has gone away"));
        }
        self.server.completions.lock().unwrap().push(sql.to_string());
        Ok(())
    }
}

impl SqlSession for MockSession {
    async fn database_exists(&mut self, database: &str) -> GatewayResult<bool> {
        Ok(self.server.databases.contains(database))
    }

    async fn switch_database(&mut self, database: &str) -> GatewayResult<()> {
        self.server.switches.fetch_add(1, Ordering::AcqRel);
        self.database = Some(database.to_string());
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str) -> GatewayResult<Vec<JsonRow>> {
        self.simulate(sql).await?;

        if sql.contains("SELECT COMMITTED") {
            let database = self.database.clone().unwrap_or_default();
            return Ok(self
                .server
                .committed_in(&database)
                .into_iter()
                .map(|stmt| {
                    let mut row = JsonRow::new();
                    row.insert("statement".into(), JsonValue::String(stmt));
                    row
                })
                .collect());
        }

        let count = directive(sql, "rows").unwrap_or(0);
        Ok((0..count)
            .map(|i| {
                let mut row = JsonRow::new();
                row.insert("v".into(), JsonValue::Number(i.into()));
                row
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> GatewayResult<u64> {
        self.simulate(sql).await?;
        if self.in_tx {
            self.pending.push(sql.to_string());
        }
        Ok(directive(sql, "rows").unwrap_or(1))
    }

    async fn begin(&mut self) -> GatewayResult<()> {
        self.in_tx = true;
        self.pending.clear();
        Ok(())
    }

    async fn commit(&mut self) -> GatewayResult<()> {
        if self.server.fail_commit.load(Ordering::Acquire) {
            // Pending statements stay uncommitted, as if the server never
            // received the commit
            return Err(GatewayError::connection("commit lost: server went away"));
        }
        let database = self.database.clone().unwrap_or_default();
        let mut committed = self.server.committed.lock().unwrap();
        committed
            .entry(database)
            .or_default()
            .append(&mut self.pending);
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> GatewayResult<()> {
        if self.server.fail_rollback.load(Ordering::Acquire) {
            return Err(GatewayError::connection("rollback refused"));
        }
        self.pending.clear();
        self.in_tx = false;
        Ok(())
    }

    async fn close(self) {}
}

#[derive(Clone)]
struct MockConnector {
    server: Arc<MockServer>,
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> GatewayResult<MockSession> {
        self.server.connects.fetch_add(1, Ordering::AcqRel);
        Ok(MockSession {
            server: self.server.clone(),
            database: None,
            pending: Vec::new(),
            in_tx: false,
        })
    }
}

fn gateway_over(
    server: &Arc<MockServer>,
    capacity: usize,
    acquire_timeout: Option<Duration>,
) -> Gateway<MockConnector> {
    Gateway::new(
        MockConnector {
            server: server.clone(),
        },
        capacity,
        acquire_timeout,
    )
}

// =============================================================================
// Request pipeline
// =============================================================================

#[tokio::test]
async fn invalid_request_never_touches_the_pool() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    let outcome = gateway.run(QueryRequest::new("", "SELECT 1")).await;
    assert!(matches!(outcome, QueryOutcome::Error { .. }));

    let outcome = gateway.run(QueryRequest::new("orders", "   ")).await;
    assert!(matches!(outcome, QueryOutcome::Error { .. }));

    assert_eq!(gateway.pool().acquire_count(), 0);
    assert_eq!(server.connects.load(Ordering::Acquire), 0);
}

#[tokio::test]
async fn read_returns_rows_and_exact_count() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    let outcome = gateway
        .run(QueryRequest::new("orders", "SELECT rows=3"))
        .await;
    match outcome {
        QueryOutcome::Read { database, rows } => {
            assert_eq!(database, "orders");
            assert_eq!(rows.len(), 3);
        }
        other => panic!("expected read outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_read_still_carries_rows() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    let report = gateway
        .run(QueryRequest::new("orders", "SELECT rows=0"))
        .await
        .into_report();
    assert_eq!(report.status, "success");
    assert_eq!(report.row_count, Some(0));
    assert_eq!(report.data, Some(Vec::new()));
}

#[tokio::test]
async fn unknown_database_reports_not_found() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    let outcome = gateway.run(QueryRequest::new("nope", "SELECT 1")).await;
    match outcome {
        QueryOutcome::Error {
            database, message, ..
        } => {
            assert_eq!(database, "nope");
            assert!(message.contains("nope"));
            assert!(message.contains("not found"));
        }
        other => panic!("expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn successful_write_commits() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    let outcome = gateway
        .run(QueryRequest::new("orders", "INSERT rows=4"))
        .await;
    assert!(matches!(
        outcome,
        QueryOutcome::Write { rows_affected: 4, .. }
    ));
    assert_eq!(server.committed_in("orders"), vec!["INSERT rows=4"]);
}

#[tokio::test]
async fn failed_write_rolls_back_and_commits_nothing() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    gateway
        .run(QueryRequest::new("orders", "INSERT rows=1"))
        .await;
    let outcome = gateway
        .run(QueryRequest::new("orders", "INSERT BOOM"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Error { .. }));

    // Only the first write is visible afterwards
    assert_eq!(server.committed_in("orders"), vec!["INSERT rows=1"]);

    let outcome = gateway
        .run(QueryRequest::new("orders", "SELECT COMMITTED"))
        .await;
    match outcome {
        QueryOutcome::Read { rows, .. } => assert_eq!(rows.len(), 1),
        other => panic!("expected read outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn rollback_failure_discards_the_connection() {
    let server = MockServer::with_databases(&["orders"]);
    server.fail_rollback.store(true, Ordering::Release);
    let gateway = gateway_over(&server, 2, None);

    let outcome = gateway
        .run(QueryRequest::new("orders", "INSERT BOOM"))
        .await;
    match outcome {
        QueryOutcome::Error { message, .. } => {
            assert!(message.contains("Rollback failed"));
            assert!(message.contains("simulated failure"));
        }
        other => panic!("expected error outcome, got {:?}", other),
    }

    assert_eq!(gateway.pool().discard_count(), 1);
    assert_eq!(gateway.pool().idle_count(), 0);
}

#[tokio::test]
async fn dead_connection_is_discarded_not_repooled() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 1, None);

    let outcome = gateway
        .run(QueryRequest::new("orders", "SELECT DROPPED"))
        .await;
    match outcome {
        QueryOutcome::Error { message, .. } => {
            assert!(message.contains("server has gone away"), "message: {}", message);
        }
        other => panic!("expected error outcome, got {:?}", other),
    }

    // The broken handle is torn down, never returned to the idle set
    assert_eq!(gateway.pool().discard_count(), 1);
    assert_eq!(gateway.pool().idle_count(), 0);

    // The next request gets a fresh connection and succeeds
    let outcome = gateway
        .run(QueryRequest::new("orders", "SELECT rows=1"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Read { .. }));
    assert_eq!(server.connects.load(Ordering::Acquire), 2);
}

#[tokio::test]
async fn failed_commit_rolls_back_and_commits_nothing() {
    let server = MockServer::with_databases(&["orders"]);
    server.fail_commit.store(true, Ordering::Release);
    let gateway = gateway_over(&server, 1, None);

    let outcome = gateway
        .run(QueryRequest::new("orders", "INSERT rows=2"))
        .await;
    match outcome {
        QueryOutcome::Error { message, .. } => {
            assert!(message.contains("commit lost"), "message: {}", message);
        }
        other => panic!("expected error outcome, got {:?}", other),
    }

    // Nothing from the failed write is visible, and the handle with the
    // broken commit is not re-lent
    assert_eq!(server.committed_in("orders"), Vec::<String>::new());
    assert_eq!(gateway.pool().discard_count(), 1);
    assert_eq!(gateway.pool().idle_count(), 0);

    server.fail_commit.store(false, Ordering::Release);
    let outcome = gateway
        .run(QueryRequest::new("orders", "INSERT rows=1"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Write { .. }));
    assert_eq!(server.committed_in("orders"), vec!["INSERT rows=1"]);
}

// =============================================================================
// Binding
// =============================================================================

#[tokio::test]
async fn repeated_target_switches_once() {
    let server = MockServer::with_databases(&["orders"]);
    // Capacity 1 so every request reuses the same handle
    let gateway = gateway_over(&server, 1, None);

    for _ in 0..3 {
        let outcome = gateway
            .run(QueryRequest::new("orders", "SELECT rows=1"))
            .await;
        assert!(matches!(outcome, QueryOutcome::Read { .. }));
    }

    assert_eq!(server.switches.load(Ordering::Acquire), 1);
    assert_eq!(server.connects.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn alternating_targets_switch_each_time() {
    let server = MockServer::with_databases(&["a", "b"]);
    let gateway = gateway_over(&server, 1, None);

    for database in ["a", "b", "a", "b"] {
        gateway
            .run(QueryRequest::new(database, "SELECT rows=1"))
            .await;
    }

    assert_eq!(server.switches.load(Ordering::Acquire), 4);
}

#[tokio::test]
async fn failed_bind_does_not_stick() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 1, None);

    gateway
        .run(QueryRequest::new("orders", "SELECT rows=1"))
        .await;
    gateway.run(QueryRequest::new("missing", "SELECT 1")).await;
    // Handle is still bound to orders; no extra switch needed
    gateway
        .run(QueryRequest::new("orders", "SELECT rows=1"))
        .await;

    assert_eq!(server.switches.load(Ordering::Acquire), 1);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test(start_paused = true)]
async fn batch_results_keep_input_order_under_latency() {
    let server = MockServer::with_databases(&["a", "b", "c"]);
    let gateway = gateway_over(&server, 3, None);

    let requests = vec![
        QueryRequest::new("a", "SELECT rows=1 sleep=30"),
        QueryRequest::new("b", "SELECT rows=2 sleep=1"),
        QueryRequest::new("c", "SELECT rows=3 sleep=10"),
    ];
    let outcomes = gateway.run_batch(requests).await;

    // Results are in input order regardless of completion order
    let row_counts: Vec<usize> = outcomes
        .iter()
        .map(|o| match o {
            QueryOutcome::Read { rows, .. } => rows.len(),
            other => panic!("expected read outcome, got {:?}", other),
        })
        .collect();
    assert_eq!(row_counts, vec![1, 2, 3]);

    // Completion order followed the latencies
    let completions = server.completions();
    assert_eq!(completions[0], "SELECT rows=2 sleep=1");
    assert_eq!(completions[1], "SELECT rows=3 sleep=10");
    assert_eq!(completions[2], "SELECT rows=1 sleep=30");
}

#[tokio::test]
async fn batch_items_fail_independently() {
    let server = MockServer::with_databases(&["a", "b"]);
    let gateway = gateway_over(&server, 2, None);

    let requests = vec![
        QueryRequest::new("a", "SELECT rows=2"),
        QueryRequest::new("missing", "SELECT rows=1"),
        QueryRequest::new("b", "INSERT rows=5"),
    ];
    let outcomes = gateway.run_batch(requests).await;

    assert!(matches!(&outcomes[0], QueryOutcome::Read { rows, .. } if rows.len() == 2));
    assert!(matches!(&outcomes[1], QueryOutcome::Error { .. }));
    assert!(matches!(
        &outcomes[2],
        QueryOutcome::Write { rows_affected: 5, .. }
    ));
    assert_eq!(server.committed_in("b"), vec!["INSERT rows=5"]);
}

#[tokio::test(start_paused = true)]
async fn capacity_one_serializes_the_batch() {
    let server = MockServer::with_databases(&["a", "b"]);
    let gateway = gateway_over(&server, 1, None);

    let started = tokio::time::Instant::now();
    let outcomes = gateway
        .run_batch(vec![
            QueryRequest::new("a", "SELECT rows=1 sleep=100"),
            QueryRequest::new("b", "SELECT rows=1 sleep=100"),
        ])
        .await;
    let elapsed = started.elapsed();

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, QueryOutcome::Read { .. })));
    // One slot: the second item waits for the first, so wall time is the
    // sum of the latencies, not the max
    assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    assert_eq!(server.connects.load(Ordering::Acquire), 1);
}

#[tokio::test(start_paused = true)]
async fn saturated_pool_times_out_waiters() {
    let server = MockServer::with_databases(&["a", "b"]);
    let gateway = gateway_over(&server, 1, Some(Duration::from_secs(1)));

    let outcomes = gateway
        .run_batch(vec![
            QueryRequest::new("a", "SELECT rows=1 sleep=5000"),
            QueryRequest::new("b", "SELECT rows=1"),
        ])
        .await;

    assert!(matches!(&outcomes[0], QueryOutcome::Read { .. }));
    match &outcomes[1] {
        QueryOutcome::Error { message, .. } => {
            assert!(message.contains("pool exhausted"), "message: {}", message);
        }
        other => panic!("expected error outcome, got {:?}", other),
    }
}

// =============================================================================
// Mixed scenario
// =============================================================================

#[tokio::test]
async fn mixed_batch_scenario() {
    let server = MockServer::with_databases(&["inventory", "billing"]);
    let gateway = gateway_over(&server, 2, None);

    let outcomes = gateway
        .run_batch(vec![
            QueryRequest::new("inventory", "SELECT rows=2"),
            QueryRequest::new("billing", "UPDATE rows=3"),
            QueryRequest::new("archive", "SELECT rows=1"),
        ])
        .await;

    let reports: Vec<_> = outcomes.into_iter().map(|o| o.into_report()).collect();

    assert_eq!(reports[0].status, "success");
    assert_eq!(reports[0].row_count, Some(2));
    assert_eq!(reports[0].data.as_ref().map(|d| d.len()), Some(2));

    assert_eq!(reports[1].status, "success");
    assert_eq!(reports[1].affected_rows, Some(3));
    assert!(reports[1].data.is_none());

    assert_eq!(reports[2].status, "error");
    assert_eq!(reports[2].database, "archive");
    assert_eq!(reports[2].query.as_deref(), Some("SELECT rows=1"));
    assert!(reports[2].error.as_ref().unwrap().contains("archive"));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn close_waits_for_idle_pool() {
    let server = MockServer::with_databases(&["orders"]);
    let gateway = gateway_over(&server, 2, None);

    gateway
        .run(QueryRequest::new("orders", "SELECT rows=1"))
        .await;
    gateway.close().await;

    assert_eq!(gateway.pool().idle_count(), 0);
    let outcome = gateway
        .run(QueryRequest::new("orders", "SELECT rows=1"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Error { .. }));
}
