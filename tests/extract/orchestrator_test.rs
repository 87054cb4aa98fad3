//! Four-pass protocol tests against a scripted gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use filament::extract::BreakerState;
use filament::gateway::ModelGateway;
use filament::lineage::enrich_dependencies;
use filament::{CircuitBreaker, Extractor, ExtractorOptions, TableRole};

/// Gateway scripted by prompt markers: the first `(marker, response)` pair
/// whose marker appears in the prompt wins; unmatched prompts answer with
/// an empty string, the gateway's exhausted-retries signal.
struct ScriptedGateway {
    script: Vec<(String, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn new(script: &[(&str, &str)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(marker, response)| (marker.to_string(), response.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.contains(marker))
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn call(&self, prompt: &str) -> String {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.script
            .iter()
            .find(|(marker, _)| prompt.contains(marker))
            .map(|(_, response)| response.clone())
            .unwrap_or_default()
    }
}

fn fast_options(concurrent: bool) -> ExtractorOptions {
    ExtractorOptions {
        concurrent,
        table_batch_size: 8,
        table_batch_pause: Duration::ZERO,
        pair_batch_size: 5,
        pair_call_delay: Duration::ZERO,
    }
}

fn breaker() -> Arc<Mutex<CircuitBreaker>> {
    Arc::new(Mutex::new(CircuitBreaker::new(
        3,
        Duration::from_secs(300),
    )))
}

const ORDERS_SQL: &str = "\
INSERT INTO orders_summary
SELECT id, SUM(amount) AS amount
FROM orders
GROUP BY id";

fn orders_script() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "PASS 1",
            "tables:\n  - id: orders\n    name: orders\n    role: source\n  - id: orders_summary\n    name: orders_summary\n    role: target",
        ),
        (
            "PASS 2 - EXTRACT COLUMNS FOR TABLE 'orders_summary'",
            "table:\n  name: orders_summary\n  columns:\n    - name: id\n    - name: amount",
        ),
        (
            "PASS 2 - EXTRACT COLUMNS FOR TABLE 'orders'",
            "table:\n  name: orders\n  columns:\n    - name: id\n    - name: amount",
        ),
        (
            "PASS 3",
            "table_edges:\n  - from_table: orders\n    to_table: orders_summary\n    transformation_type: aggregate\n    transformation_lines:\n      start_line: 1\n      end_line: 4\n  - from_table: staging_orders\n    to_table: orders_summary\n    transformation_type: insert",
        ),
        (
            "PASS 4",
            "column_edges:\n  - from_table: orders\n    from_column: id\n    to_table: orders_summary\n    to_column: id\n    transformation_type: direct\n    transformation_lines:\n      start_line: 2\n      end_line: 2\n  - from_table: orders\n    from_column: amount\n    to_table: orders_summary\n    to_column: amount\n    transformation_type: aggregate\n    transformation_lines:\n      start_line: 2\n      end_line: 2",
        ),
    ]
}

#[tokio::test]
async fn test_end_to_end_two_table_aggregate() {
    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let extractor = Extractor::new(gateway.clone(), fast_options(true), breaker());

    let mut deps = extractor.extract(ORDERS_SQL).await;
    enrich_dependencies(&mut deps, ORDERS_SQL);

    // Tables with roles and columns from passes 1 and 2.
    assert_eq!(deps.tables.len(), 2);
    assert_eq!(deps.tables[0].name, "orders");
    assert_eq!(deps.tables[0].role, TableRole::Source);
    assert_eq!(deps.tables[0].columns, vec!["id", "amount"]);
    assert_eq!(deps.tables[1].role, TableRole::Target);

    // The hallucinated staging_orders edge is dropped by validation.
    assert_eq!(deps.lineage.table_edges.len(), 1);
    let edge = &deps.lineage.table_edges[0];
    assert_eq!(edge.from_table, "orders");
    assert_eq!(edge.to_table, "orders_summary");
    assert_eq!(edge.transformation_type, "aggregate");

    // The table edge covers the whole INSERT statement and its snippet
    // carries the raw source.
    let span = edge.transformation_lines.as_ref().unwrap();
    assert_eq!((span.start_line, span.end_line), (1, 4));
    assert!(edge
        .transformation_snippet
        .as_deref()
        .unwrap()
        .contains("INSERT INTO orders_summary"));

    // Column edges for id and the aggregated amount.
    assert_eq!(deps.lineage.column_edges.len(), 2);
    assert!(deps
        .lineage
        .column_edges
        .iter()
        .any(|e| e.from_column == "id" && e.to_column == "id"));
    assert!(deps
        .lineage
        .column_edges
        .iter()
        .any(|e| e.from_column == "amount" && e.transformation_type == "aggregate"));
}

#[tokio::test]
async fn test_sequential_mode_produces_same_result() {
    let concurrent_gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let sequential_gateway = Arc::new(ScriptedGateway::new(&orders_script()));

    let concurrent = Extractor::new(concurrent_gateway.clone(), fast_options(true), breaker())
        .extract(ORDERS_SQL)
        .await;
    let sequential = Extractor::new(sequential_gateway.clone(), fast_options(false), breaker())
        .extract(ORDERS_SQL)
        .await;

    assert_eq!(concurrent, sequential);
    assert_eq!(
        concurrent_gateway.total_calls(),
        sequential_gateway.total_calls()
    );
}

#[tokio::test]
async fn test_pass1_failure_aborts_file() {
    // No script: every call answers empty.
    let gateway = Arc::new(ScriptedGateway::new(&[]));
    let extractor = Extractor::new(gateway.clone(), fast_options(true), breaker());

    let deps = extractor.extract(ORDERS_SQL).await;
    assert!(deps.is_empty());
    assert!(deps.lineage.table_edges.is_empty());

    // Later passes never ran.
    assert_eq!(gateway.total_calls(), 1);
}

#[tokio::test]
async fn test_pass2_falls_back_to_comma_list() {
    let mut script = orders_script();
    // Structured answer for `orders` is prose; the fallback call succeeds.
    script[2] = (
        "PASS 2 - EXTRACT COLUMNS FOR TABLE 'orders'",
        "I believe the relevant columns would be listed as follows",
    );
    script.push(("comma-separated list", "id, amount"));

    let gateway = Arc::new(ScriptedGateway::new(&script));
    let extractor = Extractor::new(gateway.clone(), fast_options(false), breaker());

    let deps = extractor.extract(ORDERS_SQL).await;
    let orders = deps.tables.iter().find(|t| t.name == "orders").unwrap();
    assert_eq!(orders.columns, vec!["id", "amount"]);
    assert_eq!(gateway.calls_matching("comma-separated list"), 1);
}

#[tokio::test]
async fn test_columnless_tables_are_excluded_from_pass4() {
    let mut script = orders_script();
    // Both column attempts fail for `orders`: no structured answer, no
    // usable fallback. The table keeps an empty column list and the
    // orders→orders_summary pair no longer qualifies for pass 4.
    script[2] = ("PASS 2 - EXTRACT COLUMNS FOR TABLE 'orders'", "no structure here");
    script.push(("comma-separated list", ""));

    let gateway = Arc::new(ScriptedGateway::new(&script));
    let extractor = Extractor::new(gateway.clone(), fast_options(false), breaker());

    let deps = extractor.extract(ORDERS_SQL).await;
    let orders = deps.tables.iter().find(|t| t.name == "orders").unwrap();
    assert!(orders.columns.is_empty());
    assert_eq!(deps.lineage.table_edges.len(), 1);
    assert!(deps.lineage.column_edges.is_empty());
    assert_eq!(gateway.calls_matching("PASS 4"), 0);
}

#[tokio::test]
async fn test_breaker_opens_after_repeated_batch_failures() {
    // Passes 1-3 succeed; every pass-4 batch call fails (empty answer).
    let script: Vec<(&str, &str)> = orders_script()
        .into_iter()
        .filter(|(marker, _)| !marker.contains("PASS 4"))
        .collect();

    let gateway = Arc::new(ScriptedGateway::new(&script));
    let shared_breaker = breaker();

    // Three files in one run: failures accumulate on the shared breaker.
    for _ in 0..3 {
        let extractor = Extractor::new(
            gateway.clone(),
            fast_options(true),
            shared_breaker.clone(),
        );
        let deps = extractor.extract(ORDERS_SQL).await;
        assert!(deps.lineage.column_edges.is_empty());
    }
    assert_eq!(gateway.calls_matching("PASS 4"), 3);
    assert_eq!(
        shared_breaker.lock().unwrap().state(),
        BreakerState::Open
    );

    // Fourth file within the cooldown: the batch is skipped without a call.
    let extractor = Extractor::new(
        gateway.clone(),
        fast_options(true),
        shared_breaker.clone(),
    );
    let deps = extractor.extract(ORDERS_SQL).await;
    assert!(deps.lineage.column_edges.is_empty());
    assert_eq!(gateway.calls_matching("PASS 4"), 3);
}

#[tokio::test]
async fn test_breaker_recovers_after_cooldown() {
    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    // Zero cooldown: the breaker closes again on the next attempt.
    let shared_breaker = Arc::new(Mutex::new(CircuitBreaker::new(3, Duration::ZERO)));
    for _ in 0..3 {
        shared_breaker.lock().unwrap().record_failure();
    }
    assert_eq!(shared_breaker.lock().unwrap().state(), BreakerState::Open);

    let extractor = Extractor::new(gateway.clone(), fast_options(true), shared_breaker.clone());
    let deps = extractor.extract(ORDERS_SQL).await;

    // The batch ran, succeeded, and the breaker is clean again.
    assert_eq!(deps.lineage.column_edges.len(), 2);
    let guard = shared_breaker.lock().unwrap();
    assert_eq!(guard.state(), BreakerState::Closed);
    assert_eq!(guard.consecutive_failures(), 0);
}
