//! File-processing pipeline tests: cache gating, artifacts, folder runs.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filament::config::Settings;
use filament::gateway::ModelGateway;
use filament::service::{FileOutcome, LineageService, OutputLayout};
use filament::SqlDependencies;

/// Gateway scripted by prompt markers, counting every call.
struct ScriptedGateway {
    script: Vec<(String, String)>,
    calls: Mutex<usize>,
}

impl ScriptedGateway {
    fn new(script: &[(&str, &str)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(marker, response)| (marker.to_string(), response.to_string()))
                .collect(),
            calls: Mutex::new(0),
        }
    }

    fn total_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn call(&self, prompt: &str) -> String {
        *self.calls.lock().unwrap() += 1;
        self.script
            .iter()
            .find(|(marker, _)| prompt.contains(marker))
            .map(|(_, response)| response.clone())
            .unwrap_or_default()
    }
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
            "table_edges:\n  - from_table: orders\n    to_table: orders_summary\n    transformation_type: insert\n    transformation_lines:\n      start_line: 1\n      end_line: 4",
        ),
        (
            "PASS 4",
            "column_edges:\n  - from_table: orders\n    from_column: id\n    to_table: orders_summary\n    to_column: id\n    transformation_type: direct\n    transformation_lines:\n      start_line: 2\n      end_line: 2",
        ),
    ]
}

/// Settings pointed at a temp output dir with all pacing delays zeroed.
fn test_settings(base_dir: &Path, cache_enabled: bool) -> Settings {
    let mut settings = Settings::default();
    settings.output.base_dir = base_dir.to_path_buf();
    settings.cache.enabled = cache_enabled;
    settings.extraction.table_batch_pause_secs = 0;
    settings.extraction.pair_call_delay_secs = 0;
    settings
}

fn service(base_dir: &Path, gateway: Arc<ScriptedGateway>) -> Arc<LineageService> {
    Arc::new(LineageService::new(test_settings(base_dir, true), gateway))
}

#[tokio::test]
async fn test_process_writes_artifact_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.sql");
    fs::write(&source, ORDERS_SQL).unwrap();

    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = service(dir.path(), gateway.clone());

    let outcome = service.process_single(&source).await;
    let (yaml_path, tables, table_edges, column_edges) = match outcome {
        FileOutcome::Processed {
            yaml_path,
            tables,
            table_edges,
            column_edges,
        } => (yaml_path, tables, table_edges, column_edges),
        other => panic!("expected Processed, got {other:?}"),
    };

    assert_eq!(tables, 2);
    assert_eq!(table_edges, 1);
    assert_eq!(column_edges, 1);

    // The artifact parses back into the same shape, snippets included.
    let artifact = fs::read_to_string(&yaml_path).unwrap();
    let deps: SqlDependencies = serde_yaml::from_str(&artifact).unwrap();
    assert_eq!(deps.tables.len(), 2);
    assert!(deps.lineage.table_edges[0]
        .transformation_snippet
        .as_deref()
        .unwrap()
        .contains("INSERT INTO"));

    // The cache document landed under .cache/.
    assert!(dir.path().join(".cache/processed_files.yaml").exists());
}

#[tokio::test]
async fn test_unchanged_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.sql");
    fs::write(&source, ORDERS_SQL).unwrap();
    let layout = OutputLayout::individual(dir.path());

    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = service(dir.path(), gateway.clone());

    let first = service.process_file(&source, None, &layout).await;
    assert!(matches!(first, FileOutcome::Processed { .. }));
    let calls_after_first = gateway.total_calls();

    // Touch nothing: the second run skips without a single model call.
    let second = service.process_file(&source, None, &layout).await;
    assert!(matches!(second, FileOutcome::Skipped { yaml_path: Some(_) }));
    assert_eq!(gateway.total_calls(), calls_after_first);

    // A fresh service reloads the persisted cache and still skips.
    let fresh = LineageService::new(test_settings(dir.path(), true), gateway.clone());
    let third = fresh.process_file(&source, None, &layout).await;
    assert!(matches!(third, FileOutcome::Skipped { .. }));
    assert_eq!(gateway.total_calls(), calls_after_first);
}

#[tokio::test]
async fn test_changed_content_reprocesses() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.sql");
    fs::write(&source, ORDERS_SQL).unwrap();
    let layout = OutputLayout::individual(dir.path());

    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = service(dir.path(), gateway.clone());

    service.process_file(&source, None, &layout).await;
    let calls_after_first = gateway.total_calls();

    // One changed byte invalidates the entry even with mtime untouched.
    fs::write(&source, format!("{ORDERS_SQL};")).unwrap();
    let outcome = service.process_file(&source, None, &layout).await;
    assert!(matches!(outcome, FileOutcome::Processed { .. }));
    assert!(gateway.total_calls() > calls_after_first);
}

#[tokio::test]
async fn test_disabled_cache_always_reprocesses() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.sql");
    fs::write(&source, ORDERS_SQL).unwrap();
    let layout = OutputLayout::individual(dir.path());

    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = Arc::new(LineageService::new(
        test_settings(dir.path(), false),
        gateway.clone(),
    ));

    service.process_file(&source, None, &layout).await;
    let calls_after_first = gateway.total_calls();
    let outcome = service.process_file(&source, None, &layout).await;
    assert!(matches!(outcome, FileOutcome::Processed { .. }));
    assert!(gateway.total_calls() > calls_after_first);
}

#[tokio::test]
async fn test_empty_extraction_records_no_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.sql");
    fs::write(&source, "-- nothing but comments\n").unwrap();
    let layout = OutputLayout::individual(dir.path());

    // Pass 1 finds nothing for this file.
    let gateway = Arc::new(ScriptedGateway::new(&[]));
    let service = service(dir.path(), gateway.clone());

    let outcome = service.process_file(&source, None, &layout).await;
    assert_eq!(outcome, FileOutcome::NoDependencies);

    // The outcome is cached: an unchanged rerun skips the model entirely.
    let calls = gateway.total_calls();
    let second = service.process_file(&source, None, &layout).await;
    assert!(matches!(second, FileOutcome::Skipped { yaml_path: None }));
    assert_eq!(gateway.total_calls(), calls);
}

#[tokio::test]
async fn test_missing_file_fails_without_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("ghost.sql");
    let layout = OutputLayout::individual(dir.path());

    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = service(dir.path(), gateway.clone());

    let outcome = service.process_file(&missing, None, &layout).await;
    assert!(outcome.is_failure());
    assert!(!dir.path().join(".cache/processed_files.yaml").exists());
}

#[tokio::test]
async fn test_folder_run_mirrors_tree_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    fs::create_dir_all(repo.join("etl")).unwrap();
    fs::write(repo.join("orders.sql"), ORDERS_SQL).unwrap();
    fs::write(repo.join("etl/daily.sql"), ORDERS_SQL).unwrap();
    fs::write(repo.join("README.md"), "not sql").unwrap();

    let out = dir.path().join("out");
    let gateway = Arc::new(ScriptedGateway::new(&orders_script()));
    let service = Arc::new(LineageService::new(
        test_settings(&out, true),
        gateway.clone(),
    ));

    let stats = service.process_folder(&repo, 2).await;
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 0);

    assert!(out
        .join("repositories/orders_dependencies.yaml")
        .exists());
    assert!(out
        .join("repositories/etl/daily_dependencies.yaml")
        .exists());

    // Second run over the unchanged folder is a pure cache pass.
    let calls = gateway.total_calls();
    let stats = service.process_folder(&repo, 2).await;
    assert_eq!(stats.succeeded, 2);
    assert_eq!(gateway.total_calls(), calls);
}
