//! The four-pass extraction protocol.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::breaker::CircuitBreaker;
use super::prompts;
use crate::config::ExtractionSettings;
use crate::gateway::ModelGateway;
use crate::lineage::{numbered_content, ColumnEdge, Lineage, SqlDependencies, Table, TableEdge};
use crate::sanitize::{
    extract_yaml_between_codeblocks, normalize, parse_comma_separated_columns, safe_yaml_load,
};

/// Tuning knobs for the orchestrator, derived from
/// [`ExtractionSettings`].
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Fan out independent calls within a pass.
    pub concurrent: bool,
    /// Pass-2 tables per concurrent batch.
    pub table_batch_size: usize,
    /// Pause between Pass-2 batches.
    pub table_batch_pause: Duration,
    /// Pass-4 table pairs per batch call.
    pub pair_batch_size: usize,
    /// Fixed delay before every Pass-4 batch call.
    pub pair_call_delay: Duration,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self::from(&ExtractionSettings::default())
    }
}

impl From<&ExtractionSettings> for ExtractorOptions {
    fn from(settings: &ExtractionSettings) -> Self {
        Self {
            concurrent: settings.concurrent,
            table_batch_size: settings.table_batch_size.max(1),
            table_batch_pause: Duration::from_secs(settings.table_batch_pause_secs),
            pair_batch_size: settings.pair_batch_size.max(1),
            pair_call_delay: Duration::from_secs(settings.pair_call_delay_secs),
        }
    }
}

/// Drives the four dependent passes for one source file.
pub struct Extractor {
    gateway: Arc<dyn ModelGateway>,
    options: ExtractorOptions,
    breaker: Arc<Mutex<CircuitBreaker>>,
}

impl Extractor {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        options: ExtractorOptions,
        breaker: Arc<Mutex<CircuitBreaker>>,
    ) -> Self {
        Self {
            gateway,
            options,
            breaker,
        }
    }

    /// Run the full protocol over one file's source text.
    ///
    /// Returns an empty [`SqlDependencies`] when Pass 1 yields nothing;
    /// later passes degrade independently without aborting the file.
    pub async fn extract(&self, source: &str) -> SqlDependencies {
        let numbered = numbered_content(source);

        info!("starting four-pass analysis");

        let Some(tables) = self.pass1_tables(&numbered).await else {
            warn!("pass 1 found no tables, aborting file");
            return SqlDependencies::default();
        };

        let tables = self.pass2_columns(&numbered, tables).await;
        let table_edges = self.pass3_table_edges(&numbered, &tables).await;
        let column_edges = self
            .pass4_column_edges(&numbered, &tables, &table_edges)
            .await;

        info!(
            tables = tables.len(),
            table_edges = table_edges.len(),
            column_edges = column_edges.len(),
            "four-pass analysis complete"
        );

        SqlDependencies {
            tables,
            lineage: Lineage {
                table_edges,
                column_edges,
            },
        }
    }

    /// Pass 1: one call discovering the tables in the file. CTE and
    /// template-variable exclusion is enforced by prompt wording only.
    async fn pass1_tables(&self, numbered: &str) -> Option<Vec<Table>> {
        debug!("pass 1: extracting tables");
        let response = self.gateway.call(&prompts::pass1_tables(numbered)).await;
        if response.is_empty() {
            return None;
        }

        let map = safe_yaml_load(&extract_yaml_between_codeblocks(&response));
        let tables = normalize::tables(&map);
        if tables.is_empty() {
            return None;
        }

        debug!(count = tables.len(), "pass 1 complete");
        Some(tables)
    }

    /// Pass 2: one call per table asking for its full column list, with a
    /// plain-text fallback when the structured answer does not parse.
    async fn pass2_columns(&self, numbered: &str, mut tables: Vec<Table>) -> Vec<Table> {
        if tables.is_empty() {
            return tables;
        }
        debug!(count = tables.len(), "pass 2: extracting columns");

        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let mut collected: HashMap<String, Vec<String>> = HashMap::new();

        if self.options.concurrent {
            let batches: Vec<&[String]> = names.chunks(self.options.table_batch_size).collect();
            let batch_count = batches.len();

            for (index, batch) in batches.into_iter().enumerate() {
                if index > 0 {
                    debug!("pausing before next table batch");
                    tokio::time::sleep(self.options.table_batch_pause).await;
                }
                debug!(
                    batch = index + 1,
                    batches = batch_count,
                    tables = batch.len(),
                    "gathering columns for batch"
                );
                let results = join_all(
                    batch
                        .iter()
                        .map(|name| self.table_columns(numbered, name)),
                )
                .await;
                for (name, columns) in results.into_iter().flatten() {
                    collected.insert(name, columns);
                }
            }
        } else {
            for name in &names {
                if let Some((name, columns)) = self.table_columns(numbered, name).await {
                    collected.insert(name, columns);
                }
            }
        }

        for table in &mut tables {
            if let Some(columns) = collected.remove(&table.name) {
                debug!(table = %table.name, count = columns.len(), "columns attached");
                table.set_columns(columns);
            }
        }
        tables
    }

    /// Column discovery for one table: structured call first, then the
    /// comma-separated fallback. Both failing leaves the table columnless.
    async fn table_columns(&self, numbered: &str, table_name: &str) -> Option<(String, Vec<String>)> {
        let response = self
            .gateway
            .call(&prompts::pass2_columns(table_name, numbered))
            .await;
        if response.is_empty() {
            debug!(table = table_name, "pass 2 call failed, skipping table");
            return None;
        }

        // Answers that start mid-structure still parse once the expected
        // top-level key is restored.
        let response = if response.trim_start().starts_with("table:") {
            response
        } else {
            format!("table:\n{response}")
        };

        let map = safe_yaml_load(&extract_yaml_between_codeblocks(&response));
        if let Some((name, columns)) = normalize::table_columns(&map) {
            if !columns.is_empty() {
                return Some((name, columns));
            }
        }

        debug!(table = table_name, "structured columns unparseable, trying fallback");
        self.table_columns_fallback(numbered, table_name).await
    }

    async fn table_columns_fallback(
        &self,
        numbered: &str,
        table_name: &str,
    ) -> Option<(String, Vec<String>)> {
        let response = self
            .gateway
            .call(&prompts::pass2_columns_fallback(table_name, numbered))
            .await;
        if response.is_empty() {
            return None;
        }

        let columns = parse_comma_separated_columns(&response);
        if columns.is_empty() {
            debug!(table = table_name, "fallback column list empty, skipping table");
            return None;
        }
        Some((table_name.to_string(), columns))
    }

    /// Pass 3: one call over the validated table-name list; edges naming
    /// anything outside that exact set are dropped.
    async fn pass3_table_edges(&self, numbered: &str, tables: &[Table]) -> Vec<TableEdge> {
        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        if names.is_empty() {
            debug!("no table names for pass 3, skipping");
            return Vec::new();
        }
        debug!("pass 3: extracting table relationships");

        let response = self
            .gateway
            .call(&prompts::pass3_table_edges(&names, numbered))
            .await;
        if response.is_empty() {
            return Vec::new();
        }

        let map = safe_yaml_load(&extract_yaml_between_codeblocks(&response));
        let edges = normalize::table_edges(&map);

        let valid: HashSet<&str> = names.iter().map(String::as_str).collect();
        let total = edges.len();
        let kept: Vec<TableEdge> = edges
            .into_iter()
            .filter(|edge| {
                let ok = valid.contains(edge.from_table.as_str())
                    && valid.contains(edge.to_table.as_str());
                if !ok {
                    debug!(
                        from = %edge.from_table,
                        to = %edge.to_table,
                        "dropped edge referencing unvalidated table"
                    );
                }
                ok
            })
            .collect();

        debug!(
            kept = kept.len(),
            dropped = total - kept.len(),
            "pass 3 complete"
        );
        kept
    }

    /// Pass 4: column lineage for every (from, to) pair whose tables both
    /// have known columns, batched and guarded by the circuit breaker.
    async fn pass4_column_edges(
        &self,
        numbered: &str,
        tables: &[Table],
        table_edges: &[TableEdge],
    ) -> Vec<ColumnEdge> {
        if table_edges.is_empty() {
            debug!("no table relationships for pass 4, skipping");
            return Vec::new();
        }

        let columns: HashMap<&str, &[String]> = tables
            .iter()
            .filter(|t| t.has_columns())
            .map(|t| (t.name.as_str(), t.columns.as_slice()))
            .collect();

        let pairs: Vec<(String, String)> = table_edges
            .iter()
            .filter(|edge| {
                columns.contains_key(edge.from_table.as_str())
                    && columns.contains_key(edge.to_table.as_str())
            })
            .map(|edge| (edge.from_table.clone(), edge.to_table.clone()))
            .collect();

        if pairs.is_empty() {
            debug!("no qualifying table pairs for pass 4, skipping");
            return Vec::new();
        }

        let batches: Vec<&[(String, String)]> = pairs.chunks(self.options.pair_batch_size).collect();
        debug!(
            pairs = pairs.len(),
            batches = batches.len(),
            "pass 4: extracting column lineage"
        );

        let mut edges = Vec::new();
        if self.options.concurrent {
            let results = join_all(
                batches
                    .iter()
                    .enumerate()
                    .map(|(index, batch)| self.column_batch(numbered, batch, &columns, index)),
            )
            .await;
            edges.extend(results.into_iter().flatten());
        } else {
            for (index, batch) in batches.iter().enumerate() {
                edges.extend(self.column_batch(numbered, batch, &columns, index).await);
            }
        }

        debug!(count = edges.len(), "pass 4 complete");
        edges
    }

    /// One Pass-4 batch call. The breaker refuses outright while open;
    /// an exhausted gateway call records a failure, anything parsed (even
    /// zero edges) records a success.
    async fn column_batch(
        &self,
        numbered: &str,
        batch: &[(String, String)],
        columns: &HashMap<&str, &[String]>,
        index: usize,
    ) -> Vec<ColumnEdge> {
        if !self.lock_breaker().try_acquire() {
            debug!(batch = index + 1, "circuit breaker open, skipping batch");
            return Vec::new();
        }

        let pairs_block = batch
            .iter()
            .map(|(from, to)| {
                prompts::pair_block(
                    from,
                    columns.get(from.as_str()).copied().unwrap_or(&[]),
                    to,
                    columns.get(to.as_str()).copied().unwrap_or(&[]),
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n");

        // Fixed pre-call delay in both modes to spread request load.
        tokio::time::sleep(self.options.pair_call_delay).await;

        let response = self
            .gateway
            .call(&prompts::pass4_column_edges(&pairs_block, numbered))
            .await;
        if response.is_empty() {
            warn!(batch = index + 1, "column lineage batch failed");
            self.lock_breaker().record_failure();
            return Vec::new();
        }

        let map = safe_yaml_load(&extract_yaml_between_codeblocks(&response));
        let edges = normalize::column_edges(&map);
        self.lock_breaker().record_success();
        debug!(batch = index + 1, count = edges.len(), "batch complete");
        edges
    }

    fn lock_breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
