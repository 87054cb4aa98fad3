//! Run reporting.
//!
//! The DTO shapes are reserved for a future network sink (extraction-run
//! lifecycle, per-file reports, progress updates with throughput and ETA);
//! today every report terminates in structured console logging.

use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::lineage::SqlDependencies;

/// Whether the run may skip unchanged files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    Full,
    Incremental,
}

/// Lifecycle phase of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionPhase {
    Started,
    Completed,
    Failed,
}

/// Per-run aggregate statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    pub total_files: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Progress snapshot for a running extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressStatus {
    pub run_id: String,
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: Option<String>,
    /// Seconds, present once throughput is measurable.
    pub estimated_time_remaining: Option<f64>,
    /// Files per second.
    pub processing_speed: Option<f64>,
    pub error_count: usize,
    pub timestamp: u64,
}

/// Console reporter for one extraction run.
#[derive(Debug, Clone)]
pub struct Reporter {
    run_id: String,
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Report a run lifecycle transition.
    pub fn report_run(&self, mode: RunMode, phase: ExtractionPhase, stats: Option<&RunStats>) {
        match stats {
            Some(stats) => info!(
                run_id = %self.run_id,
                mode = ?mode,
                phase = ?phase,
                total = stats.total_files,
                processed = stats.processed,
                succeeded = stats.succeeded,
                failed = stats.failed,
                "extraction run"
            ),
            None => info!(
                run_id = %self.run_id,
                mode = ?mode,
                phase = ?phase,
                "extraction run"
            ),
        }
    }

    /// Report one file's extraction result.
    pub fn report_file(&self, path: &Path, deps: &SqlDependencies) {
        info!(
            run_id = %self.run_id,
            file = %path.display(),
            tables = deps.tables.len(),
            table_edges = deps.lineage.table_edges.len(),
            column_edges = deps.lineage.column_edges.len(),
            "file extraction"
        );
    }

    /// Report run progress with throughput and ETA when measurable.
    pub fn report_progress(
        &self,
        total_files: usize,
        processed_files: usize,
        current_file: Option<&Path>,
        started: Instant,
        error_count: usize,
    ) {
        let status = progress_status(
            &self.run_id,
            total_files,
            processed_files,
            current_file,
            started,
            error_count,
        );
        info!(
            run_id = %status.run_id,
            processed = status.processed_files,
            total = status.total_files,
            current = status.current_file.as_deref().unwrap_or("-"),
            speed = status.processing_speed.unwrap_or(0.0),
            eta_secs = status.estimated_time_remaining.unwrap_or(0.0),
            errors = status.error_count,
            "progress update"
        );
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_status(
    run_id: &str,
    total_files: usize,
    processed_files: usize,
    current_file: Option<&Path>,
    started: Instant,
    error_count: usize,
) -> ProgressStatus {
    let elapsed = started.elapsed().as_secs_f64();
    let processing_speed = (processed_files > 0 && elapsed > 0.0)
        .then(|| processed_files as f64 / elapsed);
    let estimated_time_remaining = processing_speed
        .filter(|speed| *speed > 0.0)
        .map(|speed| total_files.saturating_sub(processed_files) as f64 / speed);

    ProgressStatus {
        run_id: run_id.to_string(),
        total_files,
        processed_files,
        current_file: current_file.map(|p| p.display().to_string()),
        estimated_time_remaining,
        processing_speed,
        error_count,
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    }
}
