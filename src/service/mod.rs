//! File- and folder-level processing service.
//!
//! Ties the pipeline together per file: cache gate → complexity triage →
//! four-pass extraction → snippet enrichment → artifact write → cache
//! record. Folder runs fan files out under a bounded worker count;
//! per-file failures are reported and leave the cache untouched, so a
//! failed file stays eligible for retry on the next run.

mod output;
mod report;

pub use output::OutputLayout;
pub use report::{ExtractionPhase, ProgressStatus, Reporter, RunMode, RunStats};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::cache::{hash_bytes, CacheDecision, CacheEntry, CacheStatus, ProcessCache};
use crate::complexity::assess_complexity;
use crate::config::Settings;
use crate::extract::{CircuitBreaker, Extractor, ExtractorOptions};
use crate::gateway::ModelGateway;
use crate::lineage::enrich_dependencies;

/// Source extensions picked up by folder discovery.
const SOURCE_EXTENSIONS: [&str; 2] = ["sql", "jinja2"];

/// Errors internal to per-file processing; surfaced to callers as a
/// [`FileOutcome::Failed`].
#[derive(Debug, thiserror::Error)]
enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
}

/// Terminal status of one file within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Extraction produced an artifact.
    Processed {
        yaml_path: PathBuf,
        tables: usize,
        table_edges: usize,
        column_edges: usize,
    },
    /// Cache hit; the prior artifact location is echoed when known.
    Skipped { yaml_path: Option<PathBuf> },
    /// The protocol ran but found no tables.
    NoDependencies,
    /// Processing errored; no cache entry was written.
    Failed { message: String },
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One extraction run over files or folders.
///
/// Holds the single [`CircuitBreaker`] shared by every file of the run and
/// the processing cache guarding reprocessing.
pub struct LineageService {
    settings: Settings,
    gateway: Arc<dyn ModelGateway>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    cache: Mutex<ProcessCache>,
    reporter: Reporter,
}

impl LineageService {
    pub fn new(settings: Settings, gateway: Arc<dyn ModelGateway>) -> Self {
        let cache_dir = settings.output.base_dir.join(".cache");
        let cache = ProcessCache::load(&cache_dir, settings.cache.enabled);
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(
            settings.extraction.breaker_failure_threshold,
            Duration::from_secs(settings.extraction.breaker_cooldown_secs),
        )));

        Self {
            gateway,
            breaker,
            cache: Mutex::new(cache),
            reporter: Reporter::new(),
            settings,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    fn run_mode(&self) -> RunMode {
        if self.settings.cache.enabled {
            RunMode::Incremental
        } else {
            RunMode::Full
        }
    }

    /// Process one file end to end.
    ///
    /// `cache_key` defaults to the file path. All failures are caught at
    /// this boundary: the outcome reports them and the cache is left
    /// untouched.
    pub async fn process_file(
        &self,
        path: &Path,
        cache_key: Option<&str>,
        layout: &OutputLayout,
    ) -> FileOutcome {
        match self.try_process_file(path, cache_key, layout).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(file = %path.display(), error = %err, "file processing failed");
                FileOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn try_process_file(
        &self,
        path: &Path,
        cache_key: Option<&str>,
        layout: &OutputLayout,
    ) -> Result<FileOutcome, ServiceError> {
        let bytes = tokio::fs::read(path).await?;
        let content_hash = hash_bytes(&bytes);
        let key = cache_key
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        match self.lock_cache().decide(&key, &content_hash) {
            CacheDecision::Skip(entry) => {
                info!(file = %path.display(), "skipping, content unchanged");
                return Ok(FileOutcome::Skipped {
                    yaml_path: entry.yaml_path,
                });
            }
            CacheDecision::Process(reason) => {
                info!(file = %path.display(), reason, "processing");
            }
        }

        let source = String::from_utf8_lossy(&bytes).into_owned();

        // Triage only: complex files currently run the same whole-file
        // protocol, so the decision is informational.
        let assessment = assess_complexity(&source);
        if assessment.should_chunk {
            info!(
                file = %path.display(),
                score = assessment.score,
                inserts = assessment.insert_count,
                "complex file, running whole-file multi-pass analysis"
            );
        }

        let extractor = Extractor::new(
            self.gateway.clone(),
            ExtractorOptions::from(&self.settings.extraction),
            self.breaker.clone(),
        );
        let mut deps = extractor.extract(&source).await;

        if deps.is_empty() {
            warn!(file = %path.display(), "no tables or dependencies extracted");
            self.lock_cache().record(
                key,
                CacheEntry {
                    hash: content_hash,
                    yaml_path: None,
                    status: CacheStatus::NoDependenciesFound,
                },
            )?;
            return Ok(FileOutcome::NoDependencies);
        }

        enrich_dependencies(&mut deps, &source);
        let yaml_path = layout.write_artifact(path, &deps)?;

        self.lock_cache().record(
            key,
            CacheEntry {
                hash: content_hash,
                yaml_path: Some(yaml_path.clone()),
                status: CacheStatus::Success,
            },
        )?;

        self.reporter.report_file(path, &deps);

        Ok(FileOutcome::Processed {
            yaml_path,
            tables: deps.tables.len(),
            table_edges: deps.lineage.table_edges.len(),
            column_edges: deps.lineage.column_edges.len(),
        })
    }

    /// Process a single ad-hoc file with run lifecycle reporting.
    pub async fn process_single(self: &Arc<Self>, path: &Path) -> FileOutcome {
        let layout = OutputLayout::individual(&self.settings.output.base_dir);
        let started = Instant::now();

        self.reporter
            .report_run(self.run_mode(), ExtractionPhase::Started, None);
        self.reporter.report_progress(1, 0, Some(path), started, 0);

        let outcome = self.process_file(path, None, &layout).await;
        let failed = usize::from(outcome.is_failure());

        self.reporter
            .report_progress(1, 1, Some(path), started, failed);
        let stats = RunStats {
            total_files: 1,
            processed: 1,
            succeeded: 1 - failed,
            failed,
        };
        let phase = if failed == 0 {
            ExtractionPhase::Completed
        } else {
            ExtractionPhase::Failed
        };
        self.reporter.report_run(self.run_mode(), phase, Some(&stats));

        outcome
    }

    /// Discover and process every source file under `folder`, at most
    /// `workers` files in flight at once. Completion order across files is
    /// not guaranteed.
    pub async fn process_folder(self: &Arc<Self>, folder: &Path, workers: usize) -> RunStats {
        let files = discover_sources(folder);
        let total = files.len();
        let started = Instant::now();

        info!(folder = %folder.display(), files = total, "starting folder run");
        self.reporter
            .report_run(self.run_mode(), ExtractionPhase::Started, None);

        let layout = Arc::new(OutputLayout::repository(
            &self.settings.output.base_dir,
            folder,
        ));
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(total);
        for path in files {
            let service = Arc::clone(self);
            let layout = Arc::clone(&layout);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let errors = Arc::clone(&errors);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                let outcome = service.process_file(&path, None, &layout).await;

                if outcome.is_failure() {
                    errors.fetch_add(1, Ordering::Relaxed);
                }
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                service.reporter.report_progress(
                    total,
                    done,
                    Some(&path),
                    started,
                    errors.load(Ordering::Relaxed),
                );
                outcome
            }));
        }

        let mut stats = RunStats {
            total_files: total,
            ..RunStats::default()
        };
        for handle in handles {
            match handle.await {
                Ok(outcome) => {
                    stats.processed += 1;
                    if outcome.is_failure() {
                        stats.failed += 1;
                    } else {
                        stats.succeeded += 1;
                    }
                }
                Err(err) => {
                    error!(error = %err, "worker task panicked");
                    stats.processed += 1;
                    stats.failed += 1;
                }
            }
        }

        let phase = if stats.failed == 0 {
            ExtractionPhase::Completed
        } else {
            ExtractionPhase::Failed
        };
        self.reporter.report_run(self.run_mode(), phase, Some(&stats));
        stats
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ProcessCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Recursively collect `.sql` / `.jinja2` files under `folder`, sorted for
/// deterministic scheduling.
fn discover_sources(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
