//! # Filament
//!
//! LLM-driven table and column lineage extraction for SQL repositories.
//!
//! ## Architecture
//!
//! Filament drives a language model through a four-pass prompting protocol
//! and assembles the model's free-text answers into a validated lineage
//! graph:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           SQL / templated-SQL source files               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cache]      content-hash skip decision
//!                          ▼ [complexity] triage scoring
//! ┌─────────────────────────────────────────────────────────┐
//! │              Extractor (four-pass protocol)              │
//! │   Pass 1: tables   →  Pass 2: columns (per table)        │
//! │   Pass 3: table edges → Pass 4: column edges (batched)   │
//! └─────────────────────────────────────────────────────────┘
//!            │ prompts                      ▲ cleaned text
//!            ▼                              │
//! ┌─────────────────────────────────────────────────────────┐
//! │        ModelGateway (retry/backoff over HTTP)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sanitize] YAML recovery + normalization
//!                          ▼ [enrich]   source-line snippets
//! ┌─────────────────────────────────────────────────────────┐
//! │       SqlDependencies artifact (tables + lineage)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The model is treated as an unreliable collaborator: it may wrap output
//! in prose, emit invalid YAML, hallucinate tables, or fail outright. The
//! [`sanitize`] module never fails (bad input degrades to empty mappings),
//! Pass-3 edges are filtered against the validated table set, and the
//! Pass-4 batch operation is guarded by a circuit breaker.

pub mod cache;
pub mod complexity;
pub mod config;
pub mod extract;
pub mod gateway;
pub mod lineage;
pub mod sanitize;
pub mod service;

// Re-exports for convenient usage.
pub use cache::{CacheEntry, CacheStatus, ProcessCache};
pub use complexity::{assess_complexity, Assessment};
pub use extract::{CircuitBreaker, Extractor, ExtractorOptions};
pub use gateway::{ModelGateway, OpenAiGateway};
pub use lineage::{ColumnEdge, LineSpan, Lineage, SqlDependencies, Table, TableEdge, TableRole};
pub use service::{FileOutcome, LineageService};
