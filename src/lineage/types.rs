//! Core lineage types serialized into the per-file YAML artifact.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The role a table plays within one source file.
///
/// The model occasionally invents roles outside the expected set; those are
/// preserved verbatim rather than discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TableRole {
    Source,
    Target,
    Intermediate,
    Other(String),
}

impl From<String> for TableRole {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Self::Source,
            "target" => Self::Target,
            "intermediate" => Self::Intermediate,
            _ => Self::Other(s),
        }
    }
}

impl From<TableRole> for String {
    fn from(role: TableRole) -> Self {
        match role {
            TableRole::Source => "source".to_string(),
            TableRole::Target => "target".to_string(),
            TableRole::Intermediate => "intermediate".to_string(),
            TableRole::Other(s) => s,
        }
    }
}

/// A database table discovered in Pass 1, with columns attached in Pass 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub role: TableRole,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: TableRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            columns: Vec::new(),
        }
    }

    /// Attach the column list, dropping duplicates while preserving
    /// insertion order.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        let mut seen = HashSet::new();
        self.columns = columns
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
    }

    /// True once Pass 2 produced at least one column for this table.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// A 1-based inclusive source line span, plus the context-line counts
/// attached during snippet enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_line_before_start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_line_after_end_line: Option<usize>,
}

impl LineSpan {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
            count_line_before_start_line: None,
            count_line_after_end_line: None,
        }
    }
}

/// A table-level lineage edge discovered in Pass 3.
///
/// Invariant: both endpoints name validated tables from Pass 2; edges
/// referencing CTEs or unknown names are dropped before this type is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEdge {
    pub from_table: String,
    pub to_table: String,
    pub transformation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_lines: Option<LineSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_snippet: Option<String>,
}

/// A column-level lineage edge discovered in Pass 4, scoped to one
/// (from_table, to_table) pair from the Pass-3 edge list.
///
/// Column membership is best-effort: the model may cite a column missing
/// from the Pass-2 list, and that is not hard-enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub transformation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_lines: Option<LineSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_snippet: Option<String>,
}

/// Table-level and column-level edges for one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(default)]
    pub table_edges: Vec<TableEdge>,
    #[serde(default)]
    pub column_edges: Vec<ColumnEdge>,
}

/// The complete extraction result for one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlDependencies {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub lineage: Lineage,
}

impl SqlDependencies {
    /// True when Pass 1 found nothing (or aborted).
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Serialize to the YAML artifact format.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
