//! Normalization of recovered YAML mappings into canonical lineage types.
//!
//! Model output is duck-typed: columns arrive as strings or as
//! `{name, data_type}` mappings, edges use `from_table` or plain `from`,
//! line spans are mappings with integer-or-string values. All of that
//! variance is absorbed here, once, at the sanitizer boundary. Entries that
//! cannot be coerced are dropped rather than failing the batch.

use serde_yaml::{Mapping, Value};

use crate::lineage::{ColumnEdge, LineSpan, Table, TableEdge, TableRole};

/// Pull the Pass-1 `tables:` list out of a recovered mapping.
///
/// Entries without a usable `name` are dropped; a missing `id` falls back
/// to the name and a missing `role` to `intermediate`.
pub fn tables(map: &Mapping) -> Vec<Table> {
    let Some(entries) = map.get("tables").and_then(Value::as_sequence) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_mapping()?;
            let name = non_empty_str(entry, &["name"])?;
            let id = non_empty_str(entry, &["id"]).unwrap_or_else(|| name.clone());
            let role = non_empty_str(entry, &["role"])
                .map(TableRole::from)
                .unwrap_or(TableRole::Intermediate);
            Some(Table::new(id, name, role))
        })
        .collect()
}

/// Pull the Pass-2 `table:` answer (name plus column list) out of a
/// recovered mapping. Columns may be bare strings or `{name, …}` mappings.
pub fn table_columns(map: &Mapping) -> Option<(String, Vec<String>)> {
    let table = map.get("table").and_then(Value::as_mapping)?;
    let name = non_empty_str(table, &["name"])?;

    let columns = match table.get("columns") {
        Some(Value::Sequence(seq)) => seq.iter().filter_map(column_name).collect(),
        _ => Vec::new(),
    };

    Some((name, columns))
}

/// Pull the Pass-3 `table_edges:` list out of a recovered mapping.
pub fn table_edges(map: &Mapping) -> Vec<TableEdge> {
    edge_entries(map, "table_edges")
        .filter_map(|entry| {
            Some(TableEdge {
                from_table: non_empty_str(entry, &["from_table", "from"])?,
                to_table: non_empty_str(entry, &["to_table", "to"])?,
                transformation_type: non_empty_str(entry, &["transformation_type"])
                    .unwrap_or_else(|| "unknown".to_string()),
                transformation_lines: line_span(entry),
                transformation_snippet: None,
            })
        })
        .collect()
}

/// Pull the Pass-4 `column_edges:` list out of a recovered mapping.
pub fn column_edges(map: &Mapping) -> Vec<ColumnEdge> {
    edge_entries(map, "column_edges")
        .filter_map(|entry| {
            Some(ColumnEdge {
                from_table: non_empty_str(entry, &["from_table", "from"])?,
                from_column: non_empty_str(entry, &["from_column"])?,
                to_table: non_empty_str(entry, &["to_table", "to"])?,
                to_column: non_empty_str(entry, &["to_column"])?,
                transformation_type: non_empty_str(entry, &["transformation_type"])
                    .unwrap_or_else(|| "unknown".to_string()),
                transformation_lines: line_span(entry),
                transformation_snippet: None,
            })
        })
        .collect()
}

fn edge_entries<'a>(map: &'a Mapping, key: &str) -> impl Iterator<Item = &'a Mapping> {
    map.get(key)
        .and_then(Value::as_sequence)
        .map(|seq| seq.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_mapping)
}

/// First non-empty string value among the candidate keys, trimmed.
fn non_empty_str(map: &Mapping, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let trimmed = map.get(*key)?.as_str()?.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// A column entry is either a bare string or a mapping carrying `name`.
fn column_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Mapping(map) => non_empty_str(map, &["name"]),
        _ => None,
    }
}

/// Coerce `transformation_lines: {start_line, end_line}`, tolerating
/// numbers that arrive as strings. Spans missing either bound are dropped.
fn line_span(entry: &Mapping) -> Option<LineSpan> {
    let lines = entry.get("transformation_lines")?.as_mapping()?;
    let start = line_number(lines.get("start_line")?)?;
    let end = line_number(lines.get("end_line")?)?;
    Some(LineSpan::new(start, end))
}

fn line_number(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
