//! Deterministic snippet enrichment.
//!
//! After all four passes, every edge carrying a line span is enriched with
//! the matching slice of the raw source plus up to two lines of context on
//! each side. No model call is involved, and repeated application with the
//! same bounds yields the same snippet and counts.

use super::types::{LineSpan, SqlDependencies};

/// Maximum context lines attached before and after a transformation span.
const CONTEXT_LINES: usize = 2;

/// Attach `transformation_snippet` and context counts to every edge in
/// `deps` that carries a line span. Edges without a span are untouched.
pub fn enrich_dependencies(deps: &mut SqlDependencies, source: &str) {
    let lines: Vec<&str> = source.lines().collect();

    for edge in &mut deps.lineage.table_edges {
        if let Some(span) = &mut edge.transformation_lines {
            edge.transformation_snippet = Some(enrich_span(span, &lines));
        }
    }
    for edge in &mut deps.lineage.column_edges {
        if let Some(span) = &mut edge.transformation_lines {
            edge.transformation_snippet = Some(enrich_span(span, &lines));
        }
    }
}

/// Clamp the context window to the file extents, record the counts on the
/// span, and return the snippet text.
fn enrich_span(span: &mut LineSpan, lines: &[&str]) -> String {
    let total = lines.len();
    let count_before = CONTEXT_LINES.min(span.start_line.saturating_sub(1));
    let count_after = CONTEXT_LINES.min(total.saturating_sub(span.end_line));

    let snippet_start = span.start_line.saturating_sub(1 + count_before);
    let snippet_end = (span.end_line + count_after).min(total);

    span.count_line_before_start_line = Some(count_before);
    span.count_line_after_end_line = Some(count_after);

    if snippet_start >= snippet_end {
        return String::new();
    }
    lines[snippet_start..snippet_end].join("\n")
}
