//! File complexity triage.
//!
//! Scores a source file before it enters the pipeline and decides whether
//! it needs special handling. This is a heuristic gate only: the current
//! chunking path degrades to running the same multi-pass analysis on the
//! whole file, so the decision today affects routing and logging, not the
//! protocol itself.

/// The outcome of scoring one source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub should_chunk: bool,
    pub insert_count: usize,
}

/// Score a file's complexity from line-level keyword counts.
///
/// Weights: 2.0 per INSERT INTO line, 0.5 per SELECT line, 1.5 per JOIN
/// line, 1.0 per WITH … AS line, plus 0.1 per line of the file. Chunking
/// triggers on score > 50, more than 200 lines, more than 5 inserts, or
/// more than 10 joins.
pub fn assess_complexity(content: &str) -> Assessment {
    let mut total_lines = 0usize;
    let mut insert_count = 0usize;
    let mut select_count = 0usize;
    let mut join_count = 0usize;
    let mut cte_count = 0usize;

    for line in content.lines() {
        total_lines += 1;
        let lower = line.to_ascii_lowercase();
        if lower.contains("insert") && lower.contains("into") {
            insert_count += 1;
        }
        if lower.contains("select") {
            select_count += 1;
        }
        if lower.contains("join") {
            join_count += 1;
        }
        if lower.contains("with") && lower.contains("as") {
            cte_count += 1;
        }
    }

    let score = (insert_count as f64) * 2.0
        + (select_count as f64) * 0.5
        + (join_count as f64) * 1.5
        + (cte_count as f64) * 1.0
        + (total_lines as f64) * 0.1;

    let should_chunk =
        score > 50.0 || total_lines > 200 || insert_count > 5 || join_count > 10;

    Assessment {
        score,
        should_chunk,
        insert_count,
    }
}
