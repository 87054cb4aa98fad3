//! Raw response cleaning.
//!
//! Reasoning models leak `<think>` blocks, markdown fences, and prose
//! preambles around the YAML they were asked for. Cleaning runs on every
//! successful raw response before the sanitizer sees it.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think block regex"));
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```ya?ml\s*").expect("fence open regex"));
static FENCE_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```\s*$").expect("bare fence regex"));
static TAG_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

/// Strip reasoning leakage and keep only the YAML-looking tail of a
/// response. Returns an empty string when nothing YAML-shaped remains.
pub fn clean_response(response: &str) -> String {
    if response.is_empty() {
        return String::new();
    }

    let text = THINK_BLOCK.replace_all(response, "");
    let text = FENCE_OPEN.replace_all(&text, "");
    let text = FENCE_BARE.replace_all(&text, "");
    let text = TAG_MARKUP.replace_all(&text, "");

    let mut yaml_lines: Vec<&str> = Vec::new();
    let mut in_yaml = false;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if stripped.starts_with("tables:")
            || stripped.starts_with("lineage:")
            || stripped.starts_with("table_edges:")
            || stripped.starts_with("column_edges:")
            || stripped.starts_with("table:")
            || stripped.starts_with('-')
            || line.starts_with("  ")
        {
            in_yaml = true;
            yaml_lines.push(line);
        } else if stripped.contains(':') && !stripped.starts_with('#') && !stripped.starts_with("//")
        {
            // A key: value line outside the known heads still counts.
            in_yaml = true;
            yaml_lines.push(line);
        } else if in_yaml && (line.starts_with(' ') || stripped.starts_with('-')) {
            yaml_lines.push(line);
        }
        // Anything else is prose around the answer and is dropped.
    }

    yaml_lines.join("\n")
}
