//! Response sanitizer.
//!
//! Turns an arbitrary model text blob into a best-effort structured
//! mapping. The model may wrap its answer in prose, markdown fences, or
//! reasoning tags, and source files may leak templating syntax (`{{ … }}`,
//! `{% … %}`) that is not valid YAML. The contract at this boundary is
//! total: every function returns a (possibly empty) value and never fails,
//! so a bad response degrades to reduced output instead of aborting a file.
//!
//! [`normalize`] converts the recovered mappings into the canonical
//! [`crate::lineage`] types exactly once; downstream code never guards
//! against shape variance again.

pub mod normalize;

use once_cell::sync::Lazy;
use regex::{Captures, Regex, Replacer};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use tracing::debug;

/// Top-level keys that mark a blob as one of our YAML answers.
const YAML_KEYS: [&str; 5] = ["tables:", "lineage:", "table:", "column_edges:", "table_edges:"];

static FENCED_YAML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```yaml\s*(.*?)\s*```").expect("fenced yaml regex"));
static FENCED_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("fenced block regex"));
static JINJA_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{.*?\}\}").expect("jinja expr regex"));
static JINJA_STMT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{%.*?%\}").expect("jinja stmt regex"));

/// Extract the YAML portion of a response.
///
/// Resolution order: text that already starts with a recognized top-level
/// key is returned as-is; otherwise a ```yaml fence wins, then any fence,
/// then the raw text if a recognized key appears anywhere. Text with no
/// recognizable YAML comes back unchanged for the loader to reject.
pub fn extract_yaml_between_codeblocks(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if YAML_KEYS.iter().any(|key| trimmed.starts_with(key)) {
        return trimmed.to_string();
    }

    if let Some(caps) = FENCED_YAML.captures(content) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = FENCED_ANY.captures(content) {
        return caps[1].trim().to_string();
    }

    trimmed.to_string()
}

/// Parse YAML without ever failing.
///
/// Empty or non-mapping input yields an empty mapping. Text carrying
/// templating expressions has them swapped for unique placeholders before
/// parsing, with the original expressions restored inside every string
/// value of the result. `{{ … }}` must take that path even when the parser
/// would accept it: it reads as a nested flow mapping and the expression
/// text would be silently destructured instead of preserved.
pub fn safe_yaml_load(content: &str) -> Mapping {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Mapping::new();
    }

    if JINJA_EXPR.is_match(trimmed) || JINJA_STMT.is_match(trimmed) {
        return load_with_template_placeholders(trimmed);
    }

    match serde_yaml::from_str::<Value>(trimmed) {
        Ok(Value::Mapping(map)) => map,
        Ok(other) => {
            debug!(kind = value_kind(&other), "yaml parsed to a non-mapping");
            Mapping::new()
        }
        Err(err) => {
            debug!(error = %err, "yaml unparseable");
            Mapping::new()
        }
    }
}

/// Mask `{{ … }}` / `{% … %}` spans, parse, restore the spans in strings.
fn load_with_template_placeholders(content: &str) -> Mapping {
    let mut placeholders: HashMap<String, String> = HashMap::new();
    let mut counter = 0usize;

    let mut mask = |caps: &Captures| -> String {
        let token = format!("JINJA_PLACEHOLDER_{counter}");
        counter += 1;
        placeholders.insert(token.clone(), caps[0].to_string());
        token
    };

    let masked = JINJA_EXPR.replace_all(content, mask.by_ref()).into_owned();
    let masked = JINJA_STMT.replace_all(&masked, mask.by_ref()).into_owned();

    // Longest token first: `JINJA_PLACEHOLDER_1` is a prefix of
    // `JINJA_PLACEHOLDER_10` and must not shadow it during restoration.
    let mut ordered: Vec<(String, String)> = placeholders.into_iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| b.0.cmp(&a.0)));

    match serde_yaml::from_str::<Value>(&masked) {
        Ok(value) => {
            let restored = restore_placeholders(value, &ordered);
            match restored {
                Value::Mapping(map) => map,
                _ => Mapping::new(),
            }
        }
        Err(err) => {
            debug!(error = %err, "yaml unrecoverable after template masking");
            Mapping::new()
        }
    }
}

/// Recursively substitute placeholder tokens back into string values.
fn restore_placeholders(value: Value, placeholders: &[(String, String)]) -> Value {
    match value {
        Value::String(mut s) => {
            for (token, original) in placeholders {
                if s.contains(token.as_str()) {
                    s = s.replace(token.as_str(), original);
                }
            }
            Value::String(s)
        }
        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter()
                .map(|v| restore_placeholders(v, placeholders))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, restore_placeholders(v, placeholders)))
                .collect(),
        ),
        other => other,
    }
}

/// Parse a free-text answer into a column list by isolating the densest
/// comma-separated segment.
///
/// Used by the Pass-2 fallback: the model is asked for a bare
/// comma-separated list but often surrounds it with prose. The text is
/// split on newlines, colons, and periods, and the segment containing the
/// most commas is taken as the list.
pub fn parse_comma_separated_columns(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let segment = if trimmed.contains(',') {
        trimmed
            .split(['\n', ':', '.'])
            .max_by_key(|part| part.matches(',').count())
            .unwrap_or(trimmed)
    } else {
        trimmed
    };

    segment
        .split(',')
        .map(str::trim)
        .filter(|col| !col.is_empty())
        .map(str::to_string)
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
