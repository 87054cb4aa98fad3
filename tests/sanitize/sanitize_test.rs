//! End-to-end sanitizer behavior over realistic model responses.

use filament::gateway::clean_response;
use filament::sanitize::{
    extract_yaml_between_codeblocks, normalize, parse_comma_separated_columns, safe_yaml_load,
};
use serde_yaml::Value;

#[test]
fn test_empty_input_yields_empty_mapping() {
    assert!(safe_yaml_load("").is_empty());
    assert!(safe_yaml_load("   ").is_empty());
    assert!(safe_yaml_load("\n\n").is_empty());
}

#[test]
fn test_scalar_result_yields_empty_mapping() {
    assert!(safe_yaml_load("the file defines no tables").is_empty());
}

#[test]
fn test_jinja_expression_survives_parsing() {
    let yaml = "tables:\n  - id: {{ source_table }}\n    name: {{ source_table }}\n    role: source";
    let map = safe_yaml_load(yaml);
    let tables = map.get("tables").and_then(Value::as_sequence).unwrap();
    let name = tables[0]
        .as_mapping()
        .and_then(|t| t.get("name"))
        .and_then(Value::as_str)
        .unwrap();
    assert_eq!(name, "{{ source_table }}");
}

#[test]
fn test_many_placeholders_restore_cleanly() {
    // More than ten expressions: placeholder tokens share prefixes and
    // must not corrupt each other during restoration.
    let items: Vec<String> = (0..12)
        .map(|i| format!("  - id: t{i}\n    name: {{{{ var_{i} }}}}\n    role: source"))
        .collect();
    let yaml = format!("tables:\n{}", items.join("\n"));

    let map = safe_yaml_load(&yaml);
    let tables = map.get("tables").and_then(Value::as_sequence).unwrap();
    assert_eq!(tables.len(), 12);
    for (i, table) in tables.iter().enumerate() {
        let name = table
            .as_mapping()
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(name, format!("{{{{ var_{i} }}}}"));
    }
}

#[test]
fn test_fenced_response_round_trip() {
    let response = "Here is the analysis you requested.\n\
                    ```yaml\n\
                    tables:\n\
                    \x20 - id: orders\n\
                    \x20   name: orders\n\
                    \x20   role: source\n\
                    ```\n\
                    Let me know if you need anything else.";
    let yaml = extract_yaml_between_codeblocks(response);
    let tables = normalize::tables(&safe_yaml_load(&yaml));
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "orders");
}

#[test]
fn test_reasoning_leakage_is_cleaned_then_parsed() {
    let response = "<think>\nThe file inserts into orders_summary from orders.\n</think>\n\
                    table_edges:\n\
                    \x20 - from_table: orders\n\
                    \x20   to_table: orders_summary\n\
                    \x20   transformation_type: insert\n\
                    \x20   transformation_lines:\n\
                    \x20     start_line: 1\n\
                    \x20     end_line: 4";
    let cleaned = clean_response(response);
    let edges = normalize::table_edges(&safe_yaml_load(&extract_yaml_between_codeblocks(&cleaned)));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from_table, "orders");
    let span = edges[0].transformation_lines.as_ref().unwrap();
    assert_eq!((span.start_line, span.end_line), (1, 4));
}

#[test]
fn test_fallback_column_list_with_prose() {
    let response = "The table has these columns: \n\
                    order_id, customer_id, amount, status, created_at\n\
                    That is all I could find.";
    let columns = parse_comma_separated_columns(response);
    assert_eq!(
        columns,
        vec!["order_id", "customer_id", "amount", "status", "created_at"]
    );
}

#[test]
fn test_normalization_tolerates_key_variants() {
    let yaml = "column_edges:\n\
                \x20 - from: orders\n\
                \x20   from_column: id\n\
                \x20   to: orders_summary\n\
                \x20   to_column: id\n\
                \x20   transformation_type: direct";
    let edges = normalize::column_edges(&safe_yaml_load(yaml));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to_table, "orders_summary");
}
