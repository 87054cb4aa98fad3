//! Prompt construction for the four extraction passes.
//!
//! Every pass receives the numbered source (lines prefixed `L<n>: `) so
//! the model can cite exact line ranges, and every prompt pins the exact
//! top-level key its answer must start with.

/// Pass 1: discover the real tables in the file.
pub fn pass1_tables(numbered_content: &str) -> String {
    format!(
        "### TASK: PASS 1 - EXTRACT TABLES ONLY\n\
         IMPORTANT: Output ONLY valid YAML. DO NOT include ANY explanations, thoughts, or text outside the YAML.\n\
         NO EXPLANATIONS. NO THINKING OUT LOUD. NO MARKDOWN CODE BLOCKS.\n\n\
         EXTRACT ALL TABLES THAT APPEAR IN THE SQL FILE.\n\
         EXCLUDE CTEs (Common Table Expressions defined with WITH clause) and any intermediate temporary results.\n\
         ONLY include actual database tables that are read from (FROM/JOIN clauses) or written to (INSERT/CREATE statements).\n\
         EXCLUDE templating variables.\n\
         DO NOT include any relationships between tables in this pass.\n\n\
         The SQL file below has line numbers prefixed (L1, L2, etc.).\n\n\
         SQL FILE:\n\n\
         {numbered_content}\n\n\
         Output MUST follow this EXACT structure, starting immediately with the \"tables:\" key:\n\
         tables:\n\
         \x20 - id: source_table_name\n\
         \x20   name: source_table_name\n\
         \x20   role: source\n\
         \x20 - id: target_table_name\n\
         \x20   name: target_table_name\n\
         \x20   role: target"
    )
}

/// Pass 2: full column list for one table.
pub fn pass2_columns(table_name: &str, numbered_content: &str) -> String {
    format!(
        "### TASK: PASS 2 - EXTRACT COLUMNS FOR TABLE '{table_name}'\n\
         IMPORTANT: You must output ONLY valid YAML. DO NOT include explanations, thoughts, or text outside the YAML.\n\n\
         Analyze this SQL file and identify ALL columns for the table '{table_name}'.\n\
         Focus EXCLUSIVELY on these elements in your YAML output:\n\
         1. ALL columns that appear in '{table_name}'\n\n\
         The SQL file below has line numbers prefixed (L1, L2, etc.).\n\n\
         SQL FILE:\n\n\
         {numbered_content}\n\n\
         Output MUST follow this EXACT structure, starting immediately with the \"table:\" key:\n\
         table:\n\
         \x20 name: {table_name}\n\
         \x20 columns:\n\
         \x20   - name: column1\n\
         \x20     data_type: string\n\
         \x20   - name: column2\n\
         \x20     data_type: integer"
    )
}

/// Pass 2 fallback: bare comma-separated column list, no structure.
pub fn pass2_columns_fallback(table_name: &str, numbered_content: &str) -> String {
    format!(
        "### TASK: EXTRACT COLUMNS FOR TABLE '{table_name}'\n\
         IMPORTANT: Output ONLY a comma-separated list of column names.\n\
         NO EXPLANATIONS. NO THINKING OUT LOUD. NO YAML STRUCTURE.\n\n\
         Look at the SQL file and identify ALL column names in table '{table_name}'.\n\
         Output ONLY a simple comma-separated list of column names, nothing else.\n\n\
         For example: column1,column2,column3,column4\n\n\
         SQL FILE:\n\
         {numbered_content}"
    )
}

/// Pass 3: relationships between the validated tables.
pub fn pass3_table_edges(table_names: &[String], numbered_content: &str) -> String {
    let table_list = table_names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "### TASK: PASS 3 - EXTRACT TABLE RELATIONSHIPS\n\
         IMPORTANT: Output ONLY valid YAML. DO NOT include ANY explanations, thoughts, or text outside the YAML.\n\n\
         Analyze this SQL file and identify how the following tables are related to each other:\n\
         TABLE LIST: {table_list}\n\n\
         CRITICAL CONSTRAINT: ONLY use tables from the TABLE LIST above.\n\
         DO NOT include CTEs (Common Table Expressions defined with WITH clause) or intermediate temporary results in your relationships.\n\n\
         Specifically focus on:\n\
         1. Which tables are source tables (read from) - ONLY from the TABLE LIST\n\
         2. Which tables are target tables (written to) - ONLY from the TABLE LIST\n\
         3. How these tables relate to each other (joins, inserts, etc.)\n\
         4. The exact line numbers where these relationships appear\n\n\
         DO NOT extract column-level relationships in this pass.\n\n\
         The SQL file below has line numbers prefixed (L1, L2, etc.).\n\n\
         SQL FILE:\n\n\
         {numbered_content}\n\n\
         Output MUST follow this EXACT structure, starting immediately with the \"table_edges:\" key:\n\
         table_edges:\n\
         \x20 - from_table: source_table_name\n\
         \x20   to_table: target_table_name\n\
         \x20   transformation_type: join|filter|aggregate|insert|etc\n\
         \x20   transformation_lines:\n\
         \x20     start_line: 10\n\
         \x20     end_line: 20"
    )
}

/// Pass 4: column lineage for a batch of table pairs, each rendered with
/// its known source and target columns.
pub fn pass4_column_edges(pairs_block: &str, numbered_content: &str) -> String {
    format!(
        "### TASK: PASS 4 - EXTRACT COLUMN LINEAGE FOR MULTIPLE TABLE PAIRS\n\
         IMPORTANT: Output ONLY valid YAML. DO NOT include ANY explanations, thoughts, or text outside the YAML.\n\
         NO EXPLANATIONS. NO THINKING OUT LOUD. NO MARKDOWN CODE BLOCKS.\n\n\
         Analyze this SQL file and identify how columns from each source table relate to columns in their respective target tables.\n\n\
         ANALYZE THE FOLLOWING TABLE PAIRS:\n\
         {pairs_block}\n\n\
         Focus EXCLUSIVELY on:\n\
         1. Which specific columns from source tables are used to create which specific columns in target tables\n\
         2. The exact transformation type applied (direct copy, case when, concat, math operation, etc.)\n\
         3. The exact line numbers where these column transformations occur\n\n\
         The SQL file below has line numbers prefixed (L1, L2, etc.).\n\n\
         SQL FILE:\n\n\
         {numbered_content}\n\n\
         Output MUST follow this EXACT structure, starting immediately with the \"column_edges:\" key:\n\
         column_edges:\n\
         \x20 - from_table: source_table_name\n\
         \x20   from_column: source_col_name\n\
         \x20   to_table: target_table_name\n\
         \x20   to_column: target_col_name\n\
         \x20   transformation_type: direct|case_when|concat|math|etc\n\
         \x20   transformation_lines:\n\
         \x20     start_line: 10\n\
         \x20     end_line: 20"
    )
}

/// Render one source/target pair with its known columns for the Pass-4
/// prompt.
pub fn pair_block(
    from_table: &str,
    from_columns: &[String],
    to_table: &str,
    to_columns: &[String],
) -> String {
    let quote = |columns: &[String]| {
        columns
            .iter()
            .map(|col| format!("'{col}'"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "SOURCE TABLE: '{from_table}'\nCOLUMNS: {}\n\nTARGET TABLE: '{to_table}'\nCOLUMNS: {}\n",
        quote(from_columns),
        quote(to_columns)
    )
}
