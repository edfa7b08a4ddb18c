use seedsync::{
    default_plan, extract_sections, generate, read_artifact, records_by_table, GenerateOptions,
};
use serde_json::json;
use tempfile::tempdir;

const CATEGORIES_DOC: &str = "# Production data missing on staging\n\
\n\
Categories -\n\
[\n\
  {\"id\": 1, \"name\": \"Dairy\"},\n\
  {\"id\": 2, \"name\": \"Produce\"}\n\
]\n\
\n";

#[test]
fn categories_document_yields_two_inserts() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("production-missing-data.md");
    let output = dir.path().join("production_data_inserts.sql");
    std::fs::write(&input, CATEGORIES_DOC).unwrap();

    let report = generate(&GenerateOptions {
        input,
        output: output.clone(),
        plan: default_plan(),
    })
    .unwrap();

    let sql = std::fs::read_to_string(&output).unwrap();
    let inserts: Vec<&str> = sql.lines().filter(|l| l.starts_with("INSERT")).collect();

    assert_eq!(
        inserts,
        vec![
            "INSERT INTO categories (id, name) VALUES (1, 'Dairy');",
            "INSERT INTO categories (id, name) VALUES (2, 'Produce');",
        ]
    );
    assert!(sql.starts_with("-- SQL INSERT statements generated from production-missing-data.md\n-- Generated on: "));
    assert_eq!(report.statement_count(), 2);
    assert_eq!(report.tables[0].columns, vec!["id", "name"]);
}

#[test]
fn generated_file_reads_back_into_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("seed.md");
    let output = dir.path().join("seed.sql");
    std::fs::write(
        &input,
        "Customers -\n\
[{\"id\": 1, \"name\": \"O'Neil, Pat\", \"vip\": true, \"notes\": null}]\n\
\n\
Packaging -\n\
[{\"id\": 3}]\n\
\n",
    )
    .unwrap();

    generate(&GenerateOptions {
        input,
        output: output.clone(),
        plan: default_plan(),
    })
    .unwrap();

    let parsed = read_artifact(&output).unwrap();
    assert_eq!(parsed.tables.len(), 1);

    let customer = &parsed.records("customers").unwrap()[0];
    assert_eq!(customer["name"], json!("O'Neil, Pat"));
    assert_eq!(customer["vip"], json!(true));
    assert_eq!(customer["notes"], json!(null));
    assert_eq!(customer["id"], json!(1));
}

#[test]
fn multiline_text_survives_generate_and_read_back() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("seed.md");
    let output = dir.path().join("seed.sql");
    let doc = "Customers -\n\
[{\"id\": 1, \"address\": \"12 Main St\\nFlat 4\"}, {\"id\": 2, \"note\": \"x\"}]\n\
\n";
    std::fs::write(&input, doc).unwrap();

    generate(&GenerateOptions {
        input,
        output: output.clone(),
        plan: default_plan(),
    })
    .unwrap();

    let parsed = read_artifact(&output).unwrap();
    let customers = parsed.records("customers").unwrap();
    assert_eq!(customers[0]["address"], json!("12 Main St\nFlat 4"));
    assert_eq!(customers[1]["address"], json!(null));

    // The REST rows are the rows the SQL file writes
    let plan = default_plan();
    let rows = records_by_table(&plan, &extract_sections(doc, &plan.sections));
    assert_eq!(rows[0].records, customers);
}
