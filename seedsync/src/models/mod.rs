//! Domain models: records, sections and the migration plan.
//!
//! A [`MigrationPlan`] says which labeled sections to look for in the source
//! document and which of them become rows of which table. The built-in
//! [`default_plan`] covers the production seed document; other documents can
//! use a plan loaded from JSON.
//!
//! # Plan format
//!
//! ```json
//! {
//!   "sourceName": "production-missing-data.md",
//!   "priorityColumns": ["id", "created_at", "updated_at"],
//!   "sections": [
//!     { "name": "categories", "label": "Categories" },
//!     { "name": "delivery_partners", "label": "Delivery Partners", "terminator": "end_of_document" }
//!   ],
//!   "tables": [
//!     { "section": "categories", "table": "categories" }
//!   ]
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PlanError, PlanResult};

/// One destination row: field name → scalar value.
pub type Record = Map<String, Value>;

static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap());

/// How a section's JSON block ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// The closing `]` is followed by an empty line.
    #[default]
    BlankLine,
    /// The closing `]` is the last thing in the document.
    EndOfDocument,
}

/// A labeled region of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSpec {
    /// Name used in reports and table mappings
    pub name: String,
    /// Label text preceding the JSON block (matched literally)
    pub label: String,
    /// Block terminator
    #[serde(default)]
    pub terminator: Terminator,
}

impl SectionSpec {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            terminator: Terminator::BlankLine,
        }
    }

    pub fn at_end(mut self) -> Self {
        self.terminator = Terminator::EndOfDocument;
        self
    }
}

/// Section → destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub section: String,
    pub table: String,
}

impl TableMapping {
    pub fn new(section: &str, table: &str) -> Self {
        Self {
            section: section.to_string(),
            table: table.to_string(),
        }
    }
}

/// Sections to extract, tables to fill, and column ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    /// Name of the source document, written in the SQL header
    #[serde(default = "default_source_name")]
    pub source_name: String,

    /// Columns placed first (in this order) when present
    #[serde(default = "default_priority_columns")]
    pub priority_columns: Vec<String>,

    /// Sections, in extraction order
    pub sections: Vec<SectionSpec>,

    /// Table mappings, in output order
    pub tables: Vec<TableMapping>,
}

fn default_source_name() -> String {
    "production-missing-data.md".to_string()
}

fn default_priority_columns() -> Vec<String> {
    vec!["id".into(), "created_at".into(), "updated_at".into()]
}

impl MigrationPlan {
    /// Parse a plan from JSON and validate it.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        let plan: Self = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan file.
    pub fn from_file(path: &Path) -> PlanResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check names are unique, labels non-empty, and every mapping resolves.
    pub fn validate(&self) -> PlanResult<()> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.name.as_str()) {
                return Err(PlanError::DuplicateSection(section.name.clone()));
            }
            if section.label.trim().is_empty() {
                return Err(PlanError::EmptyLabel(section.name.clone()));
            }
        }

        for mapping in &self.tables {
            if !seen.contains(mapping.section.as_str()) {
                return Err(PlanError::UnknownSection {
                    section: mapping.section.clone(),
                    table: mapping.table.clone(),
                });
            }
            if !TABLE_NAME_RE.is_match(&mapping.table) {
                return Err(PlanError::InvalidTable(mapping.table.clone()));
            }
        }

        Ok(())
    }

    /// Destination table for a section, if it is mapped.
    pub fn table_for(&self, section: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|m| m.section == section)
            .map(|m| m.table.as_str())
    }

    /// Destination tables in output order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|m| m.table.as_str()).collect()
    }
}

impl Default for MigrationPlan {
    fn default() -> Self {
        default_plan()
    }
}

/// Plan for the production seed document.
///
/// `packaging`, `labels` and `order_items` are extracted but have no
/// destination table on staging.
pub fn default_plan() -> MigrationPlan {
    let sections = vec![
        SectionSpec::new("ingredients", "This is for ingredients table"),
        SectionSpec::new("product_ingredients", "Product recipes"),
        SectionSpec::new("products", "Products"),
        SectionSpec::new("product_variants", "Product variants"),
        SectionSpec::new("orders", "Orders"),
        SectionSpec::new("order_items", "Order items"),
        SectionSpec::new("categories", "Categories"),
        SectionSpec::new("packaging", "Packaging"),
        SectionSpec::new("labels", "Labels"),
        SectionSpec::new("customers", "Customers"),
        SectionSpec::new("production_batches", "Production batches"),
        SectionSpec::new("deliveries", "Deliveries"),
        SectionSpec::new("delivery_partners", "Delivery Partners").at_end(),
    ];

    let tables = [
        "ingredients",
        "product_ingredients",
        "products",
        "product_variants",
        "orders",
        "categories",
        "customers",
        "production_batches",
        "deliveries",
        "delivery_partners",
    ]
    .iter()
    .map(|name| TableMapping::new(name, name))
    .collect();

    MigrationPlan {
        source_name: default_source_name(),
        priority_columns: default_priority_columns(),
        sections,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_is_valid() {
        let plan = default_plan();
        plan.validate().unwrap();
        assert_eq!(plan.sections.len(), 13);
        assert_eq!(plan.tables.len(), 10);
        assert_eq!(
            plan.sections.last().unwrap().terminator,
            Terminator::EndOfDocument
        );
    }

    #[test]
    fn test_excluded_sections_have_no_table() {
        let plan = default_plan();
        assert_eq!(plan.table_for("packaging"), None);
        assert_eq!(plan.table_for("labels"), None);
        assert_eq!(plan.table_for("order_items"), None);
        assert_eq!(plan.table_for("categories"), Some("categories"));
    }

    #[test]
    fn test_plan_json_defaults() {
        let json = r#"{
            "sections": [{ "name": "cats", "label": "Categories" }],
            "tables": [{ "section": "cats", "table": "public.categories" }]
        }"#;
        let plan = MigrationPlan::from_json(json).unwrap();
        assert_eq!(plan.priority_columns, vec!["id", "created_at", "updated_at"]);
        assert_eq!(plan.sections[0].terminator, Terminator::BlankLine);
        assert_eq!(plan.table_for("cats"), Some("public.categories"));
    }

    #[test]
    fn test_plan_json_round_trip_keeps_terminator() {
        let json = default_plan().to_json().unwrap();
        assert!(json.contains("\"end_of_document\""));
        assert_eq!(MigrationPlan::from_json(&json).unwrap(), default_plan());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let json = r#"{
            "sections": [{ "name": "cats", "label": "Categories" }],
            "tables": [{ "section": "dogs", "table": "dogs" }]
        }"#;
        let err = MigrationPlan::from_json(json).unwrap_err();
        assert!(matches!(err, PlanError::UnknownSection { .. }));
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let plan = MigrationPlan {
            sections: vec![
                SectionSpec::new("a", "Alpha"),
                SectionSpec::new("a", "Again"),
            ],
            tables: vec![],
            ..default_plan()
        };
        assert!(matches!(plan.validate(), Err(PlanError::DuplicateSection(_))));
    }

    #[test]
    fn test_table_name_must_be_identifier() {
        let plan = MigrationPlan {
            sections: vec![SectionSpec::new("a", "Alpha")],
            tables: vec![TableMapping::new("a", "a; DROP TABLE b")],
            ..default_plan()
        };
        assert!(matches!(plan.validate(), Err(PlanError::InvalidTable(_))));
    }
}
