use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::executor::{ColumnSpec, CreateTableSpec};
use crate::tprintln;

/// Contents of a table's schema.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_type: String,
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub ddl: String,
}

impl TableSchema {
    pub fn from_spec(spec: &CreateTableSpec) -> Self {
        Self {
            table_type: "regular".into(),
            table: spec.table.clone(),
            columns: spec.columns.clone(),
            primary_key: spec.columns.iter().filter(|c| c.primary_key).map(|c| c.name.clone()).collect(),
            ddl: spec.to_sql(),
        }
    }

    pub fn column_names(&self) -> Vec<&str> { self.columns.iter().map(|c| c.name.as_str()).collect() }
}

pub(crate) fn save(path: &Path, schema: &TableSchema) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(schema)?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub(crate) fn load(path: &Path) -> anyhow::Result<TableSchema> {
    tprintln!("[SCHEMA] load: path='{}' exists={}", path.display(), path.exists());
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let schema = serde_json::from_str::<TableSchema>(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(schema)
}
