//! Field metadata store
//! --------------------
//! Each entity type gets a side table `(id, field_name, field_type)` listing its
//! declared fields in declaration order. `field_type` holds the raw spec as JSON
//! array text, lowercase type name first. Rows are append-only.

use anyhow::anyhow;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::catalog::ColumnType;
use crate::error::{ExecFailure, RegistryError, Result};
use crate::executor::{ColumnSpec, CreateTableSpec, SchemaExecutor};
use crate::field_spec::{FieldSet, FieldSpec};
use crate::ident::ID_COLUMN;

pub const FIELD_NAME_COLUMN: &str = "field_name";
pub const FIELD_TYPE_COLUMN: &str = "field_type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadataRecord {
    pub id: i64,
    pub field_name: String,
    pub field_type: String,
}

impl FieldMetadataRecord {
    pub fn decode(&self) -> anyhow::Result<FieldSpec> {
        FieldSpec::decode(&self.field_type)
            .map_err(|e| anyhow!("corrupt field spec for '{}' (id {}): {}", self.field_name, self.id, e))
    }
}

/// Fixed schema of every field metadata table.
pub fn fields_table_spec(table: &str) -> CreateTableSpec {
    CreateTableSpec::new(table)
        .column(ColumnSpec::identifier(ID_COLUMN))
        .column(ColumnSpec::new(FIELD_NAME_COLUMN, ColumnType::Varchar))
        .column(ColumnSpec::new(FIELD_TYPE_COLUMN, ColumnType::Varchar))
}

pub trait FieldMetadataStore: Send + Sync {
    /// Append one row; the store assigns the next id.
    fn insert_field(&self, table: &str, field_name: &str, spec: &FieldSpec) -> std::result::Result<FieldMetadataRecord, ExecFailure>;

    /// Every row of `table` in insertion order.
    fn list_records(&self, table: &str) -> anyhow::Result<Vec<FieldMetadataRecord>>;

    fn create_table(&self, executor: &dyn SchemaExecutor, table: &str) -> std::result::Result<(), ExecFailure> {
        executor.apply_create_table(&fields_table_spec(table))
    }

    /// Decoded fields of `table` in insertion order.
    fn list_fields(&self, table: &str) -> Result<FieldSet> {
        let mut set = FieldSet::new();
        for rec in self.list_records(table)? {
            let spec = rec.decode()?;
            set.insert(rec.field_name, spec).map_err(|e| RegistryError::Storage(anyhow!("{} in table '{}'", e, table)))?;
        }
        Ok(set)
    }
}

/// In-memory field metadata, paired with `MemoryExecutor`.
#[derive(Default)]
pub struct MemoryFieldMetadata {
    tables: RwLock<HashMap<String, Vec<FieldMetadataRecord>>>,
    fail_on: RwLock<HashSet<String>>,
}

impl MemoryFieldMetadata {
    pub fn new() -> Self { Self::default() }

    /// Make inserts into `table` fail with an `injected` status.
    pub fn fail_on(&self, table: &str) { self.fail_on.write().insert(table.to_string()); }
}

impl FieldMetadataStore for MemoryFieldMetadata {
    fn insert_field(&self, table: &str, field_name: &str, spec: &FieldSpec) -> std::result::Result<FieldMetadataRecord, ExecFailure> {
        if self.fail_on.read().contains(table) {
            return Err(ExecFailure::new("injected", format!("refusing to insert into '{}'", table)));
        }
        let mut tables = self.tables.write();
        let rows = tables.get_mut(table).ok_or_else(|| ExecFailure::table_missing(table))?;
        let rec = FieldMetadataRecord { id: rows.len() as i64 + 1, field_name: field_name.to_string(), field_type: spec.encode() };
        rows.push(rec.clone());
        Ok(rec)
    }

    fn list_records(&self, table: &str) -> anyhow::Result<Vec<FieldMetadataRecord>> {
        self.tables.read().get(table).cloned().ok_or_else(|| anyhow!("field metadata table '{}' not found", table))
    }

    fn create_table(&self, executor: &dyn SchemaExecutor, table: &str) -> std::result::Result<(), ExecFailure> {
        executor.apply_create_table(&fields_table_spec(table))?;
        self.tables.write().insert(table.to_string(), Vec::new());
        Ok(())
    }
}
