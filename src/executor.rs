//! Schema executor seam
//! --------------------
//! The registry never talks to a database directly. It produces `CreateTableSpec`
//! intents and hands them to a `SchemaExecutor`, which applies them to live storage
//! and answers with success or a structured `ExecFailure`. `MemoryExecutor` is the
//! in-process implementation used by tests and embedders without a backing store;
//! `storage::Store` applies the same intents to an on-disk table tree.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::catalog::ColumnType;
use crate::error::ExecFailure;
use crate::ident::quote_ident;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self { name: name.into(), column_type, primary_key: false, auto_increment: false, nullable: false }
    }

    /// Auto-incrementing BIGINT primary key.
    pub fn identifier(name: impl Into<String>) -> Self {
        Self { name: name.into(), column_type: ColumnType::BigInt, primary_key: true, auto_increment: true, nullable: false }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn sql(&self) -> String {
        let mut s = format!("{} {}", quote_ident(&self.name), self.column_type.sql());
        if self.primary_key { s.push_str(" PRIMARY KEY"); }
        if self.auto_increment { s.push_str(" AUTO_INCREMENT"); }
        if !self.primary_key && !self.nullable { s.push_str(" NOT NULL"); }
        s
    }
}

/// Table creation intent: a table name and its columns in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableSpec {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

impl CreateTableSpec {
    pub fn new(table: impl Into<String>) -> Self { Self { table: table.into(), columns: Vec::new() } }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column_names(&self) -> Vec<&str> { self.columns.iter().map(|c| c.name.as_str()).collect() }

    pub fn to_sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| c.sql()).collect();
        format!("CREATE TABLE {} ({})", quote_ident(&self.table), cols.join(", "))
    }
}

/// Applies table creation intents to live storage.
///
/// Implementations must refuse to create a table that already exists.
pub trait SchemaExecutor: Send + Sync {
    fn apply_create_table(&self, spec: &CreateTableSpec) -> Result<(), ExecFailure>;

    /// Used only to compensate for a registration that failed part way through.
    fn apply_drop_table(&self, table: &str) -> Result<(), ExecFailure>;

    fn table_exists(&self, table: &str) -> bool;
}

/// In-memory executor. Keeps every applied spec in order and can be told to
/// fail on a given table to exercise partial registrations.
#[derive(Default)]
pub struct MemoryExecutor {
    tables: RwLock<Vec<CreateTableSpec>>,
    fail_on: RwLock<HashSet<String>>,
    dropped: RwLock<Vec<String>>,
}

impl MemoryExecutor {
    pub fn new() -> Self { Self::default() }

    /// Make the next creations of `table` fail with an `injected` status.
    pub fn fail_on(&self, table: &str) { self.fail_on.write().insert(table.to_string()); }

    pub fn clear_failures(&self) { self.fail_on.write().clear(); }

    pub fn table(&self, table: &str) -> Option<CreateTableSpec> {
        self.tables.read().iter().find(|t| t.table == table).cloned()
    }

    /// Names of live tables in creation order.
    pub fn table_names(&self) -> Vec<String> { self.tables.read().iter().map(|t| t.table.clone()).collect() }

    pub fn dropped(&self) -> Vec<String> { self.dropped.read().clone() }
}

impl SchemaExecutor for MemoryExecutor {
    fn apply_create_table(&self, spec: &CreateTableSpec) -> Result<(), ExecFailure> {
        if self.fail_on.read().contains(&spec.table) {
            return Err(ExecFailure::new("injected", format!("refusing to create '{}'", spec.table)));
        }
        let mut tables = self.tables.write();
        if tables.iter().any(|t| t.table == spec.table) {
            return Err(ExecFailure::table_exists(&spec.table));
        }
        info!(target: "entity_registry::ddl", "{}", spec.to_sql());
        tables.push(spec.clone());
        Ok(())
    }

    fn apply_drop_table(&self, table: &str) -> Result<(), ExecFailure> {
        let mut tables = self.tables.write();
        let before = tables.len();
        tables.retain(|t| t.table != table);
        if tables.len() == before {
            return Err(ExecFailure::table_missing(table));
        }
        debug!(target: "entity_registry::ddl", "DROP TABLE {}", table);
        self.dropped.write().push(table.to_string());
        Ok(())
    }

    fn table_exists(&self, table: &str) -> bool { self.tables.read().iter().any(|t| t.table == table) }
}
