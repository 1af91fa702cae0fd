//! Registry table backed by the Store.
//!
//! Rows `(id, entity_type_name, entity_class_name, fields_info_table, entity_table_name)`
//! live in an ordinary table of the store, created on first open. All rows are
//! loaded into memory on open; `create` writes through before updating the cache.

use anyhow::Context;
use parking_lot::Mutex;
use polars::prelude::*;
use tracing::{debug, info};

use super::SharedStore;
use crate::catalog::ColumnType;
use crate::executor::{ColumnSpec, CreateTableSpec};
use crate::ident::ID_COLUMN;
use crate::repository::{MemoryTypeRepository, NewTypeDefinition, TypeDefinition, TypeRepository};

const NAME_COLUMN: &str = "entity_type_name";
const HANDLER_COLUMN: &str = "entity_class_name";
const FIELDS_TABLE_COLUMN: &str = "fields_info_table";
const ENTITY_TABLE_COLUMN: &str = "entity_table_name";

pub fn registry_table_spec(table: &str) -> CreateTableSpec {
    CreateTableSpec::new(table)
        .column(ColumnSpec::identifier(ID_COLUMN))
        .column(ColumnSpec::new(NAME_COLUMN, ColumnType::Varchar))
        .column(ColumnSpec::new(HANDLER_COLUMN, ColumnType::Varchar))
        .column(ColumnSpec::new(FIELDS_TABLE_COLUMN, ColumnType::Varchar))
        .column(ColumnSpec::new(ENTITY_TABLE_COLUMN, ColumnType::Varchar))
}

fn definition_to_df(def: &TypeDefinition) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(ID_COLUMN.into(), vec![def.id]).into(),
        Series::new(NAME_COLUMN.into(), vec![def.name.clone()]).into(),
        Series::new(HANDLER_COLUMN.into(), vec![def.handler_id.clone()]).into(),
        Series::new(FIELDS_TABLE_COLUMN.into(), vec![def.fields_table_name.clone()]).into(),
        Series::new(ENTITY_TABLE_COLUMN.into(), vec![def.entity_table_name.clone()]).into(),
    ])
}

fn df_to_definitions(df: &DataFrame) -> anyhow::Result<Vec<TypeDefinition>> {
    let ids = df.column(ID_COLUMN)?.i64()?;
    let names = df.column(NAME_COLUMN)?.str()?;
    let handlers = df.column(HANDLER_COLUMN)?.str()?;
    let fields_tables = df.column(FIELDS_TABLE_COLUMN)?.str()?;
    let entity_tables = df.column(ENTITY_TABLE_COLUMN)?.str()?;
    let text = |v: Option<&str>, col: &str, row: usize| -> anyhow::Result<String> {
        v.map(str::to_string).with_context(|| format!("null {} at row {}", col, row))
    };
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(TypeDefinition {
            id: ids.get(i).with_context(|| format!("null id at row {}", i))?,
            name: text(names.get(i), NAME_COLUMN, i)?,
            handler_id: text(handlers.get(i), HANDLER_COLUMN, i)?,
            fields_table_name: text(fields_tables.get(i), FIELDS_TABLE_COLUMN, i)?,
            entity_table_name: text(entity_tables.get(i), ENTITY_TABLE_COLUMN, i)?,
        });
    }
    Ok(out)
}

pub struct StoreTypeRepository {
    store: SharedStore,
    table: String,
    cache: MemoryTypeRepository,
    write_lock: Mutex<()>,
}

impl StoreTypeRepository {
    /// Open the registry table, creating it when the store is new.
    pub fn open(store: SharedStore, table: &str) -> anyhow::Result<Self> {
        if !store.has_table(table) {
            store.create_table(&registry_table_spec(table)).with_context(|| format!("bootstrap registry table '{}'", table))?;
            info!(target: "entity_registry::storage", "created registry table '{}'", table);
        }
        let rows = match store.read_df(table)? {
            Some(df) => df_to_definitions(&df).with_context(|| format!("load registry table '{}'", table))?,
            None => Vec::new(),
        };
        debug!(target: "entity_registry::storage", "loaded {} entity types from '{}'", rows.len(), table);
        Ok(Self { store, table: table.to_string(), cache: MemoryTypeRepository::from_rows(rows), write_lock: Mutex::new(()) })
    }

    pub fn table(&self) -> &str { &self.table }
}

impl TypeRepository for StoreTypeRepository {
    fn create(&self, def: NewTypeDefinition) -> anyhow::Result<TypeDefinition> {
        let _guard = self.write_lock.lock();
        let def = def.with_id(self.cache.next_id());
        let df = definition_to_df(&def)?;
        self.store.append_df(&self.table, df).with_context(|| format!("persist entity type '{}'", def.name))?;
        self.cache.push(def.clone());
        Ok(def)
    }

    fn get(&self, id: i64) -> Option<TypeDefinition> { self.cache.get(id) }

    fn find_by_name(&self, name: &str) -> Option<TypeDefinition> { self.cache.find_by_name(name) }

    fn find_by_handler(&self, handler_id: &str) -> Option<TypeDefinition> { self.cache.find_by_handler(handler_id) }

    fn list(&self) -> Vec<TypeDefinition> { self.cache.list() }
}
