//!
//! entity_registry storage module
//! ------------------------------
//! File-backed live storage for registered entity types, laid out as a simple
//! three-level directory tree: `database/schema/table`. Each table directory holds
//! a `schema.json` recording the ordered column definitions and the DDL that created
//! the table, plus a `data.parquet` with its rows once any have been written.
//!
//! Key responsibilities:
//! - Applying `CreateTableSpec` intents (the `SchemaExecutor` seam) and compensating drops.
//! - Appending and reading field metadata rows (the `FieldMetadataStore` seam).
//! - Hosting the registry table itself, see `types::StoreTypeRepository`.
//!
//! Rows are written by rewriting the table's parquet file through a temp file and a
//! rename, under a store-wide write lock.

use std::{fs, path::{Path, PathBuf}};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::ExecFailure;
use crate::executor::{CreateTableSpec, SchemaExecutor};
use crate::ident::{self, QueryDefaults};

mod rows;
pub mod schema;
pub mod types;

pub use schema::TableSchema;
pub use types::StoreTypeRepository;

const SCHEMA_FILE: &str = "schema.json";
const DATA_FILE: &str = "data.parquet";

/// Core on-disk storage handle for a table directory tree.
///
/// Table names passed in are bare (`invoice_fields`) and resolve under the
/// configured database and schema.
pub struct Store {
    /// Root folder for all databases/schemas/tables.
    root: PathBuf,
    defaults: QueryDefaults,
    write_lock: Mutex<()>,
}

pub type SharedStore = Arc<Store>;

impl Store {
    /// Create a new Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P, database: &str, schema: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).with_context(|| format!("create store root {}", root.display()))?;
        Ok(Self { root, defaults: QueryDefaults::new(database, schema), write_lock: Mutex::new(()) })
    }

    pub fn open(cfg: &RegistryConfig) -> Result<SharedStore> {
        Ok(Arc::new(Self::new(&cfg.root, &cfg.database, &cfg.schema)?))
    }

    /// Return the configured root folder for this Store.
    pub fn root_path(&self) -> &PathBuf { &self.root }

    pub(crate) fn table_dir(&self, table: &str) -> PathBuf {
        let qualified = ident::qualify_table_ident(table, &self.defaults);
        ident::to_local_path(&self.root, &qualified)
    }

    fn schema_path(&self, table: &str) -> PathBuf { self.table_dir(table).join(SCHEMA_FILE) }

    fn data_path(&self, table: &str) -> PathBuf { self.table_dir(table).join(DATA_FILE) }

    /// A table exists once its schema.json has been written.
    pub fn has_table(&self, table: &str) -> bool { self.schema_path(table).exists() }

    /// Create the table directory and write its schema.json. Fails if the table exists.
    pub fn create_table(&self, spec: &CreateTableSpec) -> Result<()> {
        let _guard = self.write_lock.lock();
        let dir = self.table_dir(&spec.table);
        debug!(target: "entity_registry::storage", "create_table: begin table='{}' dir='{}'", spec.table, dir.display());
        if self.has_table(&spec.table) {
            anyhow::bail!("table '{}' already exists at {}", spec.table, dir.display());
        }
        fs::create_dir_all(&dir).with_context(|| format!("create table dir {}", dir.display()))?;
        schema::save(&self.schema_path(&spec.table), &TableSchema::from_spec(spec))?;
        info!(target: "entity_registry::ddl", "{} -> '{}'", spec.to_sql(), dir.display());
        Ok(())
    }

    /// Delete a table directory and all its files if it exists.
    pub fn delete_table(&self, table: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let dir = self.table_dir(table);
        debug!(target: "entity_registry::storage", "delete_table: deleting table='{}'", dir.display());
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn load_schema(&self, table: &str) -> Result<TableSchema> { schema::load(&self.schema_path(table)) }

    /// Read every row of a table. Tables without rows yet yield `None`.
    pub fn read_df(&self, table: &str) -> Result<Option<DataFrame>> {
        if !self.has_table(table) { anyhow::bail!("Table not found: {}", table); }
        let path = self.data_path(table);
        if !path.exists() { return Ok(None); }
        let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let df = ParquetReader::new(file).finish()?;
        Ok(Some(df))
    }

    /// Append rows to a table. `df` must carry the same columns as earlier batches.
    pub fn append_df(&self, table: &str, df: DataFrame) -> Result<()> {
        let _guard = self.write_lock.lock();
        if !self.has_table(table) { anyhow::bail!("Table not found: {}", table); }
        let path = self.data_path(table);
        let mut merged = if path.exists() {
            let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
            let mut existing = ParquetReader::new(file).finish()?;
            existing.vstack_mut(&df)?;
            existing
        } else {
            df
        };
        let tmp = path.with_extension("parquet.tmp");
        {
            let mut file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            ParquetWriter::new(&mut file).finish(&mut merged)?;
        }
        fs::rename(&tmp, &path)?;
        debug!(target: "entity_registry::storage", "append_df: table='{}' rows={}", table, merged.height());
        Ok(())
    }
}

impl SchemaExecutor for Store {
    fn apply_create_table(&self, spec: &CreateTableSpec) -> std::result::Result<(), ExecFailure> {
        if self.has_table(&spec.table) { return Err(ExecFailure::table_exists(&spec.table)); }
        self.create_table(spec).map_err(ExecFailure::io)
    }

    fn apply_drop_table(&self, table: &str) -> std::result::Result<(), ExecFailure> {
        if !self.has_table(table) { return Err(ExecFailure::table_missing(table)); }
        self.delete_table(table).map_err(ExecFailure::io)
    }

    fn table_exists(&self, table: &str) -> bool { self.has_table(table) }
}
