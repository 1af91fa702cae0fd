//! Schema materializer
//! -------------------
//! Turns a validated `FieldSet` into concrete storage through the injected
//! executor: (1) the field metadata table, (2) one metadata row per field in
//! declaration order, (3) the entity table with `id` plus one column per field.
//! Every step is an independent executor request; there is no shared transaction.
//! When a step fails, tables already created by this run are dropped again if
//! `cleanup_on_failure` is set, otherwise they are left in place.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{self, DEFAULT_CHAR_LENGTH};
use crate::error::{ExecFailure, RegistryError, Result, Stage};
use crate::executor::{ColumnSpec, CreateTableSpec, SchemaExecutor};
use crate::field_spec::FieldSet;
use crate::ident::ID_COLUMN;
use crate::metadata::FieldMetadataStore;

pub struct SchemaMaterializer {
    executor: Arc<dyn SchemaExecutor>,
    fields: Arc<dyn FieldMetadataStore>,
    default_char_length: u32,
    cleanup_on_failure: bool,
}

impl SchemaMaterializer {
    pub fn new(executor: Arc<dyn SchemaExecutor>, fields: Arc<dyn FieldMetadataStore>) -> Self {
        Self { executor, fields, default_char_length: DEFAULT_CHAR_LENGTH, cleanup_on_failure: true }
    }

    pub fn with_default_char_length(mut self, length: u32) -> Self {
        self.default_char_length = length;
        self
    }

    pub fn with_cleanup(mut self, cleanup_on_failure: bool) -> Self {
        self.cleanup_on_failure = cleanup_on_failure;
        self
    }

    pub fn executor(&self) -> &dyn SchemaExecutor { self.executor.as_ref() }

    pub fn field_store(&self) -> &dyn FieldMetadataStore { self.fields.as_ref() }

    /// Build the entity table intent. Fails on any field the catalog rejects, so
    /// callers can run it as part of validation before anything is created.
    pub fn entity_table_spec(&self, table: &str, fields: &FieldSet) -> Result<CreateTableSpec> {
        let mut spec = CreateTableSpec::new(table).column(ColumnSpec::identifier(ID_COLUMN));
        for (name, field) in fields.iter() {
            let kind = field.kind(name)?;
            let column_type = catalog::column_type(name, kind, field.params(), self.default_char_length)?;
            spec = spec.column(ColumnSpec::new(name, column_type));
        }
        Ok(spec)
    }

    /// Run the three materialization steps. On error the returned
    /// `SchemaExecution` carries the failing stage and executor diagnostic.
    pub fn materialize(&self, fields_table: &str, entity: &CreateTableSpec, fields: &FieldSet) -> Result<()> {
        let mut created: Vec<String> = Vec::with_capacity(2);

        debug!(target: "entity_registry::materializer", "creating fields table '{}'", fields_table);
        self.fields
            .create_table(self.executor.as_ref(), fields_table)
            .map_err(|f| self.fail(Stage::CreateFieldsTable, f, &created))?;
        created.push(fields_table.to_string());

        for (name, spec) in fields.iter() {
            self.fields
                .insert_field(fields_table, name, spec)
                .map_err(|f| self.fail(Stage::PopulateFields, f, &created))?;
        }
        debug!(target: "entity_registry::materializer", "recorded {} fields in '{}'", fields.len(), fields_table);

        self.executor
            .apply_create_table(entity)
            .map_err(|f| self.fail(Stage::CreateEntityTable, f, &created))?;

        info!(target: "entity_registry::materializer", "materialized '{}' ({} columns) and '{}'", entity.table, entity.columns.len(), fields_table);
        Ok(())
    }

    /// Drop tables created by a registration that failed later on, newest first.
    /// Best effort: drop failures are logged and otherwise ignored.
    pub fn compensate(&self, tables: &[String]) {
        if !self.cleanup_on_failure {
            if !tables.is_empty() {
                warn!(target: "entity_registry::materializer", "cleanup disabled; leaving orphaned tables {:?}", tables);
            }
            return;
        }
        for table in tables.iter().rev() {
            match self.executor.apply_drop_table(table) {
                Ok(()) => warn!(target: "entity_registry::materializer", "dropped '{}' after failed registration", table),
                Err(f) => warn!(target: "entity_registry::materializer", "could not drop '{}' after failed registration: {}", table, f),
            }
        }
    }

    fn fail(&self, stage: Stage, failure: ExecFailure, created: &[String]) -> RegistryError {
        warn!(target: "entity_registry::materializer", "stage {} failed: {}", stage, failure);
        self.compensate(created);
        RegistryError::schema(stage, failure)
    }
}
