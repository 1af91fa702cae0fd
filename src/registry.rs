//! Entity type registry
//! --------------------
//! Registers entity types and answers lookups about them. A registration runs
//! under a registry-wide lock:
//!   validate names → check uniqueness → validate field types → check derived
//!   tables are free → materialize fields table, rows and entity table → persist
//!   the registry row → return its id.
//! Everything before materialization is side-effect free, so a rejected
//! registration never touches storage.
//!
//! Reads never take the registration lock; they go straight to the repository,
//! which serves the latest committed rows.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::executor::{MemoryExecutor, SchemaExecutor};
use crate::field_spec::FieldSet;
use crate::ident;
use crate::materializer::SchemaMaterializer;
use crate::metadata::{FieldMetadataStore, MemoryFieldMetadata};
use crate::repository::{MemoryTypeRepository, NewTypeDefinition, TypeDefinition, TypeRepository};
use crate::storage::{Store, StoreTypeRepository};

/// Everything known about one registered type, with its fields in declaration order.
/// Serializes with the stable upper-case keys hosts rely on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeInfo {
    #[serde(rename = "ENTITY_TYPE_ID")]
    pub id: i64,
    #[serde(rename = "ENTITY_TYPE_NAME")]
    pub name: String,
    #[serde(rename = "ENTITY_CLASS_NAME")]
    pub handler_id: String,
    #[serde(rename = "ENTITY_TABLE_NAME")]
    pub entity_table_name: String,
    #[serde(rename = "ENTITY_FIELDS_INFO_TABLE_NAME")]
    pub fields_table_name: String,
    #[serde(rename = "ENTITY_FIELDS_INFO")]
    pub fields: FieldSet,
}

impl TypeInfo {
    fn new(def: TypeDefinition, fields: FieldSet) -> Self {
        Self {
            id: def.id,
            name: def.name,
            handler_id: def.handler_id,
            entity_table_name: def.entity_table_name,
            fields_table_name: def.fields_table_name,
            fields,
        }
    }

    /// JSON text with keys and fields in their stable order.
    pub fn to_json_string(&self) -> serde_json::Result<String> { serde_json::to_string(self) }
}

pub struct EntityTypeRegistry {
    repository: Arc<dyn TypeRepository>,
    materializer: SchemaMaterializer,
    fields_table_suffix: String,
    register_lock: Mutex<()>,
}

impl EntityTypeRegistry {
    pub fn new(
        repository: Arc<dyn TypeRepository>,
        executor: Arc<dyn SchemaExecutor>,
        fields: Arc<dyn FieldMetadataStore>,
        cfg: &RegistryConfig,
    ) -> Self {
        let materializer = SchemaMaterializer::new(executor, fields)
            .with_default_char_length(cfg.default_char_length)
            .with_cleanup(cfg.cleanup_on_failure);
        Self { repository, materializer, fields_table_suffix: cfg.fields_table_suffix.clone(), register_lock: Mutex::new(()) }
    }

    /// Registry with all state held in process memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTypeRepository::new()),
            Arc::new(MemoryExecutor::new()),
            Arc::new(MemoryFieldMetadata::new()),
            &RegistryConfig::default(),
        )
    }

    /// Registry over the on-disk table store described by `cfg`.
    pub fn open(cfg: &RegistryConfig) -> Result<Self> {
        let store = Store::open(cfg)?;
        let repository = StoreTypeRepository::open(store.clone(), &cfg.registry_table)?;
        info!(target: "entity_registry::registry", "opened registry root='{}' table='{}'", cfg.root.display(), cfg.registry_table);
        Ok(Self::new(Arc::new(repository), store.clone(), store, cfg))
    }

    /// Register a new entity type and build its storage. Returns the new type id.
    pub fn register_type(&self, name: &str, handler_id: &str, fields: &FieldSet) -> Result<i64> {
        let _guard = self.register_lock.lock();
        debug!(target: "entity_registry::registry", "register_type: begin name='{}' handler='{}' fields={:?}", name, handler_id, fields.names());

        ident::validate_type_name(name)?;
        ident::validate_handler_id(handler_id)?;
        if self.repository.find_by_name(name).is_some() {
            return Err(RegistryError::DuplicateName { name: name.to_string() });
        }
        if self.repository.find_by_handler(handler_id).is_some() {
            return Err(RegistryError::DuplicateHandler { handler_id: handler_id.to_string() });
        }

        let mut normalized = FieldSet::new();
        for (field_name, spec) in fields.iter() {
            ident::validate_field_name(field_name)?;
            spec.kind(field_name)?;
            normalized.insert(field_name, spec.normalized())?;
        }

        let fields_table = ident::fields_table_name(name, &self.fields_table_suffix);
        let entity_table = ident::entity_table_name(name);
        let entity_spec = self.materializer.entity_table_spec(&entity_table, &normalized)?;
        if fields_table == entity_table {
            return Err(RegistryError::TableExists { table: entity_table });
        }
        for table in [&fields_table, &entity_table] {
            if self.materializer.executor().table_exists(table) {
                return Err(RegistryError::TableExists { table: table.clone() });
            }
        }

        self.materializer.materialize(&fields_table, &entity_spec, &normalized)?;

        let new_def = NewTypeDefinition {
            name: name.to_string(),
            handler_id: handler_id.to_string(),
            fields_table_name: fields_table.clone(),
            entity_table_name: entity_table.clone(),
        };
        let def = match self.repository.create(new_def) {
            Ok(def) => def,
            Err(e) => {
                warn!(target: "entity_registry::registry", "register_type: persisting '{}' failed: {:#}", name, e);
                self.materializer.compensate(&[fields_table, entity_table]);
                return Err(RegistryError::Storage(e));
            }
        };
        info!(target: "entity_registry::registry", "registered entity type '{}' id={} table='{}' fields_table='{}' fields={}",
            def.name, def.id, def.entity_table_name, def.fields_table_name, normalized.len());
        Ok(def.id)
    }

    pub fn get_type_info(&self, type_id: i64) -> Result<TypeInfo> {
        let def = self.repository.get(type_id).ok_or(RegistryError::NotFound { type_id })?;
        let fields = self.materializer.field_store().list_fields(&def.fields_table_name)?;
        Ok(TypeInfo::new(def, fields))
    }

    /// `Ok(true)` when the field is declared; absence is reported as `FieldNotFound`.
    pub fn check_field_exists(&self, type_id: i64, field_name: &str) -> Result<bool> {
        let info = self.get_type_info(type_id)?;
        if info.fields.contains(field_name) {
            Ok(true)
        } else {
            Err(RegistryError::FieldNotFound { type_id, field_name: field_name.to_string() })
        }
    }

    /// Every registered type in id order.
    pub fn list_types(&self) -> Result<Vec<TypeInfo>> {
        self.repository
            .list()
            .into_iter()
            .map(|def| {
                let fields = self.materializer.field_store().list_fields(&def.fields_table_name)?;
                Ok(TypeInfo::new(def, fields))
            })
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<i64> { self.repository.find_by_name(name).map(|d| d.id) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_spec::FieldSpec;
    use serde_json::json;

    fn invoice_fields() -> FieldSet {
        FieldSet::from_pairs([("total", FieldSpec::new("decimal")), ("code", FieldSpec::new("char").with_param(8))]).unwrap()
    }

    #[test]
    fn invoice_example() {
        let reg = EntityTypeRegistry::in_memory();
        let id = reg.register_type("Invoice", "invoice.handler.v1", &invoice_fields()).unwrap();
        assert_eq!(id, 1);
        let info = reg.get_type_info(id).unwrap();
        assert_eq!(info.name, "Invoice");
        assert_eq!(info.handler_id, "invoice.handler.v1");
        assert_eq!(info.entity_table_name, "invoice");
        assert_eq!(info.fields_table_name, "invoice_fields");
        assert_eq!(info.fields, invoice_fields());
        assert_eq!(
            info.to_json_string().unwrap(),
            r#"{"ENTITY_TYPE_ID":1,"ENTITY_TYPE_NAME":"Invoice","ENTITY_CLASS_NAME":"invoice.handler.v1","ENTITY_TABLE_NAME":"invoice","ENTITY_FIELDS_INFO_TABLE_NAME":"invoice_fields","ENTITY_FIELDS_INFO":{"total":["decimal"],"code":["char",8]}}"#
        );
    }

    #[test]
    fn type_names_are_stored_lowercase() {
        let reg = EntityTypeRegistry::in_memory();
        let fields = FieldSet::from_pairs([("code", FieldSpec::new("CHAR").with_param(4))]).unwrap();
        let id = reg.register_type("Coupon", "h.coupon", &fields).unwrap();
        let info = reg.get_type_info(id).unwrap();
        assert_eq!(info.fields.get("code").unwrap().values(), &[json!("char"), json!(4)]);
    }

    #[test]
    fn field_checks() {
        let reg = EntityTypeRegistry::in_memory();
        let id = reg.register_type("Invoice", "invoice.handler.v1", &invoice_fields()).unwrap();
        assert!(reg.check_field_exists(id, "code").unwrap());
        match reg.check_field_exists(id, "missing") {
            Err(RegistryError::FieldNotFound { type_id, field_name }) => {
                assert_eq!(type_id, id);
                assert_eq!(field_name, "missing");
            }
            other => panic!("expected FieldNotFound, got {:?}", other),
        }
        assert!(matches!(reg.check_field_exists(99, "code"), Err(RegistryError::NotFound { type_id: 99 })));
        assert!(matches!(reg.get_type_info(0), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn reserved_and_malformed_names_are_rejected() {
        let reg = EntityTypeRegistry::in_memory();
        let fields = FieldSet::from_pairs([("id", FieldSpec::new("integer"))]).unwrap();
        assert_eq!(reg.register_type("Invoice", "h", &fields).unwrap_err().code_str(), "invalid_field_spec");
        assert_eq!(reg.register_type("bad name", "h", &FieldSet::new()).unwrap_err().code_str(), "invalid_identifier");
        assert_eq!(reg.register_type("Invoice", " ", &FieldSet::new()).unwrap_err().code_str(), "invalid_identifier");
        assert!(reg.list_types().unwrap().is_empty());
    }

    #[test]
    fn empty_field_set_creates_identifier_only_table() {
        let reg = EntityTypeRegistry::in_memory();
        let id = reg.register_type("Marker", "h.marker", &FieldSet::new()).unwrap();
        assert!(reg.get_type_info(id).unwrap().fields.is_empty());
        assert_eq!(reg.find_by_name("Marker"), Some(id));
        assert_eq!(reg.find_by_name("Other"), None);
    }
}
