//! Registry error model.
//! One typed error per failure mode of the public operations. Storage plumbing
//! below the trait seams works in `anyhow::Result` and is folded into
//! `RegistryError::Storage` (or an `ExecFailure` for executor calls) at the boundary.

use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Step of a registration at which a schema executor request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateFieldsTable,
    PopulateFields,
    CreateEntityTable,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CreateFieldsTable => "create_fields_table",
            Stage::PopulateFields => "populate_fields",
            Stage::CreateEntityTable => "create_entity_table",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Structured failure reported by a schema executor or field metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecFailure {
    pub status: String,
    pub diagnostic: String,
}

impl ExecFailure {
    pub fn new(status: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self { status: status.into(), diagnostic: diagnostic.into() }
    }

    pub fn table_exists(table: &str) -> Self {
        Self::new("table_exists", format!("table '{}' already exists", table))
    }

    pub fn table_missing(table: &str) -> Self {
        Self::new("table_missing", format!("table '{}' does not exist", table))
    }

    pub fn io(err: anyhow::Error) -> Self {
        Self::new("io", format!("{:#}", err))
    }
}

impl Display for ExecFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.diagnostic)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("an entity type named \"{name}\" already exists")]
    DuplicateName { name: String },

    #[error("an entity type with handler \"{handler_id}\" already exists")]
    DuplicateHandler { handler_id: String },

    #[error("the \"{type_name}\" type is not supported")]
    UnsupportedType { type_name: String },

    #[error("the entity type with id {type_id} was not found")]
    NotFound { type_id: i64 },

    #[error("the \"{field_name}\" field does not exist in entity type {type_id}")]
    FieldNotFound { type_id: i64, field_name: String },

    #[error("schema execution failed at {stage}: {failure}")]
    SchemaExecution { stage: Stage, failure: ExecFailure },

    #[error("invalid {kind} \"{value}\"")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("invalid spec for field \"{field_name}\": {reason}")]
    InvalidFieldSpec { field_name: String, reason: String },

    #[error("field \"{field_name}\" is declared more than once")]
    DuplicateField { field_name: String },

    #[error("table \"{table}\" already exists")]
    TableExists { table: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn code_str(&self) -> &'static str {
        match self {
            RegistryError::DuplicateName { .. } => "duplicate_name",
            RegistryError::DuplicateHandler { .. } => "duplicate_handler",
            RegistryError::UnsupportedType { .. } => "unsupported_type",
            RegistryError::NotFound { .. } => "not_found",
            RegistryError::FieldNotFound { .. } => "field_not_found",
            RegistryError::SchemaExecution { .. } => "schema_execution",
            RegistryError::InvalidIdentifier { .. } => "invalid_identifier",
            RegistryError::InvalidFieldSpec { .. } => "invalid_field_spec",
            RegistryError::DuplicateField { .. } => "duplicate_field",
            RegistryError::TableExists { .. } => "table_exists",
            RegistryError::Storage(_) => "storage",
        }
    }

    /// True for errors raised before any schema mutation took place.
    pub fn is_validation(&self) -> bool {
        !matches!(self, RegistryError::SchemaExecution { .. } | RegistryError::Storage(_))
    }

    pub fn schema(stage: Stage, failure: ExecFailure) -> Self { RegistryError::SchemaExecution { stage, failure } }

    pub fn invalid_field<S: Into<String>>(field_name: &str, reason: S) -> Self {
        RegistryError::InvalidFieldSpec { field_name: field_name.to_string(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping() {
        assert_eq!(RegistryError::DuplicateName { name: "Invoice".into() }.code_str(), "duplicate_name");
        assert_eq!(RegistryError::NotFound { type_id: 7 }.code_str(), "not_found");
        let e = RegistryError::schema(Stage::PopulateFields, ExecFailure::table_missing("x"));
        assert_eq!(e.code_str(), "schema_execution");
        assert!(!e.is_validation());
        assert!(RegistryError::UnsupportedType { type_name: "currency".into() }.is_validation());
    }

    #[test]
    fn display_carries_diagnostic() {
        let e = RegistryError::schema(Stage::CreateEntityTable, ExecFailure::table_exists("invoice"));
        let msg = e.to_string();
        assert!(msg.contains("create_entity_table"));
        assert!(msg.contains("table 'invoice' already exists"));

        let e = RegistryError::FieldNotFound { type_id: 3, field_name: "total".into() };
        assert_eq!(e.to_string(), "the \"total\" field does not exist in entity type 3");
    }

    #[test]
    fn anyhow_maps_to_storage() {
        let e: RegistryError = anyhow::anyhow!("disk full").into();
        assert_eq!(e.code_str(), "storage");
        assert!(e.to_string().contains("disk full"));
    }
}
